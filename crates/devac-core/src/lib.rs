//! DevAC Core — record model, entity identity, errors, and hook contracts

pub mod error;
pub mod hooks;
pub mod identity;
pub mod model;

#[cfg(test)]
pub mod tests;

pub use error::DevacError;
pub use hooks::{
    HookOutput, HookParse, IssueCounts, ValidationIssue, ValidationSeverity, ValidationSource,
    count_issues, parse_hook_output, parse_status_line,
};
pub use identity::{content_hash, effect_id, entity_id, file_hash, normalize_path, short_hash};
pub use model::{
    BRANCH_BASE, EdgeKind, EdgeRecord, EffectPayload, EffectRecord, ExternalRefRecord, Language,
    NodeKind, NodeRecord, UNRESOLVED_PREFIX, Visibility, now_millis, unresolved_target,
};

/// Crate-level result alias used across the library surface.
pub type Result<T> = std::result::Result<T, DevacError>;
