//! DevAC Hub — workspace-level federation of repositories
//!
//! A single embedded database file (`<workspace>/.devac/central.duckdb`)
//! holds repo registrations, cross-repo edges derived from resolved refs,
//! a TTL query cache, and unified diagnostics. The affected analyzer walks
//! the cross-repo edge graph upward to answer impact queries.

pub mod affected;
mod diagnostics;
pub mod hub;
pub mod model;

#[cfg(test)]
mod tests;

pub use affected::{
    AffectedAnalyzer, AffectedOptions, AffectedResult, ImpactLevel, RepoImpact,
};
pub use hub::FederationHub;
pub use model::{
    CrossRepoEdge, DiagnosticCounts, DiagnosticFilter, DiagnosticSeverity, DiagnosticSource,
    DiagnosticSummaryRow, RepoRegistration, RepoStatus, SummaryGroupBy, UnifiedDiagnostic,
};
