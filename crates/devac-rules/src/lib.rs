//! DevAC Rules — classify raw effects into domains, containers, and
//! significance levels
//!
//! Three engines share one shape: rules sorted by descending priority,
//! first match wins, unmatched inputs get a configured default. The match
//! and emit types differ per engine; the traversal does not.

pub mod config;
pub mod domain;
pub mod engine;
pub mod grouping;
pub mod significance;

pub use config::{EffectMappings, engines_for_package, load_effect_mappings};
pub use domain::{DomainEffect, DomainEmit, DomainEngine, DomainMatch, DomainReport};
pub use engine::{Pattern, Rule, RuleEngine, RuleMatch};
pub use grouping::{GroupingEmit, GroupingEngine, GroupingInput, GroupingMatch, Layer};
pub use significance::{
    SignificanceContext, SignificanceEngine, SignificanceInput, SignificanceLevel,
    SignificanceMatch,
};
