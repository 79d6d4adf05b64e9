//! DevAC Query — SQL over seed partitions through an embedded DuckDB
//!
//! Views are materialized over the parquet files of the selected packages
//! (base + branch overlay per §seed semantics), then user SQL runs against
//! them with `{nodes}`-style placeholders expanded to the view names. A
//! fatal engine error tears the connection pool down, rebuilds it, replays
//! the view definitions, and retries the query exactly once.

mod engine;
mod views;

#[cfg(test)]
mod tests;

pub use engine::{EngineConfig, QueryEngine, Readiness, Row};
pub use views::view_name;
