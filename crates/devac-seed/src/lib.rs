//! DevAC Seed — partitioned columnar storage for analysis records
//!
//! Each package persists its records under `.devac/seed/<partition>/`, one
//! parquet file per table plus `meta.json`. The `base` partition is ground
//! truth; branch partitions overlay it. Writes are atomic (temp file +
//! rename) and serialized per package by an advisory file lock.

pub mod layout;
pub mod lock;
pub mod meta;
pub mod reader;
pub mod schema;
pub mod writer;

#[cfg(test)]
mod tests;

pub use layout::{Table, devac_dir, has_seed, lock_path, meta_path, partition_dir, seed_dir, table_path};
pub use lock::{LockConfig, SeedLock};
pub use meta::SeedMeta;
pub use reader::SeedReader;
pub use writer::{FlushStats, SeedWriter, StagedFile};

/// Version stamp written into every meta.json. Bump on breaking column
/// changes; readers refuse newer versions.
pub const SCHEMA_VERSION: u32 = 1;
