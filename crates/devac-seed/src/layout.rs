//! On-disk layout of a package seed

use std::path::{Path, PathBuf};

/// Package-level metadata directory.
pub const DEVAC_DIR: &str = ".devac";

/// Seed directory under `.devac/`.
pub const SEED_DIR: &str = "seed";

/// Advisory lock file guarding all partitions of a package.
pub const LOCK_FILE: &str = "seed.lock";

/// Meta file per partition.
pub const META_FILE: &str = "meta.json";

/// The four record tables of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Nodes,
    Edges,
    ExternalRefs,
    Effects,
}

/// All tables, in canonical order.
pub const TABLES: [Table; 4] = [Table::Nodes, Table::Edges, Table::ExternalRefs, Table::Effects];

impl Table {
    pub fn file_name(&self) -> &'static str {
        match self {
            Table::Nodes => "nodes.parquet",
            Table::Edges => "edges.parquet",
            Table::ExternalRefs => "external_refs.parquet",
            Table::Effects => "effects.parquet",
        }
    }

    /// The public SQL placeholder for this table (`{nodes}`, …).
    pub fn placeholder(&self) -> &'static str {
        match self {
            Table::Nodes => "{nodes}",
            Table::Edges => "{edges}",
            Table::ExternalRefs => "{external_refs}",
            Table::Effects => "{effects}",
        }
    }

    /// Bare table name used to derive view names.
    pub fn base_name(&self) -> &'static str {
        match self {
            Table::Nodes => "nodes",
            Table::Edges => "edges",
            Table::ExternalRefs => "external_refs",
            Table::Effects => "effects",
        }
    }
}

pub fn devac_dir(package: &Path) -> PathBuf {
    package.join(DEVAC_DIR)
}

pub fn seed_dir(package: &Path) -> PathBuf {
    devac_dir(package).join(SEED_DIR)
}

/// Partition directory for a branch (`base` included).
pub fn partition_dir(package: &Path, branch: &str) -> PathBuf {
    seed_dir(package).join(branch)
}

pub fn table_path(package: &Path, branch: &str, table: Table) -> PathBuf {
    partition_dir(package, branch).join(table.file_name())
}

pub fn meta_path(package: &Path, branch: &str) -> PathBuf {
    partition_dir(package, branch).join(META_FILE)
}

pub fn lock_path(package: &Path) -> PathBuf {
    devac_dir(package).join(LOCK_FILE)
}

/// Whether the package has any seed data for a branch.
pub fn has_seed(package: &Path, branch: &str) -> bool {
    table_path(package, branch, Table::Nodes).exists()
}
