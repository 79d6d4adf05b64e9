//! Partition metadata (`meta.json`)

use crate::layout;
use devac_core::DevacError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata stamped next to every partition's parquet files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedMeta {
    pub schema_version: u32,
    /// Writer identity, e.g. `devac/0.1.0`.
    pub writer: String,
    pub created_at: String,
    pub last_written_at: String,
    /// Content hash per analyzed file, for change detection.
    #[serde(default)]
    pub file_hashes: BTreeMap<String, String>,
}

impl SeedMeta {
    pub fn new() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        SeedMeta {
            schema_version: crate::SCHEMA_VERSION,
            writer: format!("devac/{}", env!("CARGO_PKG_VERSION")),
            created_at: now.clone(),
            last_written_at: now,
            file_hashes: BTreeMap::new(),
        }
    }

    /// Load the partition meta, or a fresh one if the file doesn't exist.
    pub fn load_or_new(package: &Path, branch: &str) -> Result<Self, DevacError> {
        let path = layout::meta_path(package, branch);
        if !path.exists() {
            return Ok(SeedMeta::new());
        }
        let text = std::fs::read_to_string(&path)?;
        let meta: SeedMeta = serde_json::from_str(&text)?;
        if meta.schema_version > crate::SCHEMA_VERSION {
            return Err(DevacError::CorruptSeed {
                path,
                reason: format!(
                    "schema version {} is newer than supported {}",
                    meta.schema_version,
                    crate::SCHEMA_VERSION
                ),
            });
        }
        Ok(meta)
    }

    /// Persist with the same temp-file + rename pattern the tables use.
    pub fn save(&self, package: &Path, branch: &str) -> Result<(), DevacError> {
        let path = layout::meta_path(package, branch);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = crate::writer::temp_sibling(&path);
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_written_at = chrono::Utc::now().to_rfc3339();
    }
}

impl Default for SeedMeta {
    fn default() -> Self {
        Self::new()
    }
}
