//! Content-addressed entity identity and file hashing

use crate::error::DevacError;
use crate::model::NodeKind;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Normalize a path for identity purposes: forward slashes only, no other
/// rewriting. Entity ids must never embed OS-specific separators or
/// absolute paths.
pub fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.contains('\\') {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}

/// Stable truncated digest over `qualified_name|disambiguator|kind`.
/// First 8 hex chars of SHA-256, identical across machines and runs.
pub fn short_hash(qualified_name: &str, disambiguator: &str, kind: NodeKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(qualified_name.as_bytes());
    hasher.update(b"|");
    hasher.update(disambiguator.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_str().as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}

/// Build the stable entity id for a symbol:
/// `{repo}:{package_path}:{file_path}:{kind}:{short_hash}`.
///
/// `package_path` is relative to the repository root (`.` at the root) and
/// `file_path` is relative to the package, so ids are portable across
/// machines.
pub fn entity_id(
    repo: &str,
    package_path: &Path,
    file_path: &Path,
    kind: NodeKind,
    qualified_name: &str,
    disambiguator: &str,
) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        repo,
        normalize_path(package_path),
        normalize_path(file_path),
        kind.as_str(),
        short_hash(qualified_name, disambiguator, kind)
    )
}

/// Stable id for an effect observation, derived from its source entity and
/// site so re-analysis produces the same id.
pub fn effect_id(source_entity_id: &str, effect_type: &str, file_path: &str, line: u32, column: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_entity_id.as_bytes());
    hasher.update(b"|");
    hasher.update(effect_type.as_bytes());
    hasher.update(b"|");
    hasher.update(file_path.as_bytes());
    hasher.update(b"|");
    hasher.update(line.to_le_bytes());
    hasher.update(column.to_le_bytes());
    let digest = hasher.finalize();
    format!("eff_{}", hex::encode(&digest[..8]))
}

/// Stream a file and return its SHA-256 hex digest. Used for change
/// detection between analysis runs.
pub fn file_hash(path: &Path) -> Result<String, DevacError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash already-loaded file contents. Matches `file_hash` for the same bytes.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
