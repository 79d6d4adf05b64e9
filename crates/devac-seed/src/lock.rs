//! Cross-process package lock
//!
//! An advisory OS lock on `.devac/seed.lock` serializes writers to a
//! package. The file also carries the holder's PID and acquisition time so
//! a lock left behind by a dead process can be detected and broken.

use crate::layout;
use devac_core::DevacError;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Lock acquisition parameters.
#[derive(Debug, Clone, Copy)]
pub struct LockConfig {
    /// How long to wait for the lock before giving up.
    pub timeout_ms: u64,
    /// A lock file older than this whose PID is dead is considered stale.
    pub stale_age_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            timeout_ms: 10_000,
            stale_age_ms: 5 * 60 * 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockPayload {
    pid: u32,
    acquired_at: String,
}

/// A held package lock. Released (and the lock file removed) on drop.
pub struct SeedLock {
    file: File,
    path: PathBuf,
}

impl SeedLock {
    /// Acquire the package lock, waiting up to the configured timeout.
    /// Stale locks (old mtime + dead PID) are forcibly released.
    pub fn acquire(package: &Path, config: LockConfig) -> Result<SeedLock, DevacError> {
        let path = layout::lock_path(package);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let started = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&path)?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    let mut file = file;
                    file.set_len(0)?;
                    let payload = LockPayload {
                        pid: std::process::id(),
                        acquired_at: chrono::Utc::now().to_rfc3339(),
                    };
                    file.write_all(serde_json::to_string(&payload)?.as_bytes())?;
                    file.sync_all().ok();
                    return Ok(SeedLock { file, path });
                }
                Err(_) => {
                    if Self::break_if_stale(&path, config.stale_age_ms)? {
                        continue;
                    }
                    if started.elapsed() >= Duration::from_millis(config.timeout_ms) {
                        return Err(DevacError::LockTimeout {
                            path,
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }

    /// Remove a stale lock file. Returns true if one was broken.
    fn break_if_stale(path: &Path, stale_age_ms: u64) -> Result<bool, DevacError> {
        let Ok(metadata) = std::fs::metadata(path) else {
            return Ok(false);
        };
        let age = metadata
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .unwrap_or_default();
        if age < Duration::from_millis(stale_age_ms) {
            return Ok(false);
        }
        let payload: Option<LockPayload> = std::fs::read_to_string(path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok());
        let holder_alive = payload.as_ref().map_or(false, |p| pid_alive(p.pid));
        if holder_alive {
            return Ok(false);
        }
        tracing::warn!(
            "Breaking stale lock {} (holder pid {:?} is gone)",
            path.display(),
            payload.map(|p| p.pid)
        );
        std::fs::remove_file(path).ok();
        Ok(true)
    }
}

impl Drop for SeedLock {
    fn drop(&mut self) {
        FileExt::unlock(&self.file).ok();
        std::fs::remove_file(&self.path).ok();
    }
}

#[cfg(target_os = "linux")]
fn pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_alive(_pid: u32) -> bool {
    // Without a portable liveness probe, never force-release.
    true
}
