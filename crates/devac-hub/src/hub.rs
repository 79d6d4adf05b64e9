//! The central hub database

use crate::model::{CrossRepoEdge, RepoRegistration, RepoStatus};
use devac_core::{DevacError, Result, now_millis};
use duckdb::{Connection, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Hub file under the workspace metadata directory.
pub const HUB_FILE: &str = "central.duckdb";

const DDL: &str = "
CREATE TABLE IF NOT EXISTS repos (
    repo_id VARCHAR PRIMARY KEY,
    local_path VARCHAR NOT NULL,
    manifest_hash VARCHAR,
    last_synced VARCHAR,
    status VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS cross_repo_edges (
    source_repo VARCHAR NOT NULL,
    source_entity_id VARCHAR NOT NULL,
    target_repo VARCHAR NOT NULL,
    target_entity_id VARCHAR NOT NULL,
    edge_type VARCHAR NOT NULL,
    metadata VARCHAR,
    PRIMARY KEY (source_entity_id, target_entity_id, edge_type)
);
CREATE INDEX IF NOT EXISTS idx_cre_target ON cross_repo_edges (target_entity_id);
CREATE INDEX IF NOT EXISTS idx_cre_target_repo ON cross_repo_edges (target_repo);
CREATE INDEX IF NOT EXISTS idx_cre_source_repo ON cross_repo_edges (source_repo);
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash VARCHAR PRIMARY KEY,
    result VARCHAR NOT NULL,
    ttl_seconds BIGINT NOT NULL,
    created_at BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS diagnostics (
    diagnostic_id VARCHAR PRIMARY KEY,
    repo_id VARCHAR NOT NULL,
    source VARCHAR NOT NULL,
    file VARCHAR,
    line INTEGER,
    col INTEGER,
    severity VARCHAR NOT NULL,
    category VARCHAR NOT NULL,
    title VARCHAR NOT NULL,
    description VARCHAR,
    code VARCHAR,
    suggestion VARCHAR,
    resolved BOOLEAN NOT NULL,
    actionable BOOLEAN NOT NULL,
    reference VARCHAR,
    created_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_diag_repo ON diagnostics (repo_id);
CREATE INDEX IF NOT EXISTS idx_diag_severity ON diagnostics (severity);
";

/// Single-host central store shared by the repositories of a workspace.
/// One writer, many readers; read-only mode never writes (not even DDL).
pub struct FederationHub {
    conn: Mutex<Option<Connection>>,
    read_only: bool,
    path: PathBuf,
}

impl FederationHub {
    /// Open (and in write mode, create) the workspace hub database.
    pub fn open(workspace: &Path, read_only: bool) -> Result<Self> {
        let dir = workspace.join(".devac");
        let path = dir.join(HUB_FILE);
        if read_only {
            if !path.exists() {
                return Err(DevacError::NotFound(format!(
                    "hub database {} does not exist",
                    path.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&dir)?;
        }

        let conn = Connection::open(&path)
            .map_err(|e| DevacError::FatalEngine(format!("open hub {}: {e}", path.display())))?;
        if !read_only {
            conn.execute_batch(DDL)
                .map_err(|e| DevacError::FatalEngine(format!("hub schema: {e}")))?;
        }
        tracing::debug!("Opened hub {} (read_only={read_only})", path.display());
        Ok(FederationHub {
            conn: Mutex::new(Some(conn)),
            read_only,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> std::result::Result<T, duckdb::Error>,
    ) -> Result<T> {
        let guard = self.conn.lock().unwrap();
        let conn = guard.as_ref().ok_or(DevacError::NotInitialized)?;
        f(conn).map_err(|e| DevacError::Internal(format!("hub query: {e}")))
    }

    pub(crate) fn guard_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(DevacError::Input("hub opened read-only".to_string()));
        }
        Ok(())
    }

    /// Register or update a repository.
    pub fn add_repo(&self, registration: &RepoRegistration) -> Result<()> {
        self.guard_writable()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO repos (repo_id, local_path, manifest_hash, last_synced, status)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    registration.repo_id,
                    registration.local_path,
                    registration.manifest_hash,
                    registration.last_synced,
                    registration.status.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    /// Unregister a repository. Cross-repo edges are derived data: every
    /// edge touching the repo goes with it.
    pub fn remove_repo(&self, repo_id: &str) -> Result<()> {
        self.guard_writable()?;
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM cross_repo_edges WHERE source_repo = ? OR target_repo = ?",
                params![repo_id, repo_id],
            )?;
            conn.execute("DELETE FROM repos WHERE repo_id = ?", params![repo_id])?;
            Ok(())
        })
    }

    /// All registrations. A repo whose local path no longer exists is
    /// reported as `missing` without mutating the stored row.
    pub fn list_repos(&self) -> Result<Vec<RepoRegistration>> {
        let mut repos = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT repo_id, local_path, manifest_hash, last_synced, status FROM repos ORDER BY repo_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(RepoRegistration {
                    repo_id: row.get(0)?,
                    local_path: row.get(1)?,
                    manifest_hash: row.get(2)?,
                    last_synced: row.get(3)?,
                    status: RepoStatus::parse_status(&row.get::<_, String>(4)?)
                        .unwrap_or(RepoStatus::Stale),
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        })?;
        for repo in repos.iter_mut() {
            if repo.status == RepoStatus::Active && !Path::new(&repo.local_path).exists() {
                repo.status = RepoStatus::Missing;
            }
        }
        Ok(repos)
    }

    pub fn get_repo(&self, repo_id: &str) -> Result<Option<RepoRegistration>> {
        Ok(self
            .list_repos()?
            .into_iter()
            .find(|r| r.repo_id == repo_id))
    }

    /// Stamp a successful sync.
    pub fn update_repo_sync(&self, repo_id: &str, manifest_hash: &str) -> Result<()> {
        self.guard_writable()?;
        let now = chrono::Utc::now().to_rfc3339();
        let updated = self.with_conn(|conn| {
            conn.execute(
                "UPDATE repos SET manifest_hash = ?, last_synced = ?, status = 'active' WHERE repo_id = ?",
                params![manifest_hash, now, repo_id],
            )
        })?;
        if updated == 0 {
            return Err(DevacError::NotFound(format!("repo {repo_id} not registered")));
        }
        Ok(())
    }

    /// Idempotent replace on (source_entity_id, target_entity_id,
    /// edge_type).
    pub fn add_cross_repo_edges(&self, edges: &[CrossRepoEdge]) -> Result<()> {
        self.guard_writable()?;
        if edges.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "INSERT OR REPLACE INTO cross_repo_edges
                 (source_repo, source_entity_id, target_repo, target_entity_id, edge_type, metadata)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )?;
            for edge in edges {
                stmt.execute(params![
                    edge.source_repo,
                    edge.source_entity_id,
                    edge.target_repo,
                    edge.target_entity_id,
                    edge.edge_type,
                    edge.metadata,
                ])?;
            }
            Ok(())
        })
    }

    fn edge_from_row(row: &duckdb::Row<'_>) -> std::result::Result<CrossRepoEdge, duckdb::Error> {
        Ok(CrossRepoEdge {
            source_repo: row.get(0)?,
            source_entity_id: row.get(1)?,
            target_repo: row.get(2)?,
            target_entity_id: row.get(3)?,
            edge_type: row.get(4)?,
            metadata: row.get(5)?,
        })
    }

    /// Edges pointing at any of the given entities; the upward step of
    /// affected analysis.
    pub fn get_cross_repo_dependents(&self, target_ids: &[String]) -> Result<Vec<CrossRepoEdge>> {
        if target_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; target_ids.len()].join(", ");
        let sql = format!(
            "SELECT source_repo, source_entity_id, target_repo, target_entity_id, edge_type, metadata
             FROM cross_repo_edges WHERE target_entity_id IN ({placeholders})"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(target_ids.iter()), Self::edge_from_row)?;
            rows.collect()
        })
    }

    /// Edges whose target lives in the given repo, optionally filtered by
    /// a glob over the target entity's file segment.
    pub fn get_edges_targeting_repo(
        &self,
        repo_id: &str,
        file_pattern: Option<&str>,
    ) -> Result<Vec<CrossRepoEdge>> {
        let edges = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT source_repo, source_entity_id, target_repo, target_entity_id, edge_type, metadata
                 FROM cross_repo_edges WHERE target_repo = ?",
            )?;
            let rows = stmt.query_map(params![repo_id], Self::edge_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
        })?;
        let Some(pattern) = file_pattern else {
            return Ok(edges);
        };
        let matcher = globset::Glob::new(pattern)
            .map_err(|e| DevacError::Input(format!("bad file pattern `{pattern}`: {e}")))?
            .compile_matcher();
        Ok(edges
            .into_iter()
            .filter(|e| {
                // entity_id = {repo}:{pkg}:{file}:{kind}:{hash}
                e.target_entity_id
                    .split(':')
                    .nth(2)
                    .map_or(false, |file| matcher.is_match(file))
            })
            .collect())
    }

    /// Store a query result. `ttl_seconds = 0` means never cache.
    pub fn cache_query(&self, query_hash: &str, result: &str, ttl_seconds: i64) -> Result<()> {
        self.guard_writable()?;
        if ttl_seconds <= 0 {
            return Ok(());
        }
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO query_cache (query_hash, result, ttl_seconds, created_at)
                 VALUES (?, ?, ?, ?)",
                params![query_hash, result, ttl_seconds, now_millis() / 1000],
            )?;
            Ok(())
        })
    }

    /// Fetch a cached result if still valid. Expired rows are deleted
    /// lazily on read.
    pub fn get_cached_query(&self, query_hash: &str) -> Result<Option<String>> {
        let row: Option<(String, i64, i64)> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT result, ttl_seconds, created_at FROM query_cache WHERE query_hash = ?",
            )?;
            let mut rows = stmt.query_map(params![query_hash], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            rows.next().transpose()
        })?;
        let Some((result, ttl, created_at)) = row else {
            return Ok(None);
        };
        let now = now_millis() / 1000;
        if ttl > 0 && now - created_at < ttl {
            return Ok(Some(result));
        }
        if !self.read_only {
            self.with_conn(|conn| {
                conn.execute("DELETE FROM query_cache WHERE query_hash = ?", params![query_hash])?;
                Ok(())
            })?;
        }
        Ok(None)
    }

    /// Close the hub. Idempotent; every operation afterwards fails with
    /// `NotInitialized`.
    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap();
        *guard = None;
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().unwrap().is_none()
    }
}
