//! Unified diagnostics storage on the hub

use crate::hub::FederationHub;
use crate::model::{
    DiagnosticCounts, DiagnosticFilter, DiagnosticSeverity, DiagnosticSource,
    DiagnosticSummaryRow, SummaryGroupBy, UnifiedDiagnostic,
};
use devac_core::{Result, now_millis};
use duckdb::{params, params_from_iter};

/// ORDER BY fragment: severity (critical first), then recency.
const SEVERITY_ORDER: &str = "CASE severity
    WHEN 'critical' THEN 0
    WHEN 'error' THEN 1
    WHEN 'warning' THEN 2
    WHEN 'suggestion' THEN 3
    ELSE 4 END, updated_at DESC";

fn diagnostic_from_row(row: &duckdb::Row<'_>) -> std::result::Result<UnifiedDiagnostic, duckdb::Error> {
    Ok(UnifiedDiagnostic {
        diagnostic_id: row.get(0)?,
        repo_id: row.get(1)?,
        source: DiagnosticSource::parse_source(&row.get::<_, String>(2)?)
            .unwrap_or(DiagnosticSource::CiCheck),
        file: row.get(3)?,
        line: row.get::<_, Option<i64>>(4)?.map(|v| v as u32),
        column: row.get::<_, Option<i64>>(5)?.map(|v| v as u32),
        severity: DiagnosticSeverity::parse_severity(&row.get::<_, String>(6)?)
            .unwrap_or(DiagnosticSeverity::Note),
        category: row.get(7)?,
        title: row.get(8)?,
        description: row.get(9)?,
        code: row.get(10)?,
        suggestion: row.get(11)?,
        resolved: row.get(12)?,
        actionable: row.get(13)?,
        reference: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl FederationHub {
    /// Insert or update diagnostics by id. `created_at` of an existing row
    /// is preserved; everything else is replaced.
    pub fn upsert_diagnostics(&self, items: &[UnifiedDiagnostic]) -> Result<()> {
        self.guard_writable()?;
        if items.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let mut existing_created = conn.prepare(
                "SELECT created_at FROM diagnostics WHERE diagnostic_id = ?",
            )?;
            let mut upsert = conn.prepare(
                "INSERT OR REPLACE INTO diagnostics
                 (diagnostic_id, repo_id, source, file, line, col, severity, category, title,
                  description, code, suggestion, resolved, actionable, reference, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            let now = now_millis();
            for item in items {
                let existing: Option<i64> = existing_created
                    .query_map(params![item.diagnostic_id], |row| row.get(0))?
                    .next()
                    .transpose()?;
                let created_at = existing.unwrap_or(if item.created_at > 0 { item.created_at } else { now });
                upsert.execute(params![
                    item.diagnostic_id,
                    item.repo_id,
                    item.source.as_str(),
                    item.file,
                    item.line.map(|v| v as i64),
                    item.column.map(|v| v as i64),
                    item.severity.as_str(),
                    item.category,
                    item.title,
                    item.description,
                    item.code,
                    item.suggestion,
                    item.resolved,
                    item.actionable,
                    item.reference,
                    created_at,
                    now,
                ])?;
            }
            Ok(())
        })
    }

    /// Delete diagnostics, optionally scoped to a repo and/or source.
    /// Returns the number of rows removed.
    pub fn clear_diagnostics(
        &self,
        repo_id: Option<&str>,
        source: Option<DiagnosticSource>,
    ) -> Result<usize> {
        self.guard_writable()?;
        let mut sql = "DELETE FROM diagnostics WHERE 1=1".to_string();
        let mut args: Vec<String> = Vec::new();
        if let Some(repo) = repo_id {
            sql.push_str(" AND repo_id = ?");
            args.push(repo.to_string());
        }
        if let Some(source) = source {
            sql.push_str(" AND source = ?");
            args.push(source.as_str().to_string());
        }
        self.with_conn(|conn| conn.execute(&sql, params_from_iter(args.iter())))
    }

    /// Query diagnostics ordered by severity (critical → note), then by
    /// most recent update.
    pub fn query_diagnostics(&self, filter: &DiagnosticFilter) -> Result<Vec<UnifiedDiagnostic>> {
        let mut sql = String::from(
            "SELECT diagnostic_id, repo_id, source, file, line, col, severity, category, title,
                    description, code, suggestion, resolved, actionable, reference, created_at, updated_at
             FROM diagnostics WHERE 1=1",
        );
        let mut args: Vec<String> = Vec::new();
        if let Some(repo) = &filter.repo_id {
            sql.push_str(" AND repo_id = ?");
            args.push(repo.clone());
        }
        if let Some(source) = filter.source {
            sql.push_str(" AND source = ?");
            args.push(source.as_str().to_string());
        }
        if let Some(severity) = filter.severity {
            sql.push_str(" AND severity = ?");
            args.push(severity.as_str().to_string());
        }
        if let Some(category) = &filter.category {
            sql.push_str(" AND category = ?");
            args.push(category.clone());
        }
        if let Some(file) = &filter.file {
            sql.push_str(" AND file = ?");
            args.push(file.clone());
        }
        if let Some(resolved) = filter.resolved {
            sql.push_str(if resolved { " AND resolved" } else { " AND NOT resolved" });
        }
        if let Some(actionable) = filter.actionable {
            sql.push_str(if actionable { " AND actionable" } else { " AND NOT actionable" });
        }
        sql.push_str(&format!(" ORDER BY {SEVERITY_ORDER}"));
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), diagnostic_from_row)?;
            rows.collect()
        })
    }

    /// Grouped counts, most-loaded group first.
    pub fn diagnostics_summary(&self, group_by: SummaryGroupBy) -> Result<Vec<DiagnosticSummaryRow>> {
        let column = group_by.column();
        let sql = format!(
            "SELECT {column}, COUNT(*), COUNT(*) FILTER (WHERE NOT resolved)
             FROM diagnostics GROUP BY {column} ORDER BY 2 DESC"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                Ok(DiagnosticSummaryRow {
                    key: row.get(0)?,
                    total: row.get(1)?,
                    unresolved: row.get(2)?,
                })
            })?;
            rows.collect()
        })
    }

    /// Overall counts for status lines.
    pub fn diagnostics_counts(&self) -> Result<DiagnosticCounts> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*),
                        COUNT(*) FILTER (WHERE NOT resolved),
                        COUNT(*) FILTER (WHERE severity = 'critical' AND NOT resolved),
                        COUNT(*) FILTER (WHERE severity = 'error' AND NOT resolved),
                        COUNT(*) FILTER (WHERE severity = 'warning' AND NOT resolved)
                 FROM diagnostics",
                [],
                |row| {
                    Ok(DiagnosticCounts {
                        total: row.get(0)?,
                        unresolved: row.get(1)?,
                        critical: row.get(2)?,
                        errors: row.get(3)?,
                        warnings: row.get(4)?,
                    })
                },
            )
        })
    }

    /// Mark diagnostics resolved; the records are retained. Returns how
    /// many rows flipped.
    pub fn resolve_diagnostics(&self, diagnostic_ids: &[String]) -> Result<usize> {
        self.guard_writable()?;
        if diagnostic_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; diagnostic_ids.len()].join(", ");
        let sql = format!(
            "UPDATE diagnostics SET resolved = true, updated_at = {} WHERE diagnostic_id IN ({placeholders})",
            now_millis()
        );
        self.with_conn(|conn| conn.execute(&sql, params_from_iter(diagnostic_ids.iter())))
    }

    /// Ingest validator issues (tsc/eslint/biome/test/coverage adapters)
    /// as diagnostics for a repo.
    pub fn ingest_validation_issues(
        &self,
        repo_id: &str,
        issues: &[devac_core::ValidationIssue],
    ) -> Result<usize> {
        let now = now_millis();
        let diagnostics: Vec<UnifiedDiagnostic> = issues
            .iter()
            .map(|issue| {
                let source = match issue.source {
                    devac_core::ValidationSource::Tsc => DiagnosticSource::Tsc,
                    devac_core::ValidationSource::Eslint => DiagnosticSource::Eslint,
                    devac_core::ValidationSource::Biome => DiagnosticSource::Biome,
                    devac_core::ValidationSource::Test => DiagnosticSource::Test,
                    devac_core::ValidationSource::Coverage => DiagnosticSource::Coverage,
                };
                let severity = match issue.severity {
                    devac_core::ValidationSeverity::Error => DiagnosticSeverity::Error,
                    devac_core::ValidationSeverity::Warning => DiagnosticSeverity::Warning,
                };
                UnifiedDiagnostic {
                    diagnostic_id: format!(
                        "{repo_id}:{}:{}:{}:{}",
                        source.as_str(),
                        issue.file,
                        issue.line,
                        issue.code.as_deref().unwrap_or("-")
                    ),
                    repo_id: repo_id.to_string(),
                    source,
                    file: Some(issue.file.clone()),
                    line: Some(issue.line),
                    column: Some(issue.column),
                    severity,
                    category: "validation".to_string(),
                    title: issue.message.clone(),
                    description: None,
                    code: issue.code.clone(),
                    suggestion: None,
                    resolved: false,
                    actionable: true,
                    reference: None,
                    created_at: now,
                    updated_at: now,
                }
            })
            .collect();
        self.upsert_diagnostics(&diagnostics)?;
        Ok(diagnostics.len())
    }
}
