//! Query engine: connection pool, view setup, recovery

use crate::views;
use devac_core::{DevacError, Result};
use devac_seed::layout;
use duckdb::Connection;
use duckdb::types::ValueRef;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A result row keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Idle connections kept around for reuse.
    pub pool_size: usize,
    /// Optional DuckDB memory limit, e.g. `"1GB"`.
    pub memory_limit: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            pool_size: 4,
            memory_limit: None,
        }
    }
}

/// Seed availability for a query over a set of packages.
#[derive(Debug, Clone)]
pub struct Readiness {
    pub ready: bool,
    pub reason: Option<String>,
    pub suggestion: Option<String>,
    pub available_count: usize,
    pub missing_count: usize,
}

struct Inner {
    template: Connection,
    idle: Vec<Connection>,
    /// View definitions, replayed after a rebuild.
    view_sql: Vec<String>,
    /// Placeholder (`{nodes}`) → view name.
    views: HashMap<&'static str, String>,
}

/// SQL engine over seed views. All queries run through
/// `execute_with_recovery`: a fatal engine error rebuilds the pool and
/// retries exactly once; plain SQL errors propagate untouched.
pub struct QueryEngine {
    config: EngineConfig,
    inner: Mutex<Option<Inner>>,
}

fn open_connection(config: &EngineConfig) -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| DevacError::FatalEngine(format!("failed to open engine: {e}")))?;
    if let Some(limit) = &config.memory_limit {
        conn.execute_batch(&format!("SET memory_limit='{limit}'"))
            .map_err(|e| DevacError::Input(format!("bad memory limit: {e}")))?;
    }
    Ok(conn)
}

/// Whether a DuckDB error warrants teardown + rebuild + retry.
fn is_fatal(e: &duckdb::Error) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("out of memory")
        || msg.contains("database has been invalidated")
        || msg.contains("connection")
        || msg.contains("fatal")
        || msg.contains("io error")
}

fn classify(e: duckdb::Error) -> DevacError {
    if is_fatal(&e) {
        DevacError::FatalEngine(e.to_string())
    } else {
        DevacError::Input(format!("query failed: {e}"))
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::from(i),
        ValueRef::SmallInt(i) => Value::from(i),
        ValueRef::Int(i) => Value::from(i),
        ValueRef::BigInt(i) => Value::from(i),
        ValueRef::UTinyInt(u) => Value::from(u),
        ValueRef::USmallInt(u) => Value::from(u),
        ValueRef::UInt(u) => Value::from(u),
        ValueRef::UBigInt(u) => Value::from(u),
        ValueRef::Float(f) => Value::from(f),
        ValueRef::Double(f) => Value::from(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        other => Value::String(format!("{other:?}")),
    }
}

fn run_cells(conn: &Connection, sql: &str) -> std::result::Result<(Vec<String>, Vec<Vec<Value>>), duckdb::Error> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut names: Vec<String> = Vec::new();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        if names.is_empty() {
            names = row
                .as_ref()
                .column_names()
                .into_iter()
                .map(|n| n.to_string())
                .collect();
        }
        let mut cells = Vec::with_capacity(names.len());
        for i in 0..names.len() {
            cells.push(value_to_json(row.get_ref(i)?));
        }
        out.push(cells);
    }
    Ok((names, out))
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let template = open_connection(&config)?;
        Ok(QueryEngine {
            config,
            inner: Mutex::new(Some(Inner {
                template,
                idle: Vec::new(),
                view_sql: Vec::new(),
                views: HashMap::new(),
            })),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    /// Create the unified views for the selected packages + branch.
    /// Packages without seeds are reported as warnings; the call only
    /// fails when every package lacks seeds.
    pub fn setup_views(&self, packages: &[PathBuf], branch: &str) -> Result<Vec<String>> {
        if packages.is_empty() {
            return Err(DevacError::Input("no packages selected".to_string()));
        }
        for package in packages {
            if !layout::has_seed(package, devac_core::BRANCH_BASE) && !layout::has_seed(package, branch) {
                tracing::warn!("Package {} has no seed data", package.display());
            }
        }

        let mut statements = Vec::new();
        let mut created = Vec::new();
        let mut views = HashMap::new();
        for table in layout::TABLES {
            if let Some(sql) = views::view_sql(packages, branch, table) {
                statements.push(sql);
                let name = views::view_name(table);
                views.insert(table.placeholder(), name.clone());
                created.push(name);
            }
        }
        if created.is_empty() {
            return Err(DevacError::NotFound(format!(
                "no seed data found for any of the {} selected packages",
                packages.len()
            )));
        }

        let mut guard = self.inner.lock().unwrap();
        let inner = guard.as_mut().ok_or(DevacError::NotInitialized)?;
        for sql in &statements {
            inner.template.execute_batch(sql).map_err(classify)?;
        }
        inner.view_sql = statements;
        inner.views = views;
        // Connections cloned before the views existed would not see them.
        inner.idle.clear();
        Ok(created)
    }

    fn expand_placeholders(&self, sql: &str) -> Result<String> {
        let guard = self.inner.lock().unwrap();
        let inner = guard.as_ref().ok_or(DevacError::NotInitialized)?;
        let mut expanded = sql.to_string();
        for table in layout::TABLES {
            let placeholder = table.placeholder();
            if expanded.contains(placeholder) {
                let view = inner.views.get(placeholder).ok_or_else(|| {
                    DevacError::Input(format!(
                        "placeholder {placeholder} used before setup_views"
                    ))
                })?;
                expanded = expanded.replace(placeholder, view);
            }
        }
        Ok(expanded)
    }

    fn checkout(&self) -> Result<Connection> {
        let mut guard = self.inner.lock().unwrap();
        let inner = guard.as_mut().ok_or(DevacError::NotInitialized)?;
        match inner.idle.pop() {
            Some(conn) => Ok(conn),
            None => inner
                .template
                .try_clone()
                .map_err(|e| DevacError::FatalEngine(format!("clone connection: {e}"))),
        }
    }

    fn checkin(&self, conn: Connection) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(inner) = guard.as_mut() {
            if inner.idle.len() < self.config.pool_size {
                inner.idle.push(conn);
            }
        }
    }

    /// Tear down every connection, reopen, and replay view definitions.
    fn rebuild(&self) -> Result<()> {
        tracing::warn!("Rebuilding query engine after fatal error");
        let mut guard = self.inner.lock().unwrap();
        let inner = guard.as_mut().ok_or(DevacError::NotInitialized)?;
        let template = open_connection(&self.config)?;
        for sql in &inner.view_sql {
            template.execute_batch(sql).map_err(classify)?;
        }
        inner.template = template;
        inner.idle.clear();
        Ok(())
    }

    fn try_once<T>(
        &self,
        f: &dyn Fn(&Connection) -> std::result::Result<T, duckdb::Error>,
    ) -> Result<T> {
        let conn = self.checkout()?;
        let result = f(&conn);
        match result {
            Ok(value) => {
                self.checkin(conn);
                Ok(value)
            }
            Err(e) => {
                let classified = classify(e);
                if !classified.is_fatal_engine() {
                    self.checkin(conn);
                }
                Err(classified)
            }
        }
    }

    /// Run a closure with single-retry recovery on fatal engine errors.
    pub fn execute_with_recovery<T>(
        &self,
        f: &dyn Fn(&Connection) -> std::result::Result<T, duckdb::Error>,
    ) -> Result<T> {
        match self.try_once(f) {
            Err(DevacError::FatalEngine(msg)) => {
                tracing::warn!("Fatal engine error, retrying once: {msg}");
                self.rebuild()?;
                self.try_once(f)
            }
            other => other,
        }
    }

    /// Execute SQL (placeholders expanded) and return rows keyed by column.
    pub fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let expanded = self.expand_placeholders(sql)?;
        let (names, cells) = self.execute_with_recovery(&|conn| run_cells(conn, &expanded))?;
        Ok(cells
            .into_iter()
            .map(|row| {
                names
                    .iter()
                    .cloned()
                    .zip(row)
                    .collect::<Row>()
            })
            .collect())
    }

    /// Execute SQL and return bare cells in column order.
    pub fn execute_cells(&self, sql: &str) -> Result<Vec<Vec<Value>>> {
        let expanded = self.expand_placeholders(sql)?;
        let (_, cells) = self.execute_with_recovery(&|conn| run_cells(conn, &expanded))?;
        Ok(cells)
    }

    /// Convenience: first column of the first row, as a count.
    pub fn execute_count(&self, sql: &str) -> Result<i64> {
        let cells = self.execute_cells(sql)?;
        cells
            .first()
            .and_then(|row| row.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| DevacError::Input("count query returned no numeric value".to_string()))
    }

    /// Check whether the selected packages have queryable seed data.
    pub fn readiness(packages: &[PathBuf], branch: &str) -> Readiness {
        let (available, missing): (Vec<&PathBuf>, Vec<&PathBuf>) = packages.iter().partition(|p| {
            layout::has_seed(p, devac_core::BRANCH_BASE) || layout::has_seed(p, branch)
        });
        if packages.is_empty() {
            return Readiness {
                ready: false,
                reason: Some("no packages selected".to_string()),
                suggestion: Some("pass at least one package path".to_string()),
                available_count: 0,
                missing_count: 0,
            };
        }
        if available.is_empty() {
            return Readiness {
                ready: false,
                reason: Some("no seed data found for the selected packages".to_string()),
                suggestion: Some("run `devac analyze` first".to_string()),
                available_count: 0,
                missing_count: missing.len(),
            };
        }
        Readiness {
            ready: true,
            reason: None,
            suggestion: None,
            available_count: available.len(),
            missing_count: missing.len(),
        }
    }

    /// Scan one package's table directly, bypassing named views. Kept for
    /// callers that predate `setup_views`; placeholders map straight to
    /// `read_parquet` selects here.
    pub fn scan_sql_for_package(package: &Path, branch: &str, sql: &str) -> Result<String> {
        let mut expanded = sql.to_string();
        for table in layout::TABLES {
            let placeholder = table.placeholder();
            if !expanded.contains(placeholder) {
                continue;
            }
            let select = crate::views::view_sql(&[package.to_path_buf()], branch, table)
                .and_then(|create| create.split_once(" AS ").map(|(_, s)| s.to_string()))
                .ok_or_else(|| {
                    DevacError::NotFound(format!(
                        "no {} data for package {}",
                        table.base_name(),
                        package.display()
                    ))
                })?;
            expanded = expanded.replace(placeholder, &format!("({select})"));
        }
        Ok(expanded)
    }

    /// Shut the engine down. Idempotent; queries after close fail with
    /// `NotInitialized`.
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        *guard = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().is_none()
    }
}
