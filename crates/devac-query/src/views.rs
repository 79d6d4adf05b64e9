//! Overlay view SQL generation

use devac_core::BRANCH_BASE;
use devac_seed::{Table, layout};
use std::path::Path;

/// The view name a table's placeholder expands to.
pub fn view_name(table: Table) -> String {
    format!("devac_{}", table.base_name())
}

/// Primary-key columns per table, for the delta-hides-base predicate.
fn key_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Nodes => &["entity_id"],
        Table::Edges => &["source_entity_id", "target_entity_id", "edge_type"],
        Table::ExternalRefs => &["source_entity_id", "module_specifier", "imported_symbol"],
        Table::Effects => &["effect_id"],
    }
}

fn quote_path(path: &Path) -> String {
    // DuckDB string literal; single quotes in paths are doubled.
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

/// SELECT over one package partition pair, applying the overlay rule:
/// visible rows are the branch's non-deleted rows plus the base's
/// non-deleted rows whose key the branch doesn't mention at all.
fn package_select(package: &Path, branch: &str, table: Table) -> Option<String> {
    let base_path = layout::table_path(package, BRANCH_BASE, table);
    let delta_path = if branch == BRANCH_BASE {
        None
    } else {
        let p = layout::table_path(package, branch, table);
        p.exists().then_some(p)
    };
    let base = base_path.exists().then_some(base_path);

    match (base, delta_path) {
        (Some(base), Some(delta)) => {
            let keys = key_columns(table)
                .iter()
                .map(|k| format!("d.{k} = b.{k}"))
                .collect::<Vec<_>>()
                .join(" AND ");
            Some(format!(
                "SELECT * FROM read_parquet({delta}) WHERE NOT is_deleted \
                 UNION ALL \
                 SELECT b.* FROM read_parquet({base}) b \
                 WHERE NOT b.is_deleted \
                 AND NOT EXISTS (SELECT 1 FROM read_parquet({delta}) d WHERE {keys})",
                delta = quote_path(&delta),
                base = quote_path(&base),
            ))
        }
        (Some(base), None) => Some(format!(
            "SELECT * FROM read_parquet({}) WHERE NOT is_deleted",
            quote_path(&base)
        )),
        (None, Some(delta)) => Some(format!(
            "SELECT * FROM read_parquet({}) WHERE NOT is_deleted",
            quote_path(&delta)
        )),
        (None, None) => None,
    }
}

/// `CREATE OR REPLACE VIEW` statement unioning the selected packages, or
/// `None` when no package has this table on disk.
pub(crate) fn view_sql(packages: &[std::path::PathBuf], branch: &str, table: Table) -> Option<String> {
    let selects: Vec<String> = packages
        .iter()
        .filter_map(|p| package_select(p, branch, table))
        .collect();
    if selects.is_empty() {
        return None;
    }
    Some(format!(
        "CREATE OR REPLACE VIEW {} AS {}",
        view_name(table),
        selects.join(" UNION ALL ")
    ))
}
