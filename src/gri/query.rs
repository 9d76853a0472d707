//! GRI query compiler (spec §4.3): `genomic_range_rowids_sql`.

use rusqlite::{params, Connection, OptionalExtension};

use crate::coord::{bin_width, GRI_LEVELS};
use crate::error::{GenomicSqliteError, Result};

struct GriMetaRow {
    rid_col: String,
    beg_expr: String,
    end_expr: String,
    max_depth: i64,
}

fn gri_meta_table_exists(conn: &Connection) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_gri_meta')",
        [],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn load_meta(conn: &Connection, table: &str) -> Result<GriMetaRow> {
    // No table has ever been indexed on this connection: `_gri_meta` itself
    // doesn't exist yet, so querying it would fail at `prepare()` with a raw
    // "no such table" error rather than `QueryReturnedNoRows` — check for it
    // explicitly so this reports as `NoIndex` (spec §4.3) like any other
    // un-indexed table.
    if !gri_meta_table_exists(conn)? {
        return Err(GenomicSqliteError::NoIndex(table.to_string()));
    }
    let row = conn
        .query_row(
            "SELECT rid_col, beg_expr, end_expr, max_depth FROM _gri_meta WHERE table_name = ?1",
            params![table],
            |row| {
                Ok(GriMetaRow {
                    rid_col: row.get(0)?,
                    beg_expr: row.get(1)?,
                    end_expr: row.get(2)?,
                    max_depth: row.get(3)?,
                })
            },
        )
        .optional()?;
    row.ok_or_else(|| GenomicSqliteError::NoIndex(table.to_string()))
}

/// Confirm the recorded `_gri_meta` interval expressions still reference
/// columns present on `table`, raising `SCHEMA_DRIFT` (spec §4.3) if the
/// recorded `beg_expr`/`end_expr` are bare column names no longer present.
fn check_schema_drift(conn: &Connection, table: &str, meta: &GriMetaRow) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        columns.push(name);
    }
    for (label, expr) in [
        ("rid_col", meta.rid_col.as_str()),
        ("beg_expr", meta.beg_expr.as_str()),
        ("end_expr", meta.end_expr.as_str()),
    ] {
        let is_bare_ident = expr
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if is_bare_ident && !columns.contains(&expr.to_string()) {
            return Err(GenomicSqliteError::SchemaDrift {
                table: table.to_string(),
                detail: format!("{label} '{expr}' no longer present on {table}"),
            });
        }
    }
    Ok(())
}

struct LevelStats {
    level: i64,
    max_width: i64,
}

/// Query `present(L)`/`maxWidth(L)` for every level `0..=max_depth` (spec
/// §4.3's optimization pass).
fn observed_level_stats(
    conn: &Connection,
    table: &str,
    meta: &GriMetaRow,
) -> Result<Vec<LevelStats>> {
    let mut out = Vec::new();
    for level in 0..=meta.max_depth {
        let present: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE _gri_lvl = ?1)"),
            params![level],
            |row| row.get(0),
        )?;
        if !present {
            continue;
        }
        let max_width: Option<i64> = conn.query_row(
            &format!(
                "SELECT max(({end}) - ({beg})) FROM {table} WHERE _gri_lvl = ?1",
                end = meta.end_expr,
                beg = meta.beg_expr,
            ),
            params![level],
            |row| row.get(0),
        )?;
        out.push(LevelStats {
            level,
            max_width: max_width.unwrap_or_else(|| bin_width(level)),
        });
    }
    Ok(out)
}

/// Generate the parenthesized SQL expression yielding `_rowid_` of every
/// row of `table` overlapping `(qrid_expr, qbeg_expr, qend_expr)` (spec
/// §4.3). `conn` supplies the recorded `(rid_col, beg_expr, end_expr,
/// max_depth)` mapping from `_gri_meta`, raising `NO_INDEX` if absent and
/// `SCHEMA_DRIFT` if the recorded columns no longer exist on `table`.
///
/// When `optimize_conn` is `Some`, the levels actually populated and their
/// observed maximum interval widths are read through it and used to emit a
/// tight disjunction (the *optimized* form); this form goes stale after any
/// write that enlarges a level's `maxWidth` or populates a previously-empty
/// level, and callers must regenerate after such writes (spec's Open
/// Question is resolved as silent staleness — no invalidation is detected
/// here, see DESIGN.md). Passing `optimize_conn: None` emits the *safe*
/// form instead (every level `0..=max_depth`, loose
/// `maxWidth(L) = bin_width(L)`), which stays correct across concurrent
/// updates at the cost of a wider disjunction; `optimize_conn` is typically
/// the same connection as `conn`, but may be omitted when the caller only
/// has an open handle for schema introspection and not for gathering
/// write-sensitive statistics (e.g. a read replica lagging the writer).
pub fn genomic_range_rowids_sql(
    conn: &Connection,
    table: &str,
    optimize_conn: Option<&Connection>,
    qrid_expr: &str,
    qbeg_expr: &str,
    qend_expr: &str,
) -> Result<String> {
    let meta = load_meta(conn, table)?;
    check_schema_drift(conn, table, &meta)?;

    let levels: Vec<(i64, i64)> = match optimize_conn {
        Some(stats_conn) => observed_level_stats(stats_conn, table, &meta)?
            .into_iter()
            .map(|s| (s.level, s.max_width))
            .collect(),
        None => (0..=meta.max_depth).map(|l| (l, bin_width(l))).collect(),
    };

    Ok(render_query(
        table,
        &meta.rid_col,
        &meta.beg_expr,
        &meta.end_expr,
        &levels,
        qrid_expr,
        qbeg_expr,
        qend_expr,
    ))
}

#[allow(clippy::too_many_arguments)]
fn render_query(
    table: &str,
    rid_col: &str,
    beg_expr: &str,
    end_expr: &str,
    levels: &[(i64, i64)],
    qrid_expr: &str,
    qbeg_expr: &str,
    qend_expr: &str,
) -> String {
    let clauses: Vec<String> = levels
        .iter()
        .map(|(level, max_width)| {
            format!(
                "( _gri_lvl = {level} AND _gri_beg BETWEEN max(0, ({qbeg_expr}) - {max_width} + 1) AND (({qend_expr}) - 1) )"
            )
        })
        .collect();
    let disjunction = if clauses.is_empty() {
        "0".to_string()
    } else {
        clauses.join("\n    OR ")
    };
    format!(
        "(SELECT _rowid_ FROM {table} WHERE ({rid_col} = ({qrid_expr})) AND (\n    {disjunction}\n  ) AND ({end_expr}) > ({qbeg_expr}) AND ({beg_expr}) < ({qend_expr}))"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gri::schema::{create_genomic_range_index_sql, MAX_DEPTH_AUTO};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE reads (id INTEGER PRIMARY KEY, rid INTEGER, beg INTEGER, end INTEGER);",
        )
        .unwrap();
        let sql =
            create_genomic_range_index_sql(&conn, "reads", "rid", "beg", "end", MAX_DEPTH_AUTO)
                .unwrap();
        conn.execute_batch(&sql).unwrap();
        conn
    }

    fn insert(conn: &Connection, rid: i64, beg: i64, end: i64) {
        conn.execute(
            "INSERT INTO reads (rid, beg, end) VALUES (?1, ?2, ?3)",
            params![rid, beg, end],
        )
        .unwrap();
    }

    fn query_rowids(conn: &Connection, expr: &str, qrid: i64, qbeg: i64, qend: i64) -> Vec<i64> {
        let sql = format!("SELECT _rowid_ AS r FROM ({expr})");
        let mut stmt = conn.prepare(&sql).unwrap();
        let rows = stmt
            .query_map(params![qrid, qbeg, qend], |row| row.get::<_, i64>(0))
            .unwrap();
        let mut out: Vec<i64> = rows.map(|r| r.unwrap()).collect();
        out.sort();
        out
    }

    #[test]
    fn scenario_4_overlap_query() {
        let conn = setup();
        insert(&conn, 0, 1000, 2000);
        insert(&conn, 0, 100, 600);
        insert(&conn, 0, 10, 20);

        let sql = genomic_range_rowids_sql(&conn, "reads", Some(&conn), "?1", "?2", "?3").unwrap();
        let result = query_rowids(&conn, &sql, 0, 500, 1500);
        assert_eq!(result, vec![1, 2]);
    }

    #[test]
    fn safe_form_matches_optimized_form() {
        let conn = setup();
        insert(&conn, 0, 1000, 2000);
        insert(&conn, 0, 100, 600);
        insert(&conn, 0, 10, 20);

        let optimized = genomic_range_rowids_sql(&conn, "reads", Some(&conn), "?1", "?2", "?3").unwrap();
        let safe = genomic_range_rowids_sql(&conn, "reads", None, "?1", "?2", "?3").unwrap();

        let a = query_rowids(&conn, &optimized, 0, 500, 1500);
        let b = query_rowids(&conn, &safe, 0, 500, 1500);
        assert_eq!(a, b);
    }

    #[test]
    fn safe_form_mentions_every_level_when_max_depth_is_auto() {
        let conn = setup();
        let sql = genomic_range_rowids_sql(&conn, "reads", None, "?1", "?2", "?3").unwrap();
        for l in 0..GRI_LEVELS {
            assert!(sql.contains(&format!("_gri_lvl = {l} ")));
        }
    }

    #[test]
    fn optimized_form_only_mentions_populated_levels() {
        let conn = setup();
        // Only ever insert intervals landing at level 8 (point intervals).
        insert(&conn, 0, 10, 11);
        insert(&conn, 0, 20, 21);

        let sql = genomic_range_rowids_sql(&conn, "reads", Some(&conn), "?1", "?2", "?3").unwrap();
        assert!(sql.contains("_gri_lvl = 8 "));
        for l in 0..8 {
            assert!(!sql.contains(&format!("_gri_lvl = {l} ")));
        }
    }

    #[test]
    fn missing_index_errors() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE reads (rid INTEGER, beg INTEGER, end INTEGER);")
            .unwrap();
        let result = genomic_range_rowids_sql(&conn, "reads", Some(&conn), "?1", "?2", "?3");
        assert!(matches!(result, Err(GenomicSqliteError::NoIndex(_))));
    }

    #[test]
    fn round_trip_drop_and_recreate_yields_identical_query() {
        let conn = setup();
        insert(&conn, 0, 1000, 2000);
        let first = genomic_range_rowids_sql(&conn, "reads", Some(&conn), "?1", "?2", "?3").unwrap();

        conn.execute_batch(
            "DROP INDEX reads_gri;
             ALTER TABLE reads DROP COLUMN _gri_lvl;
             ALTER TABLE reads DROP COLUMN _gri_beg;
             DELETE FROM _gri_meta WHERE table_name = 'reads';",
        )
        .unwrap();
        let sql =
            create_genomic_range_index_sql(&conn, "reads", "rid", "beg", "end", MAX_DEPTH_AUTO)
                .unwrap();
        conn.execute_batch(&sql).unwrap();
        let second = genomic_range_rowids_sql(&conn, "reads", Some(&conn), "?1", "?2", "?3").unwrap();

        assert_eq!(first, second);
    }
}
