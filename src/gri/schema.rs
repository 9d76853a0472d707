//! GRI schema installer (spec §4.2): `create_genomic_range_index_sql`.

use chrono::Utc;
use rusqlite::Connection;

use crate::coord::{GRI_LEVELS, GRI_MAX_LEVEL};
use crate::error::{GenomicSqliteError, Result};

/// `max_depth` meaning "use every level" (spec §4.2).
pub const MAX_DEPTH_AUTO: i64 = -1;

/// DDL script that records `(table, rid_col, beg_expr, end_expr, max_depth,
/// created_utc)` per database, consulted by the query compiler (spec §4.2
/// point 4, §4.3).
pub const CREATE_GRI_META_SQL: &str = "\
CREATE TABLE IF NOT EXISTS _gri_meta (
    table_name TEXT PRIMARY KEY,
    rid_col TEXT NOT NULL,
    beg_expr TEXT NOT NULL,
    end_expr TEXT NOT NULL,
    max_depth INTEGER NOT NULL,
    created_utc TEXT NOT NULL
);";

/// Generate the DDL script that installs a Genomic Range Index on `table`,
/// interpreting `(rid_col, beg_expr, end_expr)` as the interval columns
/// (spec §4.2). The caller executes the returned script inside a
/// transaction.
///
/// Validates identifiers and checks `table` exists and carries no
/// conflicting `_gri_lvl`/`_gri_beg` columns through `conn` before
/// generating DDL, surfacing `NO_SUCH_TABLE` / `SCHEMA_CONFLICT` /
/// `INVALID_ARGUMENT` as described in spec §4.2.
pub fn create_genomic_range_index_sql(
    conn: &Connection,
    table: &str,
    rid_col: &str,
    beg_expr: &str,
    end_expr: &str,
    max_depth: i64,
) -> Result<String> {
    validate_identifier(table)?;
    validate_identifier(rid_col)?;

    if !table_exists(conn, table)? {
        return Err(GenomicSqliteError::NoSuchTable(table.to_string()));
    }
    if let Some(existing) = existing_gri_columns(conn, table)? {
        return Err(GenomicSqliteError::SchemaConflict {
            table: table.to_string(),
            detail: format!(
                "_gri_lvl/_gri_beg already present with type(s) {existing}"
            ),
        });
    }

    let depth = if max_depth < 0 {
        GRI_MAX_LEVEL
    } else {
        max_depth.min(GRI_MAX_LEVEL)
    };
    if depth < 0 || depth >= GRI_LEVELS {
        return Err(GenomicSqliteError::InvalidArgument(format!(
            "max_depth {max_depth} out of range"
        )));
    }

    let lvl_expr = level_case_expr(rid_col, beg_expr, end_expr, depth);
    let index_name = format!("{table}_gri");
    let created_utc = Utc::now().to_rfc3339();

    let mut script = String::new();
    script.push_str(&format!(
        "ALTER TABLE {table} ADD COLUMN _gri_lvl INTEGER GENERATED ALWAYS AS ({lvl_expr}) VIRTUAL;\n"
    ));
    script.push_str(&format!(
        "ALTER TABLE {table} ADD COLUMN _gri_beg INTEGER GENERATED ALWAYS AS ({beg_expr}) VIRTUAL;\n"
    ));
    script.push_str(&format!(
        "CREATE INDEX IF NOT EXISTS {index_name} ON {table} ({rid_col}, _gri_lvl, _gri_beg);\n"
    ));
    script.push_str(CREATE_GRI_META_SQL);
    script.push('\n');
    script.push_str(&format!(
        "INSERT OR REPLACE INTO _gri_meta (table_name, rid_col, beg_expr, end_expr, max_depth, created_utc)\n\
         VALUES ('{table}', '{rid_col}', '{beg}', '{end}', {depth}, '{created_utc}');\n",
        beg = beg_expr.replace('\'', "''"),
        end = end_expr.replace('\'', "''"),
    ));

    Ok(script)
}

/// Build the `CASE` expression computing `_gri_lvl` per spec §3: the
/// largest level `L <= max_depth` such that `beg` and `end-1` (or `beg` for
/// a degenerate point) share a bin at `L`, clamped so that the loop always
/// terminates at `max_depth` (coarser than that is never selected, wider
/// intervals simply land at `max_depth`).
fn level_case_expr(_rid_col: &str, beg: &str, end: &str, max_depth: i64) -> String {
    let last_expr = format!("(CASE WHEN ({end}) > ({beg}) THEN ({end}) - 1 ELSE ({beg}) END)");
    let mut expr = String::from("CASE");
    for l in (0..=max_depth).rev() {
        let width = crate::coord::bin_width(l);
        expr.push_str(&format!(
            "\n    WHEN ({beg}) / {width} = ({last_expr}) / {width} THEN {l}"
        ));
    }
    expr.push_str(&format!("\n    ELSE {max_depth}\nEND"));
    expr
}

fn validate_identifier(ident: &str) -> Result<()> {
    let ok = !ident.is_empty()
        && ident
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && ident
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(GenomicSqliteError::InvalidArgument(format!(
            "invalid identifier: {ident}"
        )))
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Returns the declared type of `_gri_lvl` if the table already has one
/// (indicating a prior, possibly conflicting, GRI installation).
fn existing_gri_columns(conn: &Connection, table: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    let mut found = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == "_gri_lvl" || name == "_gri_beg" {
            let decl_type: String = row.get(2)?;
            found.push(format!("{name}:{decl_type}"));
        }
    }
    if found.is_empty() {
        Ok(None)
    } else {
        Ok(Some(found.join(", ")))
    }
}
