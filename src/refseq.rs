//! Reference-sequence catalog (spec §4.4): `_gri_refseq` table, DDL/DML
//! generators, lookup helpers, and a bundled table of common contigs.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// One reference sequence's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RefSeq {
    pub rid: i64,
    pub name: String,
    pub length: i64,
    pub assembly: Option<String>,
    pub refget_id: Option<String>,
    pub meta_json: Option<String>,
}

/// DDL to create `_gri_refseq` if absent, scoped to an optional schema
/// (ATTACHed database) name.
pub fn create_refseq_table_sql(schema: Option<&str>) -> String {
    let prefix = schema.map(|s| format!("{s}.")).unwrap_or_default();
    format!(
        "CREATE TABLE IF NOT EXISTS {prefix}_gri_refseq (\n\
         \x20   rid INTEGER PRIMARY KEY,\n\
         \x20   name TEXT NOT NULL UNIQUE,\n\
         \x20   length INTEGER NOT NULL,\n\
         \x20   assembly TEXT,\n\
         \x20   refget_id TEXT,\n\
         \x20   meta_json TEXT\n\
         );"
    )
}

/// `put_genomic_reference_assembly_sql(assembly, schema)` (spec §6):
/// installs the table and seeds the bundled contigs of a known assembly.
/// Unknown assembly names still install the table but insert nothing.
pub fn put_reference_assembly_sql(assembly: &str, schema: Option<&str>) -> String {
    let prefix = schema.map(|s| format!("{s}.")).unwrap_or_default();
    let mut sql = create_refseq_table_sql(schema);
    sql.push('\n');
    for (rid, (name, length)) in bundled_contigs(assembly).iter().enumerate() {
        sql.push_str(&format!(
            "INSERT OR IGNORE INTO {prefix}_gri_refseq (rid, name, length, assembly) VALUES ({rid}, '{name}', {length}, '{assembly}');\n"
        ));
    }
    sql
}

/// `put_genomic_reference_sequence_sql(name, length, assembly, refget_id,
/// meta_json, rid, schema)` (spec §6). `rid < 0` means auto-assign the next
/// dense id.
#[allow(clippy::too_many_arguments)]
pub fn put_reference_sequence_sql(
    name: &str,
    length: i64,
    assembly: Option<&str>,
    refget_id: Option<&str>,
    meta_json: Option<&str>,
    rid: i64,
    schema: Option<&str>,
) -> String {
    let prefix = schema.map(|s| format!("{s}.")).unwrap_or_default();
    let rid_expr = if rid >= 0 {
        rid.to_string()
    } else {
        format!("(SELECT coalesce(max(rid)+1, 0) FROM {prefix}_gri_refseq)")
    };
    let assembly_sql = sql_text_or_null(assembly);
    let refget_sql = sql_text_or_null(refget_id);
    let meta_sql = sql_text_or_null(meta_json);
    format!(
        "INSERT INTO {prefix}_gri_refseq (rid, name, length, assembly, refget_id, meta_json)\n\
         VALUES ({rid_expr}, '{name}', {length}, {assembly_sql}, {refget_sql}, {meta_sql});"
    )
}

fn sql_text_or_null(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("'{}'", v.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

/// Insert one reference sequence directly through an open connection,
/// returning the assigned `rid`.
pub fn put_reference_sequence(conn: &Connection, refseq: &RefSeq) -> Result<i64> {
    conn.execute(
        "INSERT INTO _gri_refseq (rid, name, length, assembly, refget_id, meta_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            refseq.rid,
            refseq.name,
            refseq.length,
            refseq.assembly,
            refseq.refget_id,
            refseq.meta_json,
        ],
    )?;
    Ok(refseq.rid)
}

/// Look up all reference sequences keyed by `rid`.
pub fn reference_sequences_by_rid(conn: &Connection) -> Result<HashMap<i64, RefSeq>> {
    let mut stmt = conn.prepare(
        "SELECT rid, name, length, assembly, refget_id, meta_json FROM _gri_refseq",
    )?;
    let rows = stmt.query_map([], row_to_refseq)?;
    let mut out = HashMap::new();
    for row in rows {
        let refseq = row?;
        out.insert(refseq.rid, refseq);
    }
    Ok(out)
}

/// Look up one reference sequence by name.
pub fn reference_sequence_by_name(conn: &Connection, name: &str) -> Result<Option<RefSeq>> {
    let mut stmt = conn.prepare(
        "SELECT rid, name, length, assembly, refget_id, meta_json FROM _gri_refseq WHERE name = ?1",
    )?;
    let refseq = stmt
        .query_row(params![name], row_to_refseq)
        .optional()?;
    Ok(refseq)
}

fn row_to_refseq(row: &rusqlite::Row) -> rusqlite::Result<RefSeq> {
    Ok(RefSeq {
        rid: row.get(0)?,
        name: row.get(1)?,
        length: row.get(2)?,
        assembly: row.get(3)?,
        refget_id: row.get(4)?,
        meta_json: row.get(5)?,
    })
}

/// Bundled table of common contigs for a standard assembly, so callers can
/// bootstrap without external files (spec §4.4). Only GRCh38's primary
/// assembly is bundled; unrecognized assembly names yield an empty slice.
pub fn bundled_contigs(assembly: &str) -> &'static [(&'static str, i64)] {
    if assembly.eq_ignore_ascii_case("GRCh38") {
        GRCH38_CONTIGS
    } else {
        &[]
    }
}

pub static GRCH38_CONTIGS: &[(&str, i64)] = &[
    ("chr1", 248956422),
    ("chr2", 242193529),
    ("chr3", 198295559),
    ("chr4", 190214555),
    ("chr5", 181538259),
    ("chr6", 170805979),
    ("chr7", 159345973),
    ("chr8", 145138636),
    ("chr9", 138394717),
    ("chr10", 133797422),
    ("chr11", 135086622),
    ("chr12", 133275309),
    ("chr13", 114364328),
    ("chr14", 107043718),
    ("chr15", 101991189),
    ("chr16", 90338345),
    ("chr17", 83257441),
    ("chr18", 80373285),
    ("chr19", 58617616),
    ("chr20", 64444167),
    ("chr21", 46709983),
    ("chr22", 50818468),
    ("chrX", 156040895),
    ("chrY", 57227415),
    ("chrM", 16569),
];
