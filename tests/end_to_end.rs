//! End-to-end scenarios (spec §8 scenario 6): bulk-load, install a GRI,
//! query, then re-open the database read-only and reproduce the same query
//! result counts. Uses `tempfile`, matching the teacher's on-disk-database
//! test style.

use genomicsqlite::config::GenomicSqliteConfig;
use genomicsqlite::conn;
use genomicsqlite::gri::{create_genomic_range_index_sql, genomic_range_rowids_sql};
use genomicsqlite::refseq::put_reference_assembly_sql;
use rusqlite::params;

fn query_count(conn: &rusqlite::Connection, qrid: i64, qbeg: i64, qend: i64) -> i64 {
    let expr =
        genomic_range_rowids_sql(conn, "reads", Some(conn), "?1", "?2", "?3").unwrap();
    let sql = format!("SELECT COUNT(*) FROM ({expr})");
    conn.query_row(&sql, params![qrid, qbeg, qend], |row| row.get(0))
        .unwrap()
}

#[test]
fn bulk_load_index_query_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genomicsqlite.db");

    let mut config = GenomicSqliteConfig::default();
    config.unsafe_load = true;
    config.inner_page_kib = 16;
    config.outer_page_kib = 32;
    config.zstd_level = 6;

    {
        let conn = conn::open(&path, &config).unwrap();
        conn.execute_batch(
            "CREATE TABLE reads (id INTEGER PRIMARY KEY, rid INTEGER, beg INTEGER, end INTEGER);",
        )
        .unwrap();

        let tx_conn = conn;
        let tx = tx_conn.unchecked_transaction().unwrap();
        for i in 0..2000i64 {
            let beg = i * 50;
            let end = beg + 40;
            tx.execute(
                "INSERT INTO reads (rid, beg, end) VALUES (0, ?1, ?2)",
                params![beg, end],
            )
            .unwrap();
        }
        tx.commit().unwrap();

        let sql = create_genomic_range_index_sql(&tx_conn, "reads", "rid", "beg", "end", -1)
            .unwrap();
        tx_conn.execute_batch(&sql).unwrap();
    }

    let before = {
        let conn = conn::open(&path, &config).unwrap();
        query_count(&conn, 0, 1000, 2000)
    };
    assert!(before > 0);

    let reopened = conn::open_read_only(&path).unwrap();
    let after = query_count(&reopened, 0, 1000, 2000);
    assert_eq!(before, after);

    // Re-opening read-only must still reject writes.
    assert!(reopened
        .execute("INSERT INTO reads (rid, beg, end) VALUES (0, 0, 1)", [])
        .is_err());
}

#[test]
fn reference_catalog_bootstraps_and_loader_tables_can_join_against_it() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(&put_reference_assembly_sql("GRCh38", None))
        .unwrap();

    let rid: i64 = conn
        .query_row(
            "SELECT rid FROM _gri_refseq WHERE name = 'chr1'",
            [],
            |row| row.get(0),
        )
        .unwrap();

    conn.execute_batch(
        "CREATE TABLE variants (id INTEGER PRIMARY KEY, rid INTEGER, beg INTEGER, end INTEGER);",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO variants (rid, beg, end) VALUES (?1, 12345, 12346)",
        params![rid],
    )
    .unwrap();

    let sql = create_genomic_range_index_sql(&conn, "variants", "rid", "beg", "end", -1).unwrap();
    conn.execute_batch(&sql).unwrap();

    let joined: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM variants v JOIN _gri_refseq r ON v.rid = r.rid WHERE r.name = 'chr1'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(joined, 1);
}
