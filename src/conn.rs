//! Connection opener and tuning policy (spec §4.5).
//!
//! This crate opens plain SQLite databases through `rusqlite`; the
//! page-level compression VFS and URL-based read-only VFS spec.md names are
//! external collaborators out of scope here (spec §1). `threads`,
//! `zstd_level`, `outer_page_KiB`, `web`, and `force_prefetch` are accepted
//! by [`GenomicSqliteConfig`] and echoed by `default_config_json` for
//! interface fidelity, but only the options below have a native PRAGMA
//! applied.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::config::GenomicSqliteConfig;
use crate::error::Result;

/// Open a database applying the tuning policy from `config`.
///
/// Mirrors the teacher's `StatsStore::connect`: open, then apply PRAGMAs,
/// then let the caller install schema.
pub fn open<P: AsRef<Path>>(path: P, config: &GenomicSqliteConfig) -> Result<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    if config.immutable {
        flags = OpenFlags::SQLITE_OPEN_READ_ONLY;
    }
    let conn = Connection::open_with_flags(path, flags)?;
    apply_tuning(&conn, config)?;
    Ok(conn)
}

/// Open an existing database read-only, matching `immutable: true` (spec
/// §4.5) without requiring the caller to set it on the config struct too.
pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    conn.pragma_update(None, "query_only", true)?;
    Ok(conn)
}

fn apply_tuning(conn: &Connection, config: &GenomicSqliteConfig) -> Result<()> {
    conn.pragma_update(None, "page_size", config.inner_page_kib * 1024)?;
    conn.pragma_update(None, "cache_size", -(config.page_cache_mib * 1024))?;

    if config.unsafe_load {
        conn.pragma_update(None, "journal_mode", "OFF")?;
        conn.pragma_update(None, "synchronous", "OFF")?;
        conn.pragma_update(None, "foreign_keys", false)?;
    } else {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
    }

    if config.immutable {
        conn.pragma_update(None, "query_only", true)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_and_tunes_in_memory() {
        let config = GenomicSqliteConfig::default();
        let conn = open(":memory:", &config).unwrap();
        let page_size: i64 = conn
            .pragma_query_value(None, "page_size", |row| row.get(0))
            .unwrap();
        assert_eq!(page_size, 16 * 1024);
    }

    #[test]
    fn unsafe_load_applies_without_error() {
        let mut config = GenomicSqliteConfig::default();
        config.unsafe_load = true;
        let conn = open(":memory:", &config).unwrap();
        let synchronous: i64 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 0);
    }

    #[test]
    fn immutable_opens_read_only_on_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.sqlite");
        {
            let config = GenomicSqliteConfig::default();
            let conn = open(&path, &config).unwrap();
            conn.execute_batch("CREATE TABLE t(x INTEGER)").unwrap();
        }
        let ro = open_read_only(&path).unwrap();
        let result = ro.execute_batch("INSERT INTO t VALUES (1)");
        assert!(result.is_err());
    }
}
