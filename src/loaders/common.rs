//! Flags shared by every `*_into_sqlite` loader binary (spec §6), grounded
//! on the teacher's per-subcommand `Args` structs in `main.rs`.

use std::path::PathBuf;

use clap::Args;

#[derive(Args, Clone)]
pub struct LoaderArgs {
    /// Input file to load. Reads standard input when omitted.
    pub input: Option<PathBuf>,

    /// SQLite database to create or append to.
    #[arg(long, default_value = "data/genomicsqlite.db")]
    pub sqlite: PathBuf,

    /// Prefix prepended to the generated table name.
    #[arg(long, default_value = "")]
    pub table_prefix: String,

    /// Skip installing a Genomic Range Index on the loaded table.
    #[arg(long)]
    pub no_gri: bool,

    /// Inner SQLite page size in KiB.
    #[arg(long = "inner-page-KiB", default_value_t = 16)]
    pub inner_page_kib: i64,

    /// Outer (compressed) page size in KiB, accepted for interface fidelity
    /// (see `src/conn.rs` doc comment); not applied to the open connection.
    #[arg(long = "outer-page-KiB", default_value_t = 32)]
    pub outer_page_kib: i64,

    /// `max_depth` passed to `create_genomic_range_index_sql` (-1 = every
    /// level).
    #[arg(short = 'l', long = "level", default_value_t = -1)]
    pub level: i64,

    /// Suppress progress output.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl LoaderArgs {
    pub fn genomicsqlite_config(&self) -> crate::config::GenomicSqliteConfig {
        let mut config = crate::config::GenomicSqliteConfig::default();
        config.inner_page_kib = self.inner_page_kib;
        config.outer_page_kib = self.outer_page_kib;
        config.unsafe_load = true;
        config
    }
}
