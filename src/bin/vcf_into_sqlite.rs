//! Load a VCF file into a SQLite table with a Genomic Range Index, using
//! `noodles_vcf` for record parsing. Mirrors the teacher's `run_genostats`
//! shape: progress bar, one write transaction, emoji summary print.

use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use genomicsqlite::conn;
use genomicsqlite::gri::schema::create_genomic_range_index_sql;
use genomicsqlite::loaders::common::LoaderArgs;
use genomicsqlite::loaders::vcf::{for_each_row, open_reader, VcfRow};
use genomicsqlite::refseq::reference_sequence_by_name;

#[derive(Parser)]
#[command(name = "vcf_into_sqlite", version, about = "Load a VCF file into a GenomicSQLite table", long_about = None)]
struct Cli {
    #[command(flatten)]
    loader: LoaderArgs,

    /// Table name to create (default: "variants").
    #[arg(long, default_value = "variants")]
    table: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let table = format!("{}{}", cli.loader.table_prefix, cli.table);
    let start = Instant::now();

    if !cli.loader.quiet {
        println!("🧬 Reading VCF from {:?}", cli.loader.input);
    }

    let input = cli.loader.input.clone();

    // Parse on a background thread while the foreground thread opens the
    // database and inserts, matching `Ring`'s overlap contract (spec §4.6).
    // `noodles_vcf`'s record iterator borrows the reader it's built from,
    // which doesn't fit `Ring::spawn`'s owned `FnMut` producer, so a bounded
    // `mpsc::sync_channel` stands in here; `vcf_lines_into_sqlite` and
    // `sam_into_sqlite` use `Ring` directly since their line-oriented
    // parsers own their input outright.
    let (tx, rx) = mpsc::sync_channel::<std::result::Result<VcfRow, String>>(64);
    let parser = thread::spawn(move || {
        let outcome = (|| -> Result<()> {
            let (mut reader, header) = open_reader(input.as_deref())?;
            for_each_row(&mut reader, &header, |row| {
                tx.send(Ok(row))
                    .map_err(|_| genomicsqlite::GenomicSqliteError::Internal("consumer gone".into()))
            })?;
            Ok(())
        })();
        if let Err(err) = outcome {
            let _ = tx.send(Err(err.to_string()));
        }
    });

    let mut conn = conn::open(&cli.loader.sqlite, &cli.loader.genomicsqlite_config())
        .context("open output database")?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY,
            rid INTEGER NOT NULL,
            beg INTEGER NOT NULL,
            end INTEGER NOT NULL,
            vid TEXT,
            ref TEXT NOT NULL,
            alt TEXT NOT NULL,
            qual REAL,
            filter TEXT
        );"
    ))
    .context("create table")?;

    let pb = if cli.loader.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {pos} records loaded")
                .expect("valid progress template"),
        );
        pb
    };

    // Spec §4.6/§5: the foreground consumer drains the ring inside a single
    // write transaction, so a failed/cancelled load rolls back to the
    // pre-load state instead of leaving partial rows committed.
    let tx = conn.transaction().context("begin insert transaction")?;
    let mut inserted = 0u64;
    for message in rx {
        let row = message.map_err(|e| anyhow::anyhow!("VCF parse error: {e}"))?;
        let rid = reference_sequence_by_name(&tx, &row.chrom)
            .context("look up reference sequence")?
            .map(|r| r.rid)
            .unwrap_or(0);
        tx.execute(
            &format!(
                "INSERT INTO {table} (rid, beg, end, vid, ref, alt, qual, filter)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            rusqlite::params![
                rid, row.beg, row.end, row.id, row.reference, row.alt, row.qual, row.filter
            ],
        )?;
        inserted += 1;
        pb.inc(1);
    }
    parser.join().expect("parser thread panicked");
    tx.commit().context("commit insert transaction")?;

    if !cli.loader.no_gri {
        let sql = create_genomic_range_index_sql(&conn, &table, "rid", "beg", "end", cli.loader.level)
            .context("build GRI install script")?;
        conn.execute_batch(&sql).context("install GRI")?;
    }

    pb.finish_and_clear();
    println!(
        "✅ Loaded {} records into {} ({} in {:.1?})",
        inserted,
        table,
        cli.loader.sqlite.display(),
        start.elapsed()
    );
    Ok(())
}
