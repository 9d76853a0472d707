//! Load a VCF file into SQLite using the minimal line-oriented parser
//! (`src/loaders/vcf.rs::parse_line`) instead of `noodles_vcf`'s structured
//! model — for already-normalized, single-sample VCF text where the full
//! header/INFO/FORMAT machinery isn't needed. Uses `Ring` directly since
//! the line parser owns its input outright.

use std::io::BufRead;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use clap::Parser;

use genomicsqlite::conn;
use genomicsqlite::gri::schema::create_genomic_range_index_sql;
use genomicsqlite::ingest::ring::Drained;
use genomicsqlite::ingest::Ring;
use genomicsqlite::loaders::common::LoaderArgs;
use genomicsqlite::loaders::vcf::{parse_line, VcfRow};
use genomicsqlite::refseq::reference_sequence_by_name;

#[derive(Parser)]
#[command(name = "vcf_lines_into_sqlite", version, about = "Load line-oriented VCF text into a GenomicSQLite table", long_about = None)]
struct Cli {
    #[command(flatten)]
    loader: LoaderArgs,

    /// Table name to create (default: "variants").
    #[arg(long, default_value = "variants")]
    table: String,
}

fn open_lines(path: Option<&std::path::Path>) -> Result<Box<dyn Iterator<Item = std::io::Result<String>> + Send>> {
    match path {
        Some(p) => {
            let file = std::fs::File::open(p).with_context(|| format!("open {p:?}"))?;
            Ok(Box::new(std::io::BufReader::new(file).lines()))
        }
        None => Ok(Box::new(std::io::BufReader::new(std::io::stdin()).lines())),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let table = format!("{}{}", cli.loader.table_prefix, cli.table);
    let start = Instant::now();

    if !cli.loader.quiet {
        println!("🧬 Reading VCF lines from {:?}", cli.loader.input);
    }

    let mut lines = open_lines(cli.loader.input.as_deref())?;

    let mut ring: Ring<VcfRow> = Ring::spawn(64, move || loop {
        match lines.next() {
            None => return None,
            Some(Err(e)) => return Some(Err(e.to_string())),
            Some(Ok(line)) => {
                if let Some(row) = parse_line(&line) {
                    return Some(Ok(row));
                }
            }
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

    // Spec §4.6/§5: drain the ring inside a single write transaction so a
    // failed/cancelled load rolls back instead of leaving partial rows.
    let tx = conn.transaction().context("begin insert transaction")?;
    let mut inserted = 0u64;
    loop {
        match ring.next_item() {
            Ok(Drained::Item(row)) => {
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
            Ok(Drained::Finished) => break,
            Err(message) => anyhow::bail!("VCF line parse error: {message}"),
        }
    }
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
