//! Load aligned reads from a SAM text file into a GenomicSQLite table.
//!
//! Parses the 11 mandatory SAM columns directly (no external SAM/BAM/CRAM
//! decoding crate — spec §1 scopes full alignment-format support out);
//! reference length is the sum of the CIGAR's reference-consuming
//! operations (`M`, `D`, `N`, `=`, `X`), matching the SAM spec's definition
//! of a read's aligned span. Unmapped reads (`RNAME == "*"`) are skipped.

use std::io::BufRead;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use genomicsqlite::conn;
use genomicsqlite::gri::schema::create_genomic_range_index_sql;
use genomicsqlite::ingest::ring::Drained;
use genomicsqlite::ingest::Ring;
use genomicsqlite::loaders::common::LoaderArgs;
use genomicsqlite::refseq::reference_sequence_by_name;

#[derive(Parser)]
#[command(name = "sam_into_sqlite", version, about = "Load aligned SAM reads into a GenomicSQLite table", long_about = None)]
struct Cli {
    #[command(flatten)]
    loader: LoaderArgs,

    /// Table name to create (default: "reads").
    #[arg(long, default_value = "reads")]
    table: String,
}

struct SamRow {
    qname: String,
    rname: String,
    beg: i64,
    end: i64,
    mapq: i64,
}

fn reference_span(cigar: &str) -> i64 {
    if cigar == "*" {
        return 1;
    }
    let mut span = 0i64;
    let mut length = 0i64;
    for c in cigar.chars() {
        if c.is_ascii_digit() {
            length = length * 10 + (c as i64 - '0' as i64);
            continue;
        }
        if matches!(c, 'M' | 'D' | 'N' | '=' | 'X') {
            span += length;
        }
        length = 0;
    }
    span.max(1)
}

fn parse_line(line: &str) -> Option<SamRow> {
    if line.is_empty() || line.starts_with('@') {
        return None;
    }
    let mut fields = line.split('\t');
    let qname = fields.next()?.to_string();
    let _flag: i64 = fields.next()?.parse().ok()?;
    let rname = fields.next()?.to_string();
    if rname == "*" {
        return None;
    }
    let pos: i64 = fields.next()?.parse().ok()?;
    let mapq: i64 = fields.next()?.parse().ok()?;
    let cigar = fields.next()?;

    let beg = pos - 1;
    let end = beg + reference_span(cigar);

    Some(SamRow {
        qname,
        rname,
        beg,
        end,
        mapq,
    })
}

fn open_lines(
    path: Option<&std::path::Path>,
) -> Result<Box<dyn Iterator<Item = std::io::Result<String>> + Send>> {
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
        println!("🧬 Reading SAM from {:?}", cli.loader.input);
    }

    let mut lines = open_lines(cli.loader.input.as_deref())?;

    let mut ring: Ring<SamRow> = Ring::spawn(64, move || loop {
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
            qname TEXT NOT NULL,
            mapq INTEGER NOT NULL
        );"
    ))
    .context("create table")?;

    let pb = if cli.loader.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {pos} reads loaded")
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
                let rid = reference_sequence_by_name(&tx, &row.rname)
                    .context("look up reference sequence")?
                    .map(|r| r.rid)
                    .unwrap_or(0);
                tx.execute(
                    &format!(
                        "INSERT INTO {table} (rid, beg, end, qname, mapq) VALUES (?1, ?2, ?3, ?4, ?5)"
                    ),
                    rusqlite::params![rid, row.beg, row.end, row.qname, row.mapq],
                )?;
                inserted += 1;
                pb.inc(1);
            }
            Ok(Drained::Finished) => break,
            Err(message) => anyhow::bail!("SAM parse error: {message}"),
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
        "✅ Loaded {} reads into {} ({} in {:.1?})",
        inserted,
        table,
        cli.loader.sqlite.display(),
        start.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mapped_read() {
        let line = "read1\t0\tchr1\t1001\t60\t50M\t*\t0\t0\tACGT\tIIII";
        let row = parse_line(line).unwrap();
        assert_eq!(row.qname, "read1");
        assert_eq!(row.rname, "chr1");
        assert_eq!(row.beg, 1000);
        assert_eq!(row.end, 1050);
        assert_eq!(row.mapq, 60);
    }

    #[test]
    fn skips_unmapped_and_header_lines() {
        assert!(parse_line("@HD\tVN:1.6").is_none());
        assert!(parse_line("read2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII").is_none());
    }

    #[test]
    fn cigar_with_insertions_and_deletions_sums_only_reference_consuming_ops() {
        assert_eq!(reference_span("10M2I5M3D5M"), 10 + 5 + 3 + 5);
        assert_eq!(reference_span("5S10M5S"), 10);
    }
}
