//! VCF record → row mapping for `vcf_into_sqlite`/`vcf_lines_into_sqlite`.
//!
//! Reader construction and header handling follow
//! `varfish-server-worker`'s `seqvars::ingest` conventions
//! (`noodles_vcf as vcf`, `vcf::io::reader::Builder::build_from_path`).

use std::io::BufRead;
use std::path::Path;

use noodles_vcf as vcf;
use vcf::variant::record::AlternateBases as _;
use vcf::variant::record::Record as _;

use crate::error::{GenomicSqliteError, Result};

/// One row staged for insertion into a loaded VCF table.
#[derive(Debug, Clone, PartialEq)]
pub struct VcfRow {
    pub chrom: String,
    pub beg: i64,
    pub end: i64,
    pub id: Option<String>,
    pub reference: String,
    pub alt: String,
    pub qual: Option<f64>,
    pub filter: Option<String>,
}

fn is_bgzipped(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("gz") | Some("bgz")
    )
}

/// Open `path` (or stdin when `None`) as a VCF reader and return it
/// alongside the parsed header. `.vcf.gz`/`.vcf.bgz` inputs are decoded
/// through `noodles_bgzf` (the block-gzip framing most VCF distributions
/// use); plain `.vcf` and stdin are read uncompressed.
pub fn open_reader(
    path: Option<&Path>,
) -> Result<(vcf::io::Reader<Box<dyn std::io::BufRead>>, vcf::Header)> {
    let inner: Box<dyn std::io::BufRead> = match path {
        Some(p) if is_bgzipped(p) => {
            let file = std::fs::File::open(p).map_err(GenomicSqliteError::IoError)?;
            Box::new(std::io::BufReader::new(noodles_bgzf::Reader::new(file)))
        }
        Some(p) => Box::new(std::io::BufReader::new(
            std::fs::File::open(p).map_err(GenomicSqliteError::IoError)?,
        )),
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };
    let mut reader = vcf::io::reader::Builder::default().build_from_reader(inner)?;
    let header = reader
        .read_header()
        .map_err(|e| GenomicSqliteError::Internal(format!("reading VCF header: {e}")))?;
    Ok((reader, header))
}

fn record_to_row(record: &vcf::Record, header: &vcf::Header) -> Result<VcfRow> {
    let chrom = record.reference_sequence_name().to_string();
    let start: usize = record
        .variant_start()
        .ok_or_else(|| GenomicSqliteError::Internal(format!("record on {chrom} has no POS")))?
        .get();
    let beg = (start - 1) as i64;
    let end = beg
        + record
            .reference_bases()
            .len()
            .max(1) as i64;

    let id = {
        let ids = record.ids();
        if ids.is_empty() {
            None
        } else {
            Some(ids.iter().collect::<Vec<_>>().join(";"))
        }
    };
    let reference = record.reference_bases().to_string();
    let alt = record
        .alternate_bases()
        .iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| GenomicSqliteError::Internal(format!("invalid ALT: {e}")))?
        .join(",");
    let qual = record
        .quality_score()
        .transpose()
        .map_err(|e| GenomicSqliteError::Internal(format!("invalid QUAL: {e}")))?;
    let filter = record
        .filters()
        .map(|f| f.to_string())
        .or(None);
    let _ = header;

    Ok(VcfRow {
        chrom,
        beg,
        end,
        id,
        reference,
        alt,
        qual: qual.map(|q| q as f64),
        filter,
    })
}

/// Parse every record from `reader`, feeding `sink` one [`VcfRow`] at a
/// time. Separated from [`open_reader`] so it can be driven from inside
/// [`crate::ingest::Ring`]'s producer closure.
pub fn for_each_row(
    reader: &mut vcf::io::Reader<Box<dyn std::io::BufRead>>,
    header: &vcf::Header,
    mut sink: impl FnMut(VcfRow) -> Result<()>,
) -> Result<u64> {
    let mut count = 0u64;
    for result in reader.record_bufs(header) {
        let record = result.map_err(|e| GenomicSqliteError::Internal(format!("reading VCF record: {e}")))?;
        let row = record_to_row(&record, header)?;
        sink(row)?;
        count += 1;
    }
    Ok(count)
}

/// Minimal line-oriented VCF parser for `vcf_lines_into_sqlite`: tab-split
/// the 8 mandatory columns, skipping header/comment lines. Used when the
/// caller wants raw VCF text rows without `noodles`'s structured model
/// (e.g. piping through already-normalized text).
pub fn parse_line(line: &str) -> Option<VcfRow> {
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split('\t');
    let chrom = fields.next()?.to_string();
    let pos: i64 = fields.next()?.parse().ok()?;
    let id = fields.next().map(str::to_string).filter(|s| s != ".");
    let reference = fields.next()?.to_string();
    let alt = fields.next()?.to_string();
    let qual = fields.next().and_then(|s| s.parse::<f64>().ok());
    let filter = fields.next().map(str::to_string).filter(|s| s != ".");

    let beg = pos - 1;
    let end = beg + reference.len().max(1) as i64;

    Some(VcfRow {
        chrom,
        beg,
        end,
        id,
        reference,
        alt,
        qual,
        filter,
    })
}

/// Read every non-header line of `reader` through [`parse_line`].
pub fn for_each_line_row(
    reader: impl BufRead,
    mut sink: impl FnMut(VcfRow) -> Result<()>,
) -> Result<u64> {
    let mut count = 0u64;
    for line in reader.lines() {
        let line = line.map_err(GenomicSqliteError::IoError)?;
        if let Some(row) = parse_line(&line) {
            sink(row)?;
            count += 1;
        }
    }
    Ok(count)
}
