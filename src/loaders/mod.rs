//! Shared pieces of the loader CLIs (`src/bin/*_into_sqlite.rs`): common
//! `clap` flags and the VCF record-to-row mapping.

pub mod common;
pub mod vcf;
