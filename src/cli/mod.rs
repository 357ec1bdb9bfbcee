//! Command-line interface for bam-index-decoder.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **decode**: Demultiplex a SAM/BAM file by barcode and write barcode metrics
//! - **barcodes**: Validate a barcode list or file and print the resulting table
//!
//! ## Usage
//!
//! ```text
//! # One output file shared by every barcode
//! bam-index-decoder decode -i lane3.bam -o decoded.bam -m metrics.tsv --barcode-file barcodes.tsv
//!
//! # One file per barcode under a directory
//! bam-index-decoder decode -i lane3.bam --output-dir out/ -m metrics.tsv --barcode ACGTACGT TTGGCCAA
//!
//! # JSON summary for scripting
//! bam-index-decoder -f json decode -i lane3.bam -o decoded.bam -m metrics.tsv --barcode-file barcodes.tsv
//!
//! # Check a barcode file
//! bam-index-decoder barcodes --barcode-file barcodes.tsv.gz
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::core::barcode::BarcodeTable;
use crate::parsing::barcodes::parse_barcode_file;

pub mod barcodes;
pub mod decode;

#[derive(Parser)]
#[command(name = "bam-index-decoder")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Demultiplex SAM/BAM records by their sample barcode")]
#[command(
    long_about = "bam-index-decoder assigns every read (or read pair) of a SAM/BAM file to the expected barcode it matches.\n\nMatching tolerates sequencing errors:\n- Up to --max-mismatches mismatching bases\n- The best barcode must beat the runner-up by --min-mismatch-delta\n- Reads with too many no-calls or failing the vendor quality check stay undetermined\n\nDecoded reads are written to one file or one file per barcode, with per-barcode metrics."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format of the summary printed to stdout
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assign reads to barcodes and write the decoded output
    Decode(decode::DecodeArgs),

    /// Validate expected barcodes and print the barcode table
    Barcodes(barcodes::BarcodesArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Expected barcodes, given inline or as a file
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct BarcodeSource {
    /// Expected barcode sequences
    #[arg(long = "barcode", num_args = 1..)]
    pub barcodes: Vec<String>,

    /// Tab-delimited barcode file with a `barcode_sequence` column (may be gzip compressed)
    #[arg(long)]
    pub barcode_file: Option<PathBuf>,
}

impl BarcodeSource {
    /// Load and validate the barcode table
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the barcodes are invalid.
    pub fn load(&self) -> anyhow::Result<BarcodeTable> {
        match &self.barcode_file {
            Some(path) => parse_barcode_file(path)
                .with_context(|| format!("Failed to load barcodes from {}", path.display())),
            None => BarcodeTable::from_sequences(&self.barcodes)
                .context("Invalid barcodes on the command line"),
        }
    }
}
