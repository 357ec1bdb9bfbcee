//! # bam-index-decoder
//!
//! A library for demultiplexing SAM/BAM records by their sample barcode.
//!
//! Multiplexed sequencing runs put many samples on one lane; each read carries
//! a short barcode read identifying its sample. Sequencing errors mean the
//! observed barcode rarely matches exactly, so assignment must tolerate a few
//! mismatches without letting a read fall between two similar barcodes.
//!
//! `bam-index-decoder` reads the barcode attribute of every record (or record
//! pair), finds the closest expected barcode, and writes the record to that
//! barcode's output with its read name and read group tagged.
//!
//! ## Features
//!
//! - **Mismatch-tolerant matching**: Hamming distance with a maximum mismatch count
//! - **Ambiguity control**: the best barcode must beat the runner-up by a minimum delta
//! - **No-call handling**: `N` never matches; too many no-calls leave a read undetermined
//! - **Paired reads**: mates are decoded together and always land in the same output
//! - **Per-barcode outputs**: one file, or one file per barcode with rewritten read groups
//! - **Metrics**: Picard-style per-barcode match counts
//!
//! ## Example
//!
//! ```rust
//! use bam_index_decoder::{BarcodeTable, MatchThresholds, MatchingEngine};
//!
//! let table = BarcodeTable::from_sequences(["ACGTACGT", "TTGGCCAA"]).unwrap();
//! let engine = MatchingEngine::new(&table, MatchThresholds::default());
//!
//! let result = engine.classify("ACGTACGA", true).unwrap();
//! assert!(result.matched);
//! assert_eq!(result.key(), "ACGTACGT");
//! assert_eq!(result.mismatches, 1);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Barcode table and decoding configuration
//! - [`matching`]: Barcode match engine
//! - [`metrics`]: Per-barcode metrics and the TSV writer
//! - [`routing`]: Record router, read units and output sinks
//! - [`parsing`]: Parsers for barcode files and SAM/BAM inputs
//! - [`output`]: SAM/BAM writers, output headers and file layout
//! - [`cli`]: Command-line interface implementation

pub mod cli;
pub mod core;
pub mod matching;
pub mod metrics;
pub mod output;
pub mod parsing;
pub mod routing;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::barcode::{BarcodeTable, BarcodeTableError, NamedBarcode};
pub use core::types::*;
pub use matching::engine::{BarcodeMatch, MatchError, MatchingEngine};
pub use metrics::barcode::{BarcodeMetric, MetricsAggregator};
pub use routing::router::{RecordRouter, RoutingError, RoutingSummary};
