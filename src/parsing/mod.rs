//! Input parsers.
//!
//! - **Barcode files** ([`barcodes`]): tab-delimited, optionally gzip compressed
//! - **SAM/BAM files** ([`sam`]): the record stream and the run information in
//!   the header
//!
//! ## Barcode file columns
//!
//! | Column | Description | Required |
//! |--------|-------------|----------|
//! | `barcode_sequence` | Expected barcode | Yes |
//! | `barcode_name` | Name; defaults to the 1-based row number | No |
//! | `library_name`, `sample_name`, `description` | Read-group `LB`, `SM`, `DS` | No |
//! | `fcid`, `lane` | Flow cell and lane; `fcid` must agree with the input | No |
//! | `insert_size` | Read-group `PI` | No |
//! | `sequencing_center` | Read-group `CN` | No |
//! | `project` or `xx:project` | Output sub-directory | No |
//! | `tt:longname` | Extra read-group tag `tt` | No |
//!
//! ## Example
//!
//! ```rust
//! use bam_index_decoder::parsing::barcodes::parse_barcode_text;
//!
//! let table = parse_barcode_text("barcode_sequence\tlibrary_name\nACGT\tlib1\n").unwrap();
//! assert_eq!(table.barcodes()[0].library_name.as_deref(), Some("lib1"));
//! ```

pub mod barcodes;
pub mod sam;
