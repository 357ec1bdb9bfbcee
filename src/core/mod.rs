//! Core data types for barcode decoding.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`NamedBarcode`]: An expected barcode with its library/sample metadata
//! - [`BarcodeTable`]: The validated, immutable set of expected barcodes
//! - [`DecodingConfig`], [`MatchThresholds`]: Configuration fixed before decoding
//! - [`Destination`], [`OutputMode`]: Routing types
//!
//! ## Barcode keys
//!
//! Reads are counted and routed by *key*: the uppercased barcode sequence of the
//! matched entry, or `undetermined` when no confident match exists.
//!
//! | Entry | Sequence | Key |
//! |-------|----------|-----|
//! | expected barcode | `ACGTACGT` | `ACGTACGT` |
//! | undetermined | (empty) | `undetermined` |

pub mod barcode;
pub mod types;

pub use barcode::{BarcodeTable, BarcodeTableError, NamedBarcode};
pub use types::{DecodingConfig, Destination, MatchThresholds, OutputMode, UNDETERMINED};
