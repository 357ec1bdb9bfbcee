//! Barcode matching.
//!
//! [`MatchingEngine`] classifies an observed barcode read against a
//! [`BarcodeTable`](crate::core::BarcodeTable):
//!
//! 1. Reads failing the vendor quality check, or with more no-calls than
//!    allowed, are scored but never matched.
//! 2. The observed barcode is compared with every expected barcode by Hamming
//!    distance. A no-call (`N`) never equals any base, including another `N`.
//! 3. The best entry matches if it has at most `max_mismatches` mismatches and
//!    beats the runner-up by at least `min_mismatch_delta`.
//!
//! ## Example
//!
//! ```rust
//! use bam_index_decoder::{BarcodeTable, MatchThresholds, MatchingEngine};
//!
//! let table = BarcodeTable::from_sequences(["AAAA", "TTTT"]).unwrap();
//! let engine = MatchingEngine::new(&table, MatchThresholds::default());
//!
//! let m = engine.classify("AAAC", true).unwrap();
//! assert!(m.matched);
//! assert_eq!(m.barcode, "AAAA");
//! assert_eq!(m.mismatches, 1);
//! ```

pub mod engine;

pub use engine::{count_mismatches, BarcodeMatch, MatchError, MatchingEngine};
