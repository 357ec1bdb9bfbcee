//! Per-barcode match metrics.
//!
//! [`MetricsAggregator`] keeps one [`BarcodeMetric`] row per table entry plus
//! the undetermined bucket. [`write_metrics`] writes the final rows as TSV.

pub mod barcode;
pub mod writer;

pub use barcode::{BarcodeMetric, MetricsAggregator, LANE_SUMMARY};
pub use writer::write_metrics;
