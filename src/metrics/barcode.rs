use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::barcode::{BarcodeTable, NamedBarcode};
use crate::matching::engine::BarcodeMatch;

/// Name of the row summing every expected barcode
pub const LANE_SUMMARY: &str = "lane_summary";

/// Match counts for one barcode (or the undetermined bucket)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BarcodeMetric {
    /// Barcode sequence; empty for the undetermined and lane summary rows
    pub barcode: String,
    pub barcode_name: String,
    pub library_name: String,
    pub sample_name: String,
    pub description: String,
    /// Read units attributed to this barcode
    pub reads: u64,
    /// Read units passing the vendor quality check
    pub pf_reads: u64,
    /// Read units failing the vendor quality check or carrying too many no-calls
    pub quality_failed_reads: u64,
    pub perfect_matches: u64,
    pub pf_perfect_matches: u64,
    pub one_mismatch_matches: u64,
    pub pf_one_mismatch_matches: u64,
    /// Fraction of all read units attributed to this barcode
    pub pct_matches: f64,
    /// `pct_matches` relative to the best expected barcode
    pub ratio_this_barcode_to_best_barcode_pct: f64,
    pub pf_pct_matches: f64,
    pub pf_ratio_this_barcode_to_best_barcode_pct: f64,
    /// `pf_reads` relative to the mean `pf_reads` of the expected barcodes
    pub pf_normalized_matches: f64,
}

impl BarcodeMetric {
    fn for_entry(entry: &NamedBarcode) -> Self {
        Self {
            barcode: entry.sequence.clone(),
            barcode_name: entry.name.clone(),
            library_name: entry.library_name.clone().unwrap_or_default(),
            sample_name: entry.sample_name.clone().unwrap_or_default(),
            description: entry.description.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    fn add_counts(&mut self, other: &Self) {
        self.reads += other.reads;
        self.pf_reads += other.pf_reads;
        self.quality_failed_reads += other.quality_failed_reads;
        self.perfect_matches += other.perfect_matches;
        self.pf_perfect_matches += other.pf_perfect_matches;
        self.one_mismatch_matches += other.one_mismatch_matches;
        self.pf_one_mismatch_matches += other.pf_one_mismatch_matches;
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Accumulates per-barcode match counts as read units are classified.
///
/// Rows are kept in table order with the undetermined row first. The router
/// records each read unit exactly once, so a read pair counts as one read.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    metrics: Vec<BarcodeMetric>,
    key_to_index: HashMap<String, usize>,
}

impl MetricsAggregator {
    /// Start with a zeroed row for every entry of `table`, undetermined first
    #[must_use]
    pub fn new(table: &BarcodeTable) -> Self {
        let mut metrics = Vec::with_capacity(table.len() + 1);
        let mut key_to_index = HashMap::with_capacity(table.len() + 1);
        for (i, entry) in table.entries_with_undetermined().enumerate() {
            metrics.push(BarcodeMetric::for_entry(entry));
            key_to_index.insert(entry.key().to_string(), i);
        }
        Self {
            metrics,
            key_to_index,
        }
    }

    /// Count one read unit.
    ///
    /// The unit is attributed to `result.key()`. Perfect and one-mismatch
    /// counts only move for matched units.
    pub fn record(&mut self, result: &BarcodeMatch, is_pf: bool) {
        // keys always come from the table; anything else lands in undetermined
        let index = self.key_to_index.get(result.key()).copied().unwrap_or(0);
        let metric = &mut self.metrics[index];

        metric.reads += 1;
        if is_pf {
            metric.pf_reads += 1;
        }
        if result.quality_filtered {
            metric.quality_failed_reads += 1;
        }
        if result.matched {
            match result.mismatches {
                0 => {
                    metric.perfect_matches += 1;
                    if is_pf {
                        metric.pf_perfect_matches += 1;
                    }
                }
                1 => {
                    metric.one_mismatch_matches += 1;
                    if is_pf {
                        metric.pf_one_mismatch_matches += 1;
                    }
                }
                _ => {}
            }
        }
    }

    /// Raw counts for a routing key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&BarcodeMetric> {
        self.key_to_index.get(key).map(|&i| &self.metrics[i])
    }

    /// Total read units counted so far
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.metrics.iter().map(|m| m.reads).sum()
    }

    /// Compute the derived fractions and append the lane summary row.
    ///
    /// Returns the undetermined row, one row per barcode in table order, then
    /// the lane summary.
    #[must_use]
    pub fn finish(self) -> Vec<BarcodeMetric> {
        let total_reads = self.total_reads();
        let mut metrics = self.metrics;

        let total_pf_reads: u64 = metrics.iter().map(|m| m.pf_reads).sum();

        for metric in &mut metrics {
            metric.pct_matches = fraction(metric.reads, total_reads);
            metric.pf_pct_matches = fraction(metric.pf_reads, total_pf_reads);
        }

        let expected = &metrics[1..];
        let best_pct = expected.iter().map(|m| m.pct_matches).fold(0.0, f64::max);
        let best_pf_pct = expected.iter().map(|m| m.pf_pct_matches).fold(0.0, f64::max);
        let assigned_pf_reads: u64 = expected.iter().map(|m| m.pf_reads).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean_pf_reads = assigned_pf_reads as f64 / expected.len().max(1) as f64;

        for (i, metric) in metrics.iter_mut().enumerate() {
            if best_pct > 0.0 {
                metric.ratio_this_barcode_to_best_barcode_pct = metric.pct_matches / best_pct;
            }
            if best_pf_pct > 0.0 {
                metric.pf_ratio_this_barcode_to_best_barcode_pct =
                    metric.pf_pct_matches / best_pf_pct;
            }
            if i > 0 && mean_pf_reads > 0.0 {
                #[allow(clippy::cast_precision_loss)]
                let pf_reads = metric.pf_reads as f64;
                metric.pf_normalized_matches = pf_reads / mean_pf_reads;
            }
        }

        let mut summary = BarcodeMetric {
            barcode_name: LANE_SUMMARY.to_string(),
            ..BarcodeMetric::default()
        };
        for metric in &metrics[1..] {
            summary.add_counts(metric);
        }
        summary.pct_matches = fraction(summary.reads, total_reads);
        summary.pf_pct_matches = fraction(summary.pf_reads, total_pf_reads);
        metrics.push(summary);

        metrics
    }
}
