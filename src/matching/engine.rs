use serde::Serialize;
use thiserror::Error;

use crate::core::barcode::BarcodeTable;
use crate::core::types::{MatchThresholds, UNDETERMINED};
use crate::utils::validation::{count_no_calls, NO_CALL};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatchError {
    #[error("Observed barcode '{observed}' has length {found}, expected {expected}")]
    WrongLength {
        observed: String,
        expected: usize,
        found: usize,
    },
}

/// Result of classifying one observed barcode against the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarcodeMatch {
    /// The matched (uppercase) sequence, or empty when unmatched
    pub barcode: String,

    pub matched: bool,

    /// Mismatches against the best candidate
    pub mismatches: usize,

    /// Mismatches against the second best candidate, when one was scored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatches_to_second_best: Option<usize>,

    /// No-calls in the observed barcode
    pub no_calls: usize,

    /// True when the read was rejected before matching: it failed the vendor
    /// quality check or carried more no-calls than allowed
    pub quality_filtered: bool,
}

impl BarcodeMatch {
    /// Result for a read without any barcode: undetermined, never scored
    #[must_use]
    pub fn unscored() -> Self {
        Self {
            barcode: String::new(),
            matched: false,
            mismatches: 0,
            mismatches_to_second_best: None,
            no_calls: 0,
            quality_filtered: false,
        }
    }

    /// The routing key: the matched sequence, or `undetermined`
    #[must_use]
    pub fn key(&self) -> &str {
        if self.matched {
            &self.barcode
        } else {
            UNDETERMINED
        }
    }

    /// Difference between the second best and best mismatch counts
    #[must_use]
    pub fn delta(&self) -> Option<usize> {
        self.mismatches_to_second_best
            .map(|second| second.saturating_sub(self.mismatches))
    }
}

/// Count positions where `observed` and `expected` differ.
///
/// `observed` is compared case-insensitively. A no-call on either side is
/// always a mismatch, even against another no-call.
#[must_use]
pub fn count_mismatches(observed: &[u8], expected: &[u8]) -> usize {
    observed
        .iter()
        .zip(expected)
        .filter(|(&o, &e)| {
            let o = o.to_ascii_uppercase();
            o == NO_CALL || e == NO_CALL || o != e
        })
        .count()
}

/// Classifies observed barcodes against a [`BarcodeTable`]
#[derive(Debug, Clone, Copy)]
pub struct MatchingEngine<'a> {
    table: &'a BarcodeTable,
    thresholds: MatchThresholds,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(table: &'a BarcodeTable, thresholds: MatchThresholds) -> Self {
        Self { table, thresholds }
    }

    #[must_use]
    pub fn table(&self) -> &'a BarcodeTable {
        self.table
    }

    /// Classify an observed barcode of exactly the table's barcode length.
    ///
    /// A read failing the quality check, or with more no-calls than allowed, is
    /// still scored but never matched.
    ///
    /// # Errors
    ///
    /// Returns `MatchError::WrongLength` if `observed` is not exactly the
    /// table's barcode length.
    pub fn classify(
        &self,
        observed: &str,
        is_quality_pass: bool,
    ) -> Result<BarcodeMatch, MatchError> {
        let bases = observed.as_bytes();
        if bases.len() != self.table.barcode_length() {
            return Err(MatchError::WrongLength {
                observed: observed.to_string(),
                expected: self.table.barcode_length(),
                found: bases.len(),
            });
        }

        let no_calls = count_no_calls(bases);
        let quality_filtered = !is_quality_pass || no_calls > self.thresholds.max_no_calls;

        // Exact hit: every other entry is at least one mismatch away
        if !quality_filtered && no_calls == 0 && self.thresholds.min_mismatch_delta <= 1 {
            let upper = observed.to_ascii_uppercase();
            if self.table.index_of(&upper).is_some() {
                return Ok(BarcodeMatch {
                    barcode: upper,
                    matched: true,
                    mismatches: 0,
                    mismatches_to_second_best: None,
                    no_calls,
                    quality_filtered,
                });
            }
        }

        // (index, mismatches) of the best entry; ties keep the first seen
        let mut best: Option<(usize, usize)> = None;
        let mut second_best: Option<usize> = None;

        for (i, candidate) in self.table.barcodes().iter().enumerate() {
            let mismatches = count_mismatches(bases, candidate.sequence.as_bytes());
            match best {
                Some((_, best_mismatches)) if mismatches < best_mismatches => {
                    second_best = Some(best_mismatches);
                    best = Some((i, mismatches));
                }
                Some(_) => {
                    if second_best.map_or(true, |s| mismatches < s) {
                        second_best = Some(mismatches);
                    }
                }
                None => best = Some((i, mismatches)),
            }
        }

        let Some((best_index, mismatches)) = best else {
            return Ok(BarcodeMatch {
                no_calls,
                quality_filtered,
                ..BarcodeMatch::unscored()
            });
        };

        let mut result = BarcodeMatch {
            barcode: String::new(),
            matched: false,
            mismatches,
            mismatches_to_second_best: second_best,
            no_calls,
            quality_filtered,
        };
        let delta_ok = result
            .delta()
            .map_or(true, |delta| delta >= self.thresholds.min_mismatch_delta);
        if !quality_filtered && mismatches <= self.thresholds.max_mismatches && delta_ok {
            result.matched = true;
            result.barcode = self.table.barcodes()[best_index].sequence.clone();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(max_mismatches: usize, min_mismatch_delta: usize, max_no_calls: usize) -> MatchThresholds {
        MatchThresholds {
            max_mismatches,
            min_mismatch_delta,
            max_no_calls,
        }
    }

    #[test]
    fn test_count_mismatches() {
        assert_eq!(count_mismatches(b"ACGT", b"ACGT"), 0);
        assert_eq!(count_mismatches(b"acgt", b"ACGT"), 0);
        assert_eq!(count_mismatches(b"ACGA", b"ACGT"), 1);
        assert_eq!(count_mismatches(b"TGCA", b"ACGT"), 4);
        // no-calls never match, not even another no-call
        assert_eq!(count_mismatches(b"ACGN", b"ACGT"), 1);
        assert_eq!(count_mismatches(b"ACGN", b"ACGN"), 1);
    }

    #[test]
    fn test_exact_match() {
        let table = BarcodeTable::from_sequences(["AAAA", "AAAT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 1, 2));

        let m = engine.classify("AAAA", true).unwrap();
        assert!(m.matched);
        assert_eq!(m.barcode, "AAAA");
        assert_eq!(m.mismatches, 0);
        assert_eq!(m.key(), "AAAA");

        // lowercase observations are uppercased
        let m = engine.classify("aaat", true).unwrap();
        assert!(m.matched);
        assert_eq!(m.barcode, "AAAT");
    }

    #[test]
    fn test_exact_match_needs_delta_when_delta_above_one() {
        // AAAA and AAAT are one apart, so a delta of 2 can never be met
        let table = BarcodeTable::from_sequences(["AAAA", "AAAT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 2, 2));

        let m = engine.classify("AAAA", true).unwrap();
        assert!(!m.matched);
        assert_eq!(m.mismatches, 0);
        assert_eq!(m.mismatches_to_second_best, Some(1));
        assert_eq!(m.key(), UNDETERMINED);
    }

    #[test]
    fn test_one_mismatch_with_clear_winner() {
        let table = BarcodeTable::from_sequences(["AAAA", "AAAT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 1, 2));

        // AACA: 1 mismatch to AAAA, 2 to AAAT
        let m = engine.classify("AACA", true).unwrap();
        assert!(m.matched);
        assert_eq!(m.barcode, "AAAA");
        assert_eq!(m.mismatches, 1);
        assert_eq!(m.mismatches_to_second_best, Some(2));
        assert_eq!(m.delta(), Some(1));
    }

    #[test]
    fn test_last_base_mismatch_is_ambiguous() {
        let table = BarcodeTable::from_sequences(["AAAA", "AAAT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 1, 2));

        // AAAC differs from both entries only at the last base
        let m = engine.classify("AAAC", true).unwrap();
        assert!(!m.matched);
        assert_eq!(m.barcode, "");
        assert_eq!(m.mismatches, 1);
        assert_eq!(m.mismatches_to_second_best, Some(1));
        assert_eq!(m.key(), UNDETERMINED);
    }

    #[test]
    fn test_too_many_mismatches() {
        let table = BarcodeTable::from_sequences(["AAAA", "AAAT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 1, 2));

        let m = engine.classify("CCCC", true).unwrap();
        assert!(!m.matched);
        assert_eq!(m.barcode, "");
        assert_eq!(m.mismatches, 4);
        assert_eq!(m.mismatches_to_second_best, Some(4));
        assert!(!m.quality_filtered);
    }

    #[test]
    fn test_ambiguous_match() {
        let table = BarcodeTable::from_sequences(["AAAA", "TAAA"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 1, 2));

        // GAAA is one mismatch from both
        let m = engine.classify("GAAA", true).unwrap();
        assert!(!m.matched);
        assert_eq!(m.mismatches, 1);
        assert_eq!(m.delta(), Some(0));
    }

    #[test]
    fn test_too_many_no_calls() {
        let table = BarcodeTable::from_sequences(["AAAA", "AAAT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(4, 0, 2));

        let m = engine.classify("NNNA", true).unwrap();
        assert!(!m.matched);
        assert!(m.quality_filtered);
        assert_eq!(m.no_calls, 3);
        // still scored for diagnostics
        assert_eq!(m.mismatches, 3);

        let m = engine.classify("NNAA", true).unwrap();
        assert!(!m.quality_filtered);
        assert_eq!(m.no_calls, 2);
    }

    #[test]
    fn test_quality_fail_is_never_matched() {
        let table = BarcodeTable::from_sequences(["AAAA", "AAAT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 1, 2));

        let m = engine.classify("AAAA", false).unwrap();
        assert!(!m.matched);
        assert!(m.quality_filtered);
        assert_eq!(m.mismatches, 0);
    }

    #[test]
    fn test_single_entry_table_has_no_second_best() {
        let table = BarcodeTable::from_sequences(["ACGT"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(1, 3, 2));

        let m = engine.classify("ACGA", true).unwrap();
        assert!(m.matched);
        assert_eq!(m.mismatches_to_second_best, None);
    }

    #[test]
    fn test_tie_prefers_first_entry_for_diagnostics() {
        let table = BarcodeTable::from_sequences(["AAAA", "TAAA", "CCCC"]).unwrap();
        let engine = MatchingEngine::new(&table, thresholds(2, 0, 2));

        // With a delta of zero a tie still matches, and the first entry wins
        let m = engine.classify("GAAA", true).unwrap();
        assert!(m.matched);
        assert_eq!(m.barcode, "AAAA");
    }

    #[test]
    fn test_wrong_length() {
        let table = BarcodeTable::from_sequences(["AAAA"]).unwrap();
        let engine = MatchingEngine::new(&table, MatchThresholds::default());

        assert!(matches!(
            engine.classify("AAA", true),
            Err(MatchError::WrongLength {
                expected: 4,
                found: 3,
                ..
            })
        ));
        assert!(engine.classify("AAAAA", true).is_err());
    }

    #[test]
    fn test_classify_is_deterministic() {
        let table = BarcodeTable::from_sequences(["ACGTAC", "TGCATG", "GGGCCC"]).unwrap();
        let engine = MatchingEngine::new(&table, MatchThresholds::default());
        for observed in ["ACGTAA", "NNNNNN", "TGCATG", "GGGCCA", "AAAAAA"] {
            let first = engine.classify(observed, true).unwrap();
            for _ in 0..5 {
                assert_eq!(engine.classify(observed, true).unwrap(), first);
            }
        }
    }

    #[test]
    fn test_unscored() {
        let m = BarcodeMatch::unscored();
        assert!(!m.matched);
        assert_eq!(m.key(), UNDETERMINED);
        assert!(!m.quality_filtered);
    }
}
