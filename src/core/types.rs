use noodles::sam::alignment::record::data::field::Tag;
use serde::{Deserialize, Serialize};

/// The resolved barcode token written for reads that match no expected barcode
pub const UNDETERMINED: &str = "undetermined";

/// Default maximum mismatches for a barcode to be considered a match
pub const DEFAULT_MAX_MISMATCHES: usize = 1;

/// Default minimum difference between the best and second best mismatch counts
pub const DEFAULT_MIN_MISMATCH_DELTA: usize = 1;

/// Default maximum number of no-calls before a barcode read is unmatchable
pub const DEFAULT_MAX_NO_CALLS: usize = 2;

/// Default tag holding the observed barcode read
pub const DEFAULT_BARCODE_TAG: Tag = Tag::new(b'B', b'C');

/// Default tag whose presence marks a control read
pub const DEFAULT_CONTROL_TAG: Tag = Tag::new(b'X', b'C');

/// Classification thresholds, fixed before any record is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchThresholds {
    /// Maximum mismatches for a barcode to be considered a match
    pub max_mismatches: usize,
    /// Minimum difference between the best and second best mismatch counts
    pub min_mismatch_delta: usize,
    /// Maximum no-calls allowed in an observed barcode
    pub max_no_calls: usize,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            max_mismatches: DEFAULT_MAX_MISMATCHES,
            min_mismatch_delta: DEFAULT_MIN_MISMATCH_DELTA,
            max_no_calls: DEFAULT_MAX_NO_CALLS,
        }
    }
}

/// Immutable configuration shared by the match engine and the record router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodingConfig {
    pub thresholds: MatchThresholds,
    /// Tag holding the observed barcode read
    pub barcode_tag: Tag,
    /// Tag whose presence marks a control read
    pub control_tag: Tag,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            thresholds: MatchThresholds::default(),
            barcode_tag: DEFAULT_BARCODE_TAG,
            control_tag: DEFAULT_CONTROL_TAG,
        }
    }
}

impl DecodingConfig {
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Where a read unit goes once it has been classified
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The shared control stream
    Control,
    /// The stream for reads failing the vendor quality check, for the given barcode key
    Filtered(String),
    /// The stream for reads passing the vendor quality check, for the given barcode key
    Passed(String),
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Filtered(key) => write!(f, "{key} (non-pf)"),
            Self::Passed(key) => write!(f, "{key} (pf)"),
        }
    }
}

/// How the output streams are laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// One passed stream and one filtered stream shared by every barcode
    Single,
    /// One passed and one filtered stream per barcode (plus undetermined)
    PerBarcode,
}
