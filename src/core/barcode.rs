use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::UNDETERMINED;
use crate::utils::validation::{check_barcode_limit, is_valid_barcode, normalize_sequence};

/// Configuration errors raised while building a [`BarcodeTable`]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BarcodeTableError {
    #[error("No barcodes were provided")]
    Empty,

    #[error("Barcode '{sequence}' is not a valid sequence (allowed bases: A, C, G, T, N)")]
    InvalidSequence { sequence: String },

    #[error("Barcode '{sequence}' is listed more than once (entries {first} and {second})")]
    Duplicate {
        sequence: String,
        first: usize,
        second: usize,
    },

    #[error("Barcode '{sequence}' has length {found} but other barcodes have length {expected}")]
    LengthMismatch {
        sequence: String,
        expected: usize,
        found: usize,
    },

    #[error("Too many barcodes: {0} exceeds maximum allowed")]
    TooManyBarcodes(usize),

    #[error("Barcode file is missing the required column '{0}'")]
    MissingColumn(String),

    #[error("Line {line}: {message}")]
    MalformedRow { line: usize, message: String },

    #[error("Flow cell '{barcode_fcid}' from barcode '{sequence}' differs from flow cell '{header_fcid}' in the input")]
    FlowCellMismatch {
        sequence: String,
        barcode_fcid: String,
        header_fcid: String,
    },
}

/// A single expected barcode and the sample metadata attached to it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamedBarcode {
    /// Uppercased barcode sequence; empty only for the undetermined pseudo-entry
    pub sequence: String,

    /// Barcode name; defaults to the 1-based position in the table
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_cell_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<String>,

    /// Predicted median insert size (PI in the read group)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequencing_center: Option<String>,

    /// Extra read-group tags, in column order: (two character tag, value)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub end_user_tags: Vec<(String, String)>,
}

impl NamedBarcode {
    pub fn new(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            ..Self::default()
        }
    }

    /// The pseudo-entry that collects every read without a confident match
    #[must_use]
    pub fn undetermined() -> Self {
        Self {
            sequence: String::new(),
            name: UNDETERMINED.to_string(),
            project: Some("Undetermined".to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_library(mut self, library_name: impl Into<String>) -> Self {
        self.library_name = Some(library_name.into());
        self
    }

    #[must_use]
    pub fn with_sample(mut self, sample_name: impl Into<String>) -> Self {
        self.sample_name = Some(sample_name.into());
        self
    }

    /// Is this the undetermined pseudo-entry?
    #[must_use]
    pub fn is_undetermined(&self) -> bool {
        self.sequence.is_empty()
    }

    /// The key under which reads for this entry are routed and counted:
    /// the sequence, or `undetermined` for the pseudo-entry.
    #[must_use]
    pub fn key(&self) -> &str {
        if self.is_undetermined() {
            UNDETERMINED
        } else {
            &self.sequence
        }
    }
}

/// The validated, immutable set of expected barcodes
#[derive(Debug, Clone)]
pub struct BarcodeTable {
    /// Entries in input order
    barcodes: Vec<NamedBarcode>,

    /// Common length of every sequence
    barcode_length: usize,

    /// Index: sequence -> position in `barcodes`
    sequence_to_index: HashMap<String, usize>,

    undetermined: NamedBarcode,
}

impl BarcodeTable {
    /// Build a table from bare sequences, as given on the command line.
    ///
    /// # Errors
    ///
    /// See [`BarcodeTable::new`].
    pub fn from_sequences<I, S>(sequences: I) -> Result<Self, BarcodeTableError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            sequences
                .into_iter()
                .map(|s| NamedBarcode::new(s.as_ref()))
                .collect(),
        )
    }

    /// Validate the entries and build the lookup index.
    ///
    /// Sequences are uppercased. Entries without a name are named after their
    /// 1-based position.
    ///
    /// # Errors
    ///
    /// Returns `BarcodeTableError::Empty` if there are no entries,
    /// `InvalidSequence` for a sequence with bases outside `ACGTN`,
    /// `LengthMismatch` if the lengths differ, `Duplicate` if two sequences are
    /// equal after uppercasing, or `TooManyBarcodes` if the limit is exceeded.
    pub fn new(entries: Vec<NamedBarcode>) -> Result<Self, BarcodeTableError> {
        if entries.is_empty() {
            return Err(BarcodeTableError::Empty);
        }

        let mut barcodes = Vec::with_capacity(entries.len());
        let mut sequence_to_index = HashMap::with_capacity(entries.len());
        let mut barcode_length = None;

        for (i, mut entry) in entries.into_iter().enumerate() {
            if check_barcode_limit(barcodes.len()).is_some() {
                return Err(BarcodeTableError::TooManyBarcodes(barcodes.len() + 1));
            }

            entry.sequence = normalize_sequence(&entry.sequence);
            if !is_valid_barcode(&entry.sequence) {
                return Err(BarcodeTableError::InvalidSequence {
                    sequence: entry.sequence,
                });
            }

            let expected = *barcode_length.get_or_insert(entry.sequence.len());
            if entry.sequence.len() != expected {
                return Err(BarcodeTableError::LengthMismatch {
                    sequence: entry.sequence.clone(),
                    expected,
                    found: entry.sequence.len(),
                });
            }

            if let Some(&first) = sequence_to_index.get(&entry.sequence) {
                return Err(BarcodeTableError::Duplicate {
                    sequence: entry.sequence,
                    first: first + 1,
                    second: i + 1,
                });
            }

            if entry.name.trim().is_empty() {
                entry.name = (i + 1).to_string();
            }

            sequence_to_index.insert(entry.sequence.clone(), i);
            barcodes.push(entry);
        }

        Ok(Self {
            barcodes,
            barcode_length: barcode_length.unwrap_or_default(),
            sequence_to_index,
            undetermined: NamedBarcode::undetermined(),
        })
    }

    /// Entries in input order (the undetermined pseudo-entry is not included)
    #[must_use]
    pub fn barcodes(&self) -> &[NamedBarcode] {
        &self.barcodes
    }

    #[must_use]
    pub fn barcode_length(&self) -> usize {
        self.barcode_length
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    /// Exact lookup of an uppercased sequence
    #[must_use]
    pub fn get(&self, sequence: &str) -> Option<&NamedBarcode> {
        self.index_of(sequence).map(|i| &self.barcodes[i])
    }

    /// Position of an uppercased sequence in the table
    #[must_use]
    pub fn index_of(&self, sequence: &str) -> Option<usize> {
        self.sequence_to_index.get(sequence).copied()
    }

    #[must_use]
    pub fn undetermined(&self) -> &NamedBarcode {
        &self.undetermined
    }

    /// Every entry, undetermined first and then in table order
    pub fn entries_with_undetermined(&self) -> impl Iterator<Item = &NamedBarcode> {
        std::iter::once(&self.undetermined).chain(self.barcodes.iter())
    }

    /// Check the flow cell of every entry against the one found in the input.
    ///
    /// Entries without a flow cell, and an `unknown` header flow cell, are not checked.
    ///
    /// # Errors
    ///
    /// Returns `BarcodeTableError::FlowCellMismatch` for the first entry that differs.
    pub fn check_flow_cell(&self, header_fcid: &str) -> Result<(), BarcodeTableError> {
        if header_fcid == "unknown" {
            return Ok(());
        }
        for entry in &self.barcodes {
            if let Some(fcid) = entry.flow_cell_id.as_deref() {
                if fcid != header_fcid {
                    return Err(BarcodeTableError::FlowCellMismatch {
                        sequence: entry.sequence.clone(),
                        barcode_fcid: fcid.to_string(),
                        header_fcid: header_fcid.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
