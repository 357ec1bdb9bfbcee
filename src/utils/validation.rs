//! Centralized validation and helper functions.

use noodles::sam::alignment::record::data::field::Tag;

/// Bases allowed in an expected or observed barcode (after uppercasing).
pub const ALLOWED_BASES: &[u8] = b"ACGTN";

/// The no-call base.
pub const NO_CALL: u8 = b'N';

/// Maximum number of barcodes allowed in a single table (DOS protection)
pub const MAX_BARCODES: usize = 100_000;

/// Maximum length of a single path component built from barcode-table values
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Uppercase and trim a barcode sequence.
///
/// # Examples
///
/// ```
/// use bam_index_decoder::utils::validation::normalize_sequence;
///
/// assert_eq!(normalize_sequence(" acgtn "), "ACGTN");
/// ```
#[must_use]
pub fn normalize_sequence(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

/// Validate that a (normalized) sequence only contains `A`, `C`, `G`, `T` or `N`.
///
/// # Examples
///
/// ```
/// use bam_index_decoder::utils::validation::is_valid_barcode;
///
/// assert!(is_valid_barcode("ACGTN"));
/// assert!(!is_valid_barcode("ACGU"));
/// assert!(!is_valid_barcode(""));
/// ```
#[must_use]
pub fn is_valid_barcode(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| ALLOWED_BASES.contains(&b))
}

/// Count the no-call bases in an observed barcode. Lowercase `n` counts too.
#[must_use]
pub fn count_no_calls(bases: &[u8]) -> usize {
    bases
        .iter()
        .filter(|b| b.to_ascii_uppercase() == NO_CALL)
        .count()
}

/// Check if adding another barcode would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new barcode.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_barcode_limit(count: usize) -> Option<String> {
    if count >= MAX_BARCODES {
        Some(format!(
            "Too many barcodes: adding another would exceed maximum of {MAX_BARCODES}"
        ))
    } else {
        None
    }
}

/// Parse a two character SAM tag name such as `BC` or `XC`.
///
/// Used as a clap value parser.
///
/// # Errors
///
/// Returns a message if the tag is not exactly two ASCII alphanumeric characters
/// or does not start with a letter.
pub fn parse_tag(s: &str) -> Result<Tag, String> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return Err(format!("tag must be two characters, found '{s}'"));
    }
    if !bytes[0].is_ascii_alphabetic() || !bytes[1].is_ascii_alphanumeric() {
        return Err(format!("invalid tag '{s}'"));
    }
    Ok(Tag::new(bytes[0], bytes[1]))
}

/// Validation error types for values that end up in output paths
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Path component too long: exceeds {MAX_FILENAME_LENGTH} characters")]
    FilenameTooLong,
    #[error("Invalid path component '{0}': contains path traversal or invalid characters")]
    InvalidFilename(String),
    #[error("Empty path component provided")]
    EmptyFilename,
}

/// Validate a value from the barcode table that is used as a single output path
/// component (project, library name, flow-cell id, ...).
///
/// Rejects:
/// - empty values and values longer than [`MAX_FILENAME_LENGTH`]
/// - directory traversal (`..`, `/`, `\`)
/// - null bytes and control characters
///
/// # Errors
///
/// Returns `ValidationError::EmptyFilename` if the value is empty,
/// `ValidationError::FilenameTooLong` if it exceeds the limit, or
/// `ValidationError::InvalidFilename` if it contains invalid characters.
pub fn validate_path_component(value: &str) -> Result<&str, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyFilename);
    }

    if value.len() > MAX_FILENAME_LENGTH {
        return Err(ValidationError::FilenameTooLong);
    }

    if value.contains("..") || value.contains('/') || value.contains('\\') {
        return Err(ValidationError::InvalidFilename(value.to_string()));
    }

    if value.contains('\0') || value.chars().any(|c| ('\x01'..='\x1F').contains(&c)) {
        return Err(ValidationError::InvalidFilename(value.to_string()));
    }

    Ok(value)
}
