use std::collections::HashSet;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::{debug, warn};

use crate::core::barcode::{BarcodeTable, BarcodeTableError, NamedBarcode};
use crate::parsing::sam::ParseError;

const BARCODE_SEQUENCE: &str = "barcode_sequence";

/// A recognized barcode-file column
#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Sequence,
    Name,
    Library,
    Sample,
    Description,
    FlowCell,
    Lane,
    InsertSize,
    SequencingCenter,
    Project,
    /// `tt:longname`: read-group tag `tt`, case kept
    EndUserTag(String),
}

impl Column {
    fn from_header(raw: &str) -> Option<Self> {
        let name = raw.to_lowercase();
        let column = match name.as_str() {
            BARCODE_SEQUENCE => Self::Sequence,
            "barcode_name" => Self::Name,
            "library_name" => Self::Library,
            "sample_name" => Self::Sample,
            "description" => Self::Description,
            "fcid" => Self::FlowCell,
            "lane" => Self::Lane,
            "insert_size" => Self::InsertSize,
            "sequencing_center" => Self::SequencingCenter,
            "project" => Self::Project,
            _ => match (name.split_once(':'), raw.split_once(':')) {
                (Some((_, "project")), _) => Self::Project,
                (_, Some((tag, _))) if tag.len() == 2 && tag.is_ascii() => {
                    Self::EndUserTag(tag.to_string())
                }
                _ => return None,
            },
        };
        Some(column)
    }
}

#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_lowercase)
        .is_some_and(|ext| ext == "gz" || ext == "bgz")
}

/// Read a barcode file (optionally gzip compressed) into a validated table
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::Table` if its content does not describe a valid table.
pub fn parse_barcode_file(path: &Path) -> Result<BarcodeTable, ParseError> {
    let file = std::fs::File::open(path)?;
    let mut text = String::new();
    if is_gzipped(path) {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        std::io::BufReader::new(file).read_to_string(&mut text)?;
    }
    debug!("Read {} bytes of barcodes from {}", text.len(), path.display());
    Ok(parse_barcode_text(&text)?)
}

/// Parse tab-delimited barcode text.
///
/// The first non-blank line is the header; a leading `#` is stripped and
/// column names are matched case-insensitively. Only `barcode_sequence` is
/// required. Blank lines and `#` lines after the header are skipped, as are
/// unrecognized columns.
///
/// # Errors
///
/// Returns `BarcodeTableError::MissingColumn` without a `barcode_sequence`
/// column, `BarcodeTableError::MalformedRow` for an invalid `insert_size`, or
/// any error raised by [`BarcodeTable::new`].
pub fn parse_barcode_text(text: &str) -> Result<BarcodeTable, BarcodeTableError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Err(BarcodeTableError::MissingColumn(BARCODE_SEQUENCE.to_string()));
    };

    let mut columns: Vec<Option<Column>> = Vec::new();
    for name in header.trim_start_matches('#').split('\t') {
        let name = name.trim();
        let column = Column::from_header(name);
        if column.is_none() {
            debug!("Ignoring barcode file column '{name}'");
        }
        columns.push(column);
    }
    if !columns.contains(&Some(Column::Sequence)) {
        return Err(BarcodeTableError::MissingColumn(BARCODE_SEQUENCE.to_string()));
    }

    let mut entries = Vec::new();
    for (i, line) in lines {
        if line.starts_with('#') {
            continue;
        }
        entries.push(parse_row(line, i + 1, &columns)?);
    }

    BarcodeTable::new(entries)
}

fn parse_row(
    line: &str,
    line_number: usize,
    columns: &[Option<Column>],
) -> Result<NamedBarcode, BarcodeTableError> {
    let mut entry = NamedBarcode::default();
    let mut seen_tags: HashSet<&str> = HashSet::new();

    for (column, value) in columns.iter().zip(line.split('\t')) {
        let Some(column) = column else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let value_owned = Some(value.to_string());

        match column {
            Column::Sequence => entry.sequence = value.to_string(),
            Column::Name => entry.name = value.to_string(),
            Column::Library => entry.library_name = value_owned,
            Column::Sample => entry.sample_name = value_owned,
            Column::Description => entry.description = value_owned,
            Column::FlowCell => entry.flow_cell_id = value_owned,
            Column::Lane => entry.lane = value_owned,
            Column::SequencingCenter => entry.sequencing_center = value_owned,
            Column::Project => entry.project = value_owned,
            Column::InsertSize => {
                let size = value.parse().map_err(|_| BarcodeTableError::MalformedRow {
                    line: line_number,
                    message: format!("insert_size '{value}' is not a non-negative integer"),
                })?;
                entry.insert_size = Some(size);
            }
            Column::EndUserTag(tag) => {
                if !seen_tags.insert(tag) {
                    warn!("Line {line_number}: read-group tag {tag} given twice; keeping the first value");
                    continue;
                }
                entry.end_user_tags.push((tag.clone(), value.to_string()));
            }
        }
    }

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::Builder;

    const TABLE: &str = "\
#Barcode_Sequence\tBARCODE_NAME\tlibrary_name\tsample_name\tdescription\tfcid\tlane\tinsert_size\tsequencing_center\tpj:project\txy:notes\tzz\n\
ACGTACGT\tidx1\tlib1\tsample1\tfirst\tFC1\t1\t300\tCenter\tProjA\tnote1\tignored\n\
\n\
# a comment\n\
tgcatgca\t\tlib2\tsample2\t\t\t\t\t\tProjB\t\tignored\n";

    #[test]
    fn test_parse_barcode_text() {
        let table = parse_barcode_text(TABLE).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.barcode_length(), 8);

        let first = &table.barcodes()[0];
        assert_eq!(first.sequence, "ACGTACGT");
        assert_eq!(first.name, "idx1");
        assert_eq!(first.library_name.as_deref(), Some("lib1"));
        assert_eq!(first.sample_name.as_deref(), Some("sample1"));
        assert_eq!(first.description.as_deref(), Some("first"));
        assert_eq!(first.flow_cell_id.as_deref(), Some("FC1"));
        assert_eq!(first.lane.as_deref(), Some("1"));
        assert_eq!(first.insert_size, Some(300));
        assert_eq!(first.sequencing_center.as_deref(), Some("Center"));
        assert_eq!(first.project.as_deref(), Some("ProjA"));
        assert_eq!(
            first.end_user_tags,
            vec![("xy".to_string(), "note1".to_string())]
        );

        let second = &table.barcodes()[1];
        assert_eq!(second.sequence, "TGCATGCA");
        assert_eq!(second.name, "2");
        assert_eq!(second.description, None);
        assert_eq!(second.project.as_deref(), Some("ProjB"));
        assert!(second.end_user_tags.is_empty());
    }

    #[test]
    fn test_sequence_only() {
        let table = parse_barcode_text("barcode_sequence\nAAAA\nCCCC\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.barcodes()[1].name, "2");
    }

    #[test]
    fn test_missing_sequence_column() {
        let err = parse_barcode_text("barcode_name\tlibrary_name\nidx1\tlib1\n").unwrap_err();
        assert_eq!(
            err,
            BarcodeTableError::MissingColumn("barcode_sequence".to_string())
        );
        assert!(matches!(
            parse_barcode_text("\n\n"),
            Err(BarcodeTableError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_header_only_is_empty() {
        assert_eq!(
            parse_barcode_text("barcode_sequence\n").unwrap_err(),
            BarcodeTableError::Empty
        );
    }

    #[test]
    fn test_invalid_insert_size() {
        let err = parse_barcode_text("barcode_sequence\tinsert_size\nAAAA\tbig\n").unwrap_err();
        assert!(matches!(err, BarcodeTableError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_rows() {
        let err = parse_barcode_text("barcode_sequence\nAAAA\naaaa\n").unwrap_err();
        assert!(matches!(err, BarcodeTableError::Duplicate { .. }));
    }

    #[test]
    fn test_parse_gzipped_file() {
        let mut file = Builder::new().suffix(".txt.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(TABLE.as_bytes()).unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let table = parse_barcode_file(file.path()).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_parse_plain_file() {
        let mut file = Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let table = parse_barcode_file(file.path()).unwrap();
        assert_eq!(table.barcodes()[0].name, "idx1");

        assert!(matches!(
            parse_barcode_file(Path::new("/nonexistent/barcodes.txt")),
            Err(ParseError::Io(_))
        ));
    }
}
