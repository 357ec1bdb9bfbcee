use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::Serialize;

/// Write metric rows to a TSV file with a header line.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_metrics<P: AsRef<Path>, T: Serialize>(
    path: P,
    metrics: &[T],
    description: &str,
) -> Result<()> {
    let path_ref = path.as_ref();
    DelimFile::default()
        .write_tsv(&path_ref, metrics)
        .with_context(|| format!("Failed to write {description} metrics: {}", path_ref.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::barcode::BarcodeTable;
    use crate::metrics::barcode::{BarcodeMetric, MetricsAggregator};
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_barcode_metrics() -> Result<()> {
        let table = BarcodeTable::from_sequences(["ACGT", "TTTT"])?;
        let rows = MetricsAggregator::new(&table).finish();

        let file = NamedTempFile::new()?;
        write_metrics(file.path(), &rows, "barcode")?;

        let content = std::fs::read_to_string(file.path())?;
        let header = content.lines().next().unwrap_or_default();
        assert!(header.starts_with("barcode\tbarcode_name\tlibrary_name"));
        assert!(header.ends_with("pf_normalized_matches"));
        assert_eq!(content.lines().count(), 5);

        let read_back: Vec<BarcodeMetric> = DelimFile::default().read_tsv(&file.path())?;
        assert_eq!(read_back.len(), 4);
        assert_eq!(read_back[1].barcode, "ACGT");
        assert_eq!(read_back[3].barcode_name, "lane_summary");
        Ok(())
    }

    #[test]
    fn test_write_metrics_invalid_path() {
        let rows: Vec<BarcodeMetric> = vec![BarcodeMetric::default()];
        let err = write_metrics("/nonexistent/dir/metrics.txt", &rows, "barcode").unwrap_err();
        assert!(err.to_string().contains("Failed to write barcode metrics"));
    }
}
