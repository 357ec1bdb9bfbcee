use clap::Args;

use crate::cli::{BarcodeSource, OutputFormat};
use crate::core::barcode::{BarcodeTable, NamedBarcode};

#[derive(Args)]
pub struct BarcodesArgs {
    #[command(flatten)]
    pub barcodes: BarcodeSource,
}

/// Execute barcodes subcommand
///
/// # Errors
///
/// Returns an error if the barcodes cannot be loaded or fail validation.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: BarcodesArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let table = args.barcodes.load()?;

    match format {
        OutputFormat::Text => print_text_table(&table, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(table.barcodes())?),
        OutputFormat::Tsv => print_tsv_table(&table),
    }
    Ok(())
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

fn print_text_table(table: &BarcodeTable, verbose: bool) {
    println!(
        "{} barcodes of length {}",
        table.len(),
        table.barcode_length()
    );
    println!();
    println!(
        "{:<20} {:<width$} {:<20} {:<20} {:<15}",
        "NAME",
        "SEQUENCE",
        "LIBRARY",
        "SAMPLE",
        "PROJECT",
        width = table.barcode_length().max(8)
    );
    println!("{}", "-".repeat(80 + table.barcode_length().max(8)));

    for entry in table.barcodes() {
        println!(
            "{:<20} {:<width$} {:<20} {:<20} {:<15}",
            entry.name,
            entry.sequence,
            or_dash(entry.library_name.as_deref()),
            or_dash(entry.sample_name.as_deref()),
            or_dash(entry.project.as_deref()),
            width = table.barcode_length().max(8)
        );
        if verbose {
            print_details(entry);
        }
    }
}

fn print_details(entry: &NamedBarcode) {
    if let Some(description) = entry.description.as_deref() {
        println!("    Description: {description}");
    }
    if entry.flow_cell_id.is_some() || entry.lane.is_some() {
        println!(
            "    Flow cell: {}  Lane: {}",
            or_dash(entry.flow_cell_id.as_deref()),
            or_dash(entry.lane.as_deref())
        );
    }
    if let Some(size) = entry.insert_size {
        println!("    Insert size: {size}");
    }
    if let Some(center) = entry.sequencing_center.as_deref() {
        println!("    Sequencing center: {center}");
    }
    for (tag, value) in &entry.end_user_tags {
        println!("    {tag}: {value}");
    }
}

fn print_tsv_table(table: &BarcodeTable) {
    println!("barcode_sequence\tbarcode_name\tlibrary_name\tsample_name\tdescription\tproject");
    for entry in table.barcodes() {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            entry.sequence,
            entry.name,
            entry.library_name.as_deref().unwrap_or_default(),
            entry.sample_name.as_deref().unwrap_or_default(),
            entry.description.as_deref().unwrap_or_default(),
            entry.project.as_deref().unwrap_or_default()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some("lib")), "lib");
        assert_eq!(or_dash(Some("")), "-");
        assert_eq!(or_dash(None), "-");
    }
}
