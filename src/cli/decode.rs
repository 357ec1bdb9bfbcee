use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Args};
use noodles::sam::alignment::record::data::field::Tag;
use serde::Serialize;
use tracing::info;

use crate::cli::{BarcodeSource, OutputFormat};
use crate::core::types::{
    DecodingConfig, MatchThresholds, OutputMode, DEFAULT_MAX_MISMATCHES, DEFAULT_MAX_NO_CALLS,
    DEFAULT_MIN_MISMATCH_DELTA,
};
use crate::metrics::barcode::MetricsAggregator;
use crate::metrics::writer::write_metrics;
use crate::output::writer::{open_sinks, OutputTarget};
use crate::parsing::sam::{input_libraries, AlignmentFormat, AlignmentInput, RunInfo};
use crate::routing::router::{ReadUnits, RecordRouter, RoutingSummary};
use crate::utils::validation::parse_tag;

#[derive(Args)]
#[command(group(ArgGroup::new("destination").required(true).args(["output", "output_dir"])))]
pub struct DecodeArgs {
    /// Input SAM or BAM file, grouped by read name
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Single output file for every barcode (.sam or .bam)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for one output file per barcode
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Format of the per-barcode files written under --output-dir
    #[arg(long, value_enum, default_value = "bam")]
    pub output_format: AlignmentFormat,

    #[command(flatten)]
    pub barcodes: BarcodeSource,

    /// Barcode metrics output file
    #[arg(short, long, required = true)]
    pub metrics: PathBuf,

    /// Tag holding the barcode read
    #[arg(long, default_value = "BC", value_parser = parse_tag)]
    pub barcode_tag: Tag,

    /// Tag marking control reads
    #[arg(long, default_value = "XC", value_parser = parse_tag)]
    pub control_tag: Tag,

    /// Maximum mismatches for a barcode to be considered a match
    #[arg(long, default_value_t = DEFAULT_MAX_MISMATCHES)]
    pub max_mismatches: usize,

    /// Minimum difference between the best and second best mismatch counts
    #[arg(long, default_value_t = DEFAULT_MIN_MISMATCH_DELTA)]
    pub min_mismatch_delta: usize,

    /// Maximum no-calls (N) in the barcode read
    #[arg(long, default_value_t = DEFAULT_MAX_NO_CALLS)]
    pub max_no_calls: usize,

    /// Threads used to match barcodes
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,
}

impl DecodeArgs {
    fn config(&self) -> DecodingConfig {
        DecodingConfig {
            barcode_tag: self.barcode_tag,
            control_tag: self.control_tag,
            ..DecodingConfig::default()
        }
        .with_thresholds(MatchThresholds {
            max_mismatches: self.max_mismatches,
            min_mismatch_delta: self.min_mismatch_delta,
            max_no_calls: self.max_no_calls,
        })
    }

    fn target(&self) -> anyhow::Result<OutputTarget> {
        match (&self.output, &self.output_dir) {
            (Some(output), None) => Ok(OutputTarget::Single(output.clone())),
            (None, Some(dir)) => Ok(OutputTarget::Split {
                dir: dir.clone(),
                format: self.output_format,
            }),
            _ => anyhow::bail!("Exactly one of --output or --output-dir is required"),
        }
    }
}

/// What a decode run did, as printed at the end
#[derive(Debug, Serialize)]
pub struct DecodeReport<'a> {
    pub input: &'a Path,
    pub metrics: &'a Path,
    pub run: RunInfo,
    pub barcodes: usize,
    pub output_mode: OutputMode,
    pub thresholds: MatchThresholds,
    #[serde(flatten)]
    pub summary: RoutingSummary,
}

/// Execute decode subcommand
///
/// # Errors
///
/// Returns an error on any configuration problem, unreadable input, routing
/// failure, or if an output or the metrics cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: DecodeArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    info!("Checking inputs");
    let config = args.config();
    let target = args.target()?;
    let table = args.barcodes.load()?;
    info!(
        "Loaded {} barcodes of length {}",
        table.len(),
        table.barcode_length()
    );

    info!("Opening {}", args.input.display());
    let input = AlignmentInput::open(&args.input)
        .with_context(|| format!("Failed to open input: {}", args.input.display()))?;
    let run = RunInfo::from_header(&input.header);
    if matches!(target, OutputTarget::Split { .. }) {
        table.check_flow_cell(&run.flow_cell_id)?;
    }
    if verbose {
        let libraries = input_libraries(&input.header);
        if !libraries.is_empty() {
            info!("Input libraries: {}", libraries.join(", "));
        }
    }

    info!("Opening outputs");
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let mut sinks = open_sinks(&target, &table, &input.header, &run, &command_line)?;
    let output_mode = sinks.mode();
    info!("Opened {} output streams ({output_mode:?} layout)", sinks.len());

    info!("Decoding");
    let (_, records) = input.into_parts();
    let router = RecordRouter::new(&table, config);
    let mut metrics = MetricsAggregator::new(&table);
    let summary = router
        .route_all(
            ReadUnits::new(records),
            &mut sinks,
            &mut metrics,
            usize::from(args.threads),
        )
        .with_context(|| format!("Failed to decode {}", args.input.display()))?;

    info!("Writing metrics to {}", args.metrics.display());
    let rows = metrics.finish();
    write_metrics(&args.metrics, &rows, "barcode")?;

    let report = DecodeReport {
        input: &args.input,
        metrics: &args.metrics,
        run,
        barcodes: table.len(),
        output_mode,
        thresholds: config.thresholds,
        summary,
    };
    match format {
        OutputFormat::Text => print_text_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Tsv => print_tsv_report(&report),
    }

    Ok(())
}

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64 * 100.0 / total as f64
    }
}

fn print_text_report(report: &DecodeReport<'_>) {
    let summary = &report.summary;
    println!(
        "Decoded {} read units ({} records) from {}",
        summary.units,
        summary.records,
        report.input.display()
    );
    println!(
        "   Flow cell: {}  Lane: {}  Run: {}",
        report.run.flow_cell_id, report.run.lane, report.run.run_folder
    );
    println!("   Barcodes: {}", report.barcodes);
    println!(
        "   Matched: {} ({:.2}%)",
        summary.matched,
        percent(summary.matched, summary.units)
    );
    println!(
        "   Undetermined: {} ({:.2}%)",
        summary.undetermined,
        percent(summary.undetermined, summary.units)
    );
    println!("   Vendor failed: {}", summary.filtered);
    println!("   Controls: {}", summary.controls);
    println!("   Metrics: {}", report.metrics.display());
}

fn print_tsv_report(report: &DecodeReport<'_>) {
    let summary = &report.summary;
    println!("input\tflow_cell\tlane\tbarcodes\tunits\trecords\tmatched\tundetermined\tfiltered\tcontrols");
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        report.input.display(),
        report.run.flow_cell_id,
        report.run.lane,
        report.barcodes,
        summary.units,
        summary.records,
        summary.matched,
        summary.undetermined,
        summary.filtered,
        summary.controls
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<DecodeArgs, clap::Error> {
        let cli = Cli::try_parse_from(args)?;
        match cli.command {
            Commands::Decode(args) => Ok(args),
            Commands::Barcodes(_) => panic!("expected decode"),
        }
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[
            "bam-index-decoder", "decode", "-i", "in.bam", "-o", "out.bam", "-m", "m.tsv",
            "--barcode", "ACGT", "TTTT",
        ])
        .unwrap();
        assert_eq!(args.barcodes.barcodes, vec!["ACGT", "TTTT"]);
        assert_eq!(args.config(), DecodingConfig::default());
        assert_eq!(args.threads, 1);
        assert_eq!(
            args.target().unwrap(),
            OutputTarget::Single(PathBuf::from("out.bam"))
        );
    }

    #[test]
    fn test_custom_options() {
        let args = parse(&[
            "bam-index-decoder", "decode", "-i", "in.sam", "--output-dir", "out",
            "--output-format", "sam", "-m", "m.tsv", "--barcode-file", "b.tsv",
            "--barcode-tag", "RX", "--max-mismatches", "2", "--min-mismatch-delta", "2",
            "--max-no-calls", "0", "-t", "4",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.barcode_tag, Tag::new(b'R', b'X'));
        assert_eq!(config.thresholds.max_mismatches, 2);
        assert_eq!(config.thresholds.min_mismatch_delta, 2);
        assert_eq!(config.thresholds.max_no_calls, 0);
        assert_eq!(args.threads, 4);
        assert_eq!(
            args.target().unwrap(),
            OutputTarget::Split {
                dir: PathBuf::from("out"),
                format: AlignmentFormat::Sam
            }
        );
    }

    #[test]
    fn test_conflicting_options_rejected() {
        let base = ["bam-index-decoder", "decode", "-i", "in.bam", "-m", "m.tsv"];

        let both_outputs = [&base[..], &["-o", "o.bam", "--output-dir", "d", "--barcode", "A"]].concat();
        assert!(parse(&both_outputs).is_err());

        let no_output = [&base[..], &["--barcode", "A"]].concat();
        assert!(parse(&no_output).is_err());

        let both_barcodes = [&base[..], &["-o", "o.bam", "--barcode", "A", "--barcode-file", "b"]].concat();
        assert!(parse(&both_barcodes).is_err());

        let bad_tag = [&base[..], &["-o", "o.bam", "--barcode", "A", "--barcode-tag", "BCX"]].concat();
        assert!(parse(&bad_tag).is_err());

        let no_threads = [&base[..], &["-o", "o.bam", "--barcode", "A", "-t", "0"]].concat();
        assert!(parse(&no_threads).is_err());
    }

    #[test]
    fn test_percent() {
        assert!((percent(1, 4) - 25.0).abs() < 1e-9);
        assert!(percent(3, 0).abs() < 1e-9);
    }
}
