use bam_index_decoder::cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("bam_index_decoder=debug,info")
    } else {
        EnvFilter::new("bam_index_decoder=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Decode(args) => {
            cli::decode::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Barcodes(args) => {
            cli::barcodes::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
