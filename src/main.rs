use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error};

use stormseries::config::SeriesConfig;
use stormseries::error::EXIT_FAILURE;
use stormseries::pipeline::SeriesByInitPipeline;
use stormseries::subprocess::SubprocessManager;

/// Run a series analysis of storm tiles by init time and plot the results
#[derive(Parser)]
#[command(name = "stormseries", version)]
#[command(about = "Series analysis by init time for storm tiles", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    debug!("Loading configuration from {}", cli.config.display());
    let config = match SeriesConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!("series analysis by init failed: {err:#}");
            eprintln!("Error: {err:#}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let pipeline = SeriesByInitPipeline::new(config, SubprocessManager::production());
    if let Err(err) = pipeline.run().await {
        error!("series analysis by init failed: {err}");
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
}
