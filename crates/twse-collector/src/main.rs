//! TWSE daily close downloader CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twse_collector::{modules, CollectorConfig, Overrides};

#[derive(Parser)]
#[command(name = "twse-collector")]
#[command(about = "Download TWSE daily close CSVs (Date,Close)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Download closes and write one CSV per instrument
    Download {
        /// Instrument codes, space or comma separated (e.g. 0050 00830 00670L)
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        symbols: Vec<String>,

        /// Lookback window in years
        #[arg(long)]
        years: Option<u32>,

        /// Output directory
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Exit with a failure status if any instrument produced no file
        #[arg(long)]
        strict: bool,
    },

    /// Print the months a download would request
    Months {
        /// Lookback window in years
        #[arg(long)]
        years: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("twse_collector={0},twse_data={0}", cli.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = CollectorConfig::from_env();

    match cli.command {
        Commands::Download {
            symbols,
            years,
            out_dir,
            strict,
        } => {
            config.apply(Overrides {
                symbols,
                years,
                output_dir: out_dir,
            });
            tracing::debug!(
                symbols = ?config.symbols,
                years = config.lookback_years,
                out_dir = %config.output_dir.display(),
                "Configuration loaded"
            );

            let stats = modules::download_closes(&config).await?;
            stats.log_summary("close download");

            if strict && stats.has_failures() {
                tracing::error!(
                    failed = ?stats.failed_instruments,
                    "Strict mode: instruments without data"
                );
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Months { years } => {
            let years = years.unwrap_or(config.lookback_years);
            let today = chrono::Local::now().date_naive();
            let mut stdout = std::io::stdout().lock();
            modules::write_month_plan(&mut stdout, today, years)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
