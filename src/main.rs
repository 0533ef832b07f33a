use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rf_observatory::run::{run_session, RunArgs};
use rf_observatory::utils::format_duration;
use rf_observatory::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Geolocated spectrum monitoring pipeline", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "debug", "rf_observatory=trace")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a synthetic capture session and export frames and tiles
    Run {
        /// Config file; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of frames to process
        #[arg(short, long, default_value_t = 500)]
        frames: u64,

        /// Output directory for CSV and GeoJSON files
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination; defaults to the per-user config path
        path: Option<PathBuf>,
    },
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Run {
            config,
            frames,
            output,
        } => {
            let config = match config {
                Some(path) => AppConfig::load_from_file(&path)
                    .with_context(|| format!("Failed to load config {:?}", path))?,
                None => AppConfig::default(),
            };

            let summary = run_session(
                &config,
                &RunArgs {
                    frames,
                    output_dir: output,
                },
            )?;

            println!(
                "Processed {} frames ({} rejected) into {} tiles in {}",
                summary.frames_processed,
                summary.frames_rejected,
                summary.tiles,
                format_duration(summary.elapsed_secs)
            );
            println!("  {}", summary.export.frames_csv.display());
            println!("  {}", summary.export.tiles_csv.display());
            println!("  {}", summary.export.tiles_geojson.display());
        }
        Command::InitConfig { path } => {
            let path = path.unwrap_or_else(AppConfig::default_path);
            AppConfig::default()
                .save_to_file(&path)
                .with_context(|| format!("Failed to write config {:?}", path))?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}
