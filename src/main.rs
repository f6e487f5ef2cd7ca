//! Diag Observers - log tracker CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use diag_observers::config::{ConfigError, ConfigLoader, ObserverConfig};
use diag_observers::display;
use diag_observers::service::AggregationService;
use diag_observers::session::AllowAll;

#[derive(Parser)]
#[command(
    name = "diag-observers",
    about = "Delta-driven telemetry observers",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail and classify the system log until Ctrl-C.
    Track {
        /// Config file (default: search path).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Log binary to run instead of the configured one.
        #[arg(long)]
        binary: Option<String>,
        /// Log buffer to read.
        #[arg(short, long)]
        buffer: Option<String>,
        /// Print updates as JSON lines.
        #[arg(long)]
        json: bool,
        /// Do not truncate long lines.
        #[arg(long)]
        raw: bool,
    },
    /// Print the effective configuration as TOML.
    ShowConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn loader(path: Option<PathBuf>) -> ConfigLoader {
    path.map_or_else(ConfigLoader::new, ConfigLoader::with_path)
}

fn load_config(loader: &ConfigLoader) -> Result<ObserverConfig, ConfigError> {
    let config = loader.load()?;
    tracing::debug!(?config, "Configuration loaded");
    Ok(config)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Track {
            config,
            binary,
            buffer,
            json,
            raw,
        } => track(config, binary, buffer, json, raw).await,
        Commands::ShowConfig { config } => show_config(config),
    };

    if let Err(message) = result {
        display::print_error(&message);
        std::process::exit(1);
    }
}

fn show_config(path: Option<PathBuf>) -> Result<(), String> {
    let config = load_config(&loader(path)).map_err(|e| e.to_string())?;
    let text = toml::to_string_pretty(&config).map_err(|e| e.to_string())?;
    print!("{text}");
    Ok(())
}

async fn track(
    path: Option<PathBuf>,
    binary: Option<String>,
    buffer: Option<String>,
    json: bool,
    raw: bool,
) -> Result<(), String> {
    let loader = loader(path);
    let mut tracker = load_config(&loader).map_err(|e| e.to_string())?.tracker;
    if let Some(binary) = binary {
        tracker.binary = binary;
    }
    if let Some(buffer) = buffer {
        tracker.buffer = buffer;
    }

    let mut service = AggregationService::new(tracker, Arc::new(AllowAll)).map_err(|e| e.to_string())?;
    let mut updates = UnboundedReceiverStream::new(service.bind());
    service.start().map_err(|e| e.to_string())?;

    if !json {
        let config_path = loader.find_config_file().map(|p| p.display().to_string());
        display::print_tracker_start(&service.config().command().display(), config_path.as_deref());
    }

    let mut liveness = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping tracker");
                break;
            }
            Some(update) = updates.next() => print_update(&update, json, raw),
            _ = liveness.tick() => {
                if !service.is_reading() {
                    tracing::info!("Log process ended");
                    break;
                }
            }
        }
    }

    let summary = service.stop().await;
    // Drain whatever the final flush published.
    service.unbind();
    while let Some(update) = updates.next().await {
        print_update(&update, json, raw);
    }

    let summary = match summary {
        Some(Ok(summary)) => Some(summary),
        Some(Err(e)) => return Err(e.to_string()),
        None => None,
    };
    if !json {
        display::print_tracker_stop(summary.as_ref(), &service.totals());
    }
    Ok(())
}

fn print_update(update: &diag_observers::service::LogsUpdate, json: bool, raw: bool) {
    if json {
        match serde_json::to_string(update) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to encode update"),
        }
    } else {
        display::print_update(update, raw);
    }
}
