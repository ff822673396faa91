//! sigex bot entry point.

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

/// Signal-driven options trade execution bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SIGEX_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Signal file to execute (overrides `signal_file` in the config)
    #[arg(short, long)]
    signals: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    sigex_ws::init_crypto();

    let args = Args::parse();

    let config = sigex_bot::AppConfig::load(args.config.as_deref())?;
    sigex_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting sigex bot v{}", env!("CARGO_PKG_VERSION"));

    let Some(signal_path) = args.signals.or_else(|| config.signal_file.clone()) else {
        bail!("no signal file: pass --signals or set signal_file in the config");
    };

    let mut app = sigex_bot::Application::new(config)?;
    let signals = app.load_signals(&signal_path).await?;
    if signals.is_empty() {
        bail!("no valid signals in {signal_path}");
    }

    app.run(signals).await?;
    Ok(())
}
