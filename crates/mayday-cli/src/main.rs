//! Mayday CLI entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use mayday_cli::{cli::Cli, link::TcpLink, repl, Result};
use mayday_core::channel::create_event_channel;
use mayday_core::config::{ChannelConfig, MaydayConfig};
use mayday_core::Transport;
use mayday_runtime::MaydayRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?;
    info!(
        port = config.port,
        interval_secs = config.interval_secs,
        "configuration loaded"
    );

    // The link pushes inbound traffic into the event channel; the runtime
    // consumes the other end.
    let (event_tx, event_rx) = create_event_channel(ChannelConfig::default().event_buffer_size);
    let link = TcpLink::connect(&cli.gateway, event_tx).await?;

    let link: Arc<dyn Transport> = link;
    let mut runtime = MaydayRuntime::new(config.clone(), link)?;
    let (handle, app_events) = runtime.start(event_rx)?;

    if config.auto_start {
        info!("auto-start enabled, beginning emergency broadcast");
        handle.start(None, None).await?;
    }

    repl::run(&handle, app_events).await?;

    // Graceful exit: the engine sends a final all-clear if still active
    runtime.shutdown().await;
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from the given path, or the default location;
/// a missing file is seeded with defaults, an invalid one is fatal
fn load_configuration(cli: &Cli) -> Result<MaydayConfig> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    info!("loading configuration from {}", path.display());
    Ok(MaydayConfig::load_or_init(&path)?)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mayday")
        .join("mayday.json")
}
