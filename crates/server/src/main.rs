//! oscbridge: bridges message sources into a fact store and runs rule-driven actions.
//!
//! The bridge is rebuilt from scratch whenever it fails, after a short delay.
//! Ctrl-C or SIGTERM stops it for good.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use oscbridge_core::config::load_dotenv;
use oscbridge_core::BridgeConfig;
use oscbridge_server::Bridge;

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "oscbridge", version, about)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, env = "APP_CONFIG_FILE", default_value = "config.yml")]
    config: PathBuf,

    /// Seconds to wait before rebuilding a failed bridge.
    #[arg(long, env = "OSCBRIDGE_RESTART_DELAY", default_value_t = 2)]
    restart_delay_secs: u64,
}

/// Why a bridge run ended without an error.
enum Exit {
    Interrupted,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let restart_delay = Duration::from_secs(cli.restart_delay_secs);

    loop {
        info!(version = env!("CARGO_PKG_VERSION"), "OSC bridge is starting");
        match run(&cli.config).await {
            Ok(Exit::Interrupted) => {
                info!("Kill signal received, exiting");
                return Ok(());
            }
            Err(e) => error!(error = %format!("{e:#}"), "The bridge will restart now"),
        }

        let signal = shutdown_signal()?;
        tokio::select! {
            _ = tokio::time::sleep(restart_delay) => {}
            _ = signal => {
                info!("Kill signal received while restarting, exiting");
                return Ok(());
            }
        }
    }
}

/// Register for SIGINT and SIGTERM; the returned future resolves on either.
///
/// Registration happens before this returns, so no signal is lost between
/// the call and the first poll.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = std::io::Result<()>>> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => signal,
            _ = sigterm.recv() => Ok(()),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = std::io::Result<()>>> {
    Ok(tokio::signal::ctrl_c())
}

/// Run one bridge until a shutdown signal or a fatal source error.
async fn run(config_path: &Path) -> anyhow::Result<Exit> {
    let config = BridgeConfig::from_file(config_path)?;
    config.log_summary();

    let mut bridge = Bridge::start(&config).await?;
    let signal = match shutdown_signal() {
        Ok(signal) => signal,
        Err(e) => {
            bridge.stop().await;
            return Err(e.into());
        }
    };

    let outcome = tokio::select! {
        signal = signal => signal.map(|()| Exit::Interrupted).map_err(anyhow::Error::from),
        err = bridge.fatal_error() => Err(anyhow::Error::new(err).context("source encountered an issue")),
    };

    bridge.stop().await;
    outcome
}
