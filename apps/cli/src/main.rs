mod logging;
mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clipwatch_core::AppConfig;
use clipwatch_listener::{is_wayland_clipboard_available, probe_kind, read_current, ListenerEngine};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one JSON line per clipboard change until interrupted
    Watch {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Print the current clipboard contents as JSON
    Snapshot,
    /// Show which listener would be used
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let _log_guard = logging::init(&config.logging)?;

    match cli.command {
        Commands::Watch { duration } => run_watch(config, duration.map(Duration::from_secs)).await,
        Commands::Snapshot => {
            let data = read_current(&config.listener)?;
            println!("{}", report::summarize(&data));
            Ok(())
        }
        Commands::Probe => {
            let report = json!({
                "listener_type": probe_kind(&config.listener),
                "wayland_clipboard_available": is_wayland_clipboard_available(),
            });
            println!("{}", report);
            Ok(())
        }
    }
}

async fn run_watch(config: AppConfig, duration: Option<Duration>) -> Result<()> {
    let engine = ListenerEngine::new(config.listener);
    let mut rx = engine
        .watch_channel(64)
        .context("Failed to start clipboard listener")?;
    info!("Watching clipboard ({} listener)", engine.listener_type());

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            change = rx.recv() => match change {
                Some(data) => println!("{}", report::summarize(&data)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("Watch duration elapsed");
                break;
            }
        }
    }

    // Unblocks a listener thread stuck on a full channel.
    drop(rx);
    // stop() waits on the listener thread
    tokio::task::spawn_blocking(move || engine.stop()).await?;
    Ok(())
}
