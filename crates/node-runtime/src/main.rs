//! # PeerCloud Node
//!
//! Boots the in-process demo cluster and runs until Ctrl+C, or until a peer
//! sees a second coordinator. Coordinator and storage modes need a shared
//! directory injected through [`NodeRuntime::with_directory`]; the binary
//! only carries the in-process one and refuses those modes.
//!
//! ## Environment
//!
//! - `PC_CONFIG` - TOML file with `[node]`, `[membership]`, `[identity]`, `[locality]`
//! - `PC_ROLE`, `PC_SWEEP_INTERVAL_MS`, `PC_RETRY_LIMIT`, `PC_P2P_DIR`, ... - overrides
//! - `PC_LOG_LEVEL` - `trace` | `debug` | `info` | `warn` | `error` (default `info`)

use anyhow::{Context, Result};
use node_runtime::{NodeConfig, NodeRuntime};
use std::str::FromStr;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn log_level() -> Level {
    std::env::var("PC_LOG_LEVEL")
        .ok()
        .and_then(|raw| Level::from_str(raw.trim()).ok())
        .unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level())
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env().context("failed to load configuration")?;
    if config.locality.is_relay {
        warn!("running as relay; locality evidence will not be published");
    }

    let mut runtime = NodeRuntime::new(config);
    runtime.start().context("node failed to start")?;

    info!("Node is running. Press Ctrl+C to stop.");
    let fatal = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        }
        fatal = runtime.fatal_error() => Some(fatal),
    };

    runtime.shutdown().await;
    match fatal {
        Some(e) => {
            error!(error = %e, "node stopped on a fatal cluster error");
            Err(anyhow::Error::new(e).context("cluster misconfigured"))
        }
        None => Ok(()),
    }
}
