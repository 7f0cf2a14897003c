//! ovnkube-master
//!
//! Connects to the OVN northbound and southbound databases, keeps the
//! global tables mirrored and runs the e2e freshness heartbeat until
//! interrupted.

use anyhow::Context;
use clap::Parser;
use ovnkube_master::config::DEFAULT_CONFIG_PATH;
use ovnkube_master::{DbContext, E2eHeartbeat, MasterConfig, MasterMetrics};
use ovsdb_client::SnapshotFeed;
use prometheus::Registry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// OVN master controller: global options and e2e heartbeat
#[derive(Debug, Parser)]
#[command(name = "ovnkube-master", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = MasterConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level)?;

    info!(config = %args.config.display(), "ovnkube-master: Starting");

    match run(config).await {
        Ok(()) => {
            info!("ovnkube-master: Exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "ovnkube-master: Exiting with error");
            Err(e)
        }
    }
}

/// Initialize structured logging. `RUST_LOG` wins over `level`.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {:?}", level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set logger: {}", e))?;
    Ok(())
}

async fn run(config: MasterConfig) -> anyhow::Result<()> {
    let started = Instant::now();
    let metrics = Arc::new(MasterMetrics::new()?);
    let ctx = DbContext::connect(&config, metrics.clone())
        .await
        .context("connecting to the OVN databases")?;

    let cancel = CancellationToken::new();

    // Feeds refresh immediately, well before the first heartbeat tick.
    let feeds = [
        SnapshotFeed::new(ctx.nb().clone(), config.refresh_interval()).spawn(cancel.clone()),
        SnapshotFeed::new(ctx.sb().clone(), config.refresh_interval()).spawn(cancel.clone()),
    ];

    let heartbeat = E2eHeartbeat::new(ctx, config.heartbeat_period(), metrics.clone());
    heartbeat.start(cancel.clone());

    let registry = Registry::new();
    let probe = Arc::clone(&heartbeat);
    metrics.register(&registry, Arc::new(move || probe.probe_sb_timestamp()))?;
    metrics.mark_ready(started.elapsed());
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "ovnkube-master: Ready");

    signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("ovnkube-master: Received SIGINT, shutting down");

    cancel.cancel();
    heartbeat.join().await;
    for feed in feeds {
        if let Err(e) = feed.await {
            error!(error = %e, "Cache feed task failed");
        }
    }

    info!(
        last_nb_timestamp = ?heartbeat.last_written(),
        sb_timestamp = ?heartbeat.probe_sb_timestamp(),
        "ovnkube-master: Graceful shutdown complete"
    );
    let rendered = MasterMetrics::encode(&registry)?;
    debug!(metrics = %rendered, "Final metrics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["ovnkube-master"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(args.log_level.is_none());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "ovnkube-master",
            "--config",
            "/tmp/master.toml",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.config, PathBuf::from("/tmp/master.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }
}
