//! Maintenance controller entry point.

use mtce_daemon::{ConfigLoader, EventLoop, Mtced};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("mtced v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("MTCE_CONFIG").unwrap_or_else(|_| "/etc/mtc.conf".into());
    let config = ConfigLoader::new().with_file(config_path).load_or_default();

    let daemon = Arc::new(Mtced::new(config));

    if let Err(e) = daemon.authenticate().await {
        tracing::warn!(error = %e, "initial keystone authentication failed, continuing without a token");
    }

    let own_uptime = uptime_since_process_start();
    daemon.evaluate_dor(own_uptime);

    let mut event_loop = EventLoop::new(daemon.clone());
    event_loop.run().await;

    Ok(())
}

/// How long this process has been running. The original derives this from
/// `/proc/uptime`/process start time; that plumbing is out of scope here
/// (spec §1), so this returns a zero baseline and lets `Instant`-based
/// deadlines downstream measure relative elapsed time from it.
fn uptime_since_process_start() -> std::time::Duration {
    std::time::Duration::from_secs(0)
}
