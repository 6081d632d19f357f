//! moonres server entry point: configuration, logging, and the serve
//! loop. Exits 0 on clean shutdown, non-zero on fatal init failure.

mod config;
mod connection;
mod docs;
mod engine;
mod handlers;
mod server;

use anyhow::Context as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load(".").context("failed to load configuration")?;
    init_logging(&cfg.log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.server.port,
        shards = cfg.storage.shards,
        "moonres starting"
    );

    server::run(cfg).await?;

    info!("moonres stopped");
    Ok(())
}

fn init_logging(log: &LogConfig) {
    // RUST_LOG takes precedence; otherwise the configured level, with a
    // fallback to info if the level string doesn't parse
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
