//! TCP accept loop and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use moonres_core::ShardedStore;

use crate::config::Config;
use crate::connection;
use crate::engine::Engine;

/// How long shutdown waits for in-flight connections to finish.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the store and engine, binds the listener, and serves until a
/// shutdown signal arrives. Initialization failures (bad shard count,
/// unusable persistence files, occupied port) propagate as errors and
/// become a non-zero exit.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let store = Arc::new(ShardedStore::new(cfg.storage.shards)?);
    let engine = Arc::new(Engine::new(Arc::clone(&store), &cfg)?);

    let addr = cfg.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, shards = store.shard_count(), "listening");

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let engine = Arc::clone(&engine);
                    connections.spawn(async move {
                        if let Err(e) = connection::handle(stream, peer, engine).await {
                            warn!(%peer, "connection error: {e}");
                        }
                    });
                }
                Err(e) => error!("accept error: {e}"),
            },
            _ = shutdown_signal() => break,
        }
    }

    info!("shutting down");
    drop(listener);
    engine.shutdown().await;

    let drain = async {
        while connections.join_next().await.is_some() {}
    };
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await {
        Ok(()) => info!("all connections closed gracefully"),
        Err(_) => warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "shutdown timed out waiting for connections, forcing exit"
        ),
    }

    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
