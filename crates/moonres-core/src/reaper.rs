//! Active expiration: the background reaper.
//!
//! Lazy expiration only reclaims keys that get read again. The reaper
//! covers the rest: every tick it asks each shard to sample a bounded
//! slice of its expiration table and delete what has expired. When the
//! observed expired ratio is at or above the threshold the keyspace is
//! presumed dirty, so the reaper yields and sweeps again immediately
//! instead of waiting out the tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::ShardedStore;

/// Tuning knobs for the reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Tick period between sweeps.
    pub interval: Duration,
    /// Per-shard sample bound passed to each sweep.
    pub samples_per_check: usize,
    /// Ratio in [0, 1] at or above which the reaper re-runs
    /// immediately instead of waiting for the next tick.
    pub match_threshold: f64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            samples_per_check: 20,
            match_threshold: 0.25,
        }
    }
}

/// Spawns the reaper task. It stops at or before the next tick
/// boundary once `shutdown` flips to `true`.
pub fn spawn_reaper(
    store: Arc<ShardedStore>,
    config: ReaperConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    loop {
                        let ratio = store.delete_expired(config.samples_per_check).await;
                        if ratio > 0.0 {
                            debug!(expired_ratio = ratio, "reaper removed expired keys");
                        }
                        if ratio < config.match_threshold {
                            break;
                        }
                        // keyspace looks dirty: go again without waiting,
                        // but stay responsive to shutdown between rounds
                        tokio::task::yield_now().await;
                        if *shutdown.borrow() {
                            info!("reaper stopped");
                            return;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    // a dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reaper stopped");
                        return;
                    }
                }
            }
        }
    })
}
