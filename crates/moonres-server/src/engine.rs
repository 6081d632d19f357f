//! The command engine.
//!
//! A dispatch table from uppercased command name to handler. The
//! engine itself is stateless beyond the table and its handles to the
//! store, the append-only log, the snapshot file, and the shutdown
//! signal. The registry is immutable once construction finishes, so
//! lookups need no synchronization.
//!
//! Write-path ordering: the mutation executes under the shard lock and
//! produces the reply; only if the reply is not an error and the
//! command mutates state is its re-serialized RESP form enqueued on
//! the append-only log. An append for a failed command is forbidden.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::watch;
use tracing::{debug, error, info};

use moonres_core::{spawn_reaper, ReaperConfig, ShardedStore};
use moonres_persistence::{Aof, Rdb};
use moonres_protocol::{encode_command, Frame};

use crate::config::{parse_fsync_policy, Config};
use crate::handlers::{self, Context};

type Handler = Box<dyn Fn(&Context) -> Frame + Send + Sync>;

/// Coordinates command execution with the store and both persistence
/// sinks, and owns the background tasks' shutdown signal.
pub struct Engine {
    commands: HashMap<&'static str, Handler>,
    store: Arc<ShardedStore>,
    aof: Option<Aof>,
    shutdown: watch::Sender<bool>,
}

impl Engine {
    /// Builds the engine: registers commands, replays the append-only
    /// log (or loads the snapshot when the log is disabled), and
    /// starts the reaper and auto-save tasks.
    ///
    /// Replay finishes before this returns, so the caller can start
    /// accepting connections immediately afterwards.
    pub fn new(store: Arc<ShardedStore>, cfg: &Config) -> anyhow::Result<Engine> {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let rdb = cfg
            .persistence
            .rdb
            .enabled
            .then(|| Rdb::new(&cfg.persistence.rdb.filename));

        let mut commands: HashMap<&'static str, Handler> = HashMap::new();
        register_basic(&mut commands);
        register_persistence(&mut commands, rdb.clone(), Arc::clone(&store));

        let mut engine = Engine {
            commands,
            store: Arc::clone(&store),
            aof: None,
            shutdown,
        };

        if cfg.persistence.aof.enabled {
            let policy = parse_fsync_policy(&cfg.persistence.aof.fsync)?;
            let aof = Aof::open(&cfg.persistence.aof.filename, policy)
                .with_context(|| {
                    format!(
                        "failed to open append-only log at {}",
                        cfg.persistence.aof.filename
                    )
                })?;
            // replay before the log is wired in, so replayed commands
            // are never re-appended
            engine.replay(&aof)?;
            engine.aof = Some(aof);
        } else if let Some(rdb) = &rdb {
            // the log is authoritative when both sinks are enabled;
            // the snapshot only loads when the log is off
            rdb.load(|r| store.restore(r))
                .with_context(|| format!("failed to load snapshot at {}", rdb.path().display()))?;
        }

        if let Some(rdb) = rdb {
            if cfg.persistence.rdb.interval > Duration::ZERO {
                spawn_autosave(
                    rdb,
                    Arc::clone(&store),
                    cfg.persistence.rdb.interval,
                    shutdown_rx.clone(),
                );
            }
        }

        if cfg.gc.enabled {
            spawn_reaper(
                store,
                ReaperConfig {
                    interval: cfg.gc.interval,
                    samples_per_check: cfg.gc.samples_per_check,
                    match_threshold: cfg.gc.match_threshold,
                },
                shutdown_rx,
            );
        }

        Ok(engine)
    }

    /// Executes one command and routes successful writes to the
    /// append-only log. The log enqueue may block when the channel is
    /// full; that backpressure deliberately slows the caller.
    pub async fn execute(&self, name: &str, args: &[Frame], peer: Option<SocketAddr>) -> Frame {
        debug!(cmd = name, args = args.len(), "executing command");

        let reply = self.dispatch(name, args, peer);

        if let Some(aof) = &self.aof {
            if !matches!(reply, Frame::Error(_)) && is_write_command(name) {
                aof.append(encode_command(name, args)).await;
            }
        }

        reply
    }

    fn dispatch(&self, name: &str, args: &[Frame], peer: Option<SocketAddr>) -> Frame {
        match self.commands.get(name) {
            Some(handler) => handler(&Context {
                args,
                store: &self.store,
                peer,
            }),
            None => Frame::error(format!("ERR unknown command '{name}'")),
        }
    }

    /// Replays the append-only log through the dispatch table. Unknown
    /// commands are skipped; nothing is re-appended.
    fn replay(&self, aof: &Aof) -> anyhow::Result<()> {
        let frames = aof.load().context("failed to read append-only log")?;
        if frames.is_empty() {
            return Ok(());
        }

        info!(commands = frames.len(), "restoring append-only log");
        let mut replayed = 0usize;
        for frame in frames {
            let Frame::Array(items) = frame else { continue };
            if items.is_empty() {
                continue;
            }
            let Some(name_bytes) = items[0].as_bytes() else {
                continue;
            };
            let name = String::from_utf8_lossy(&name_bytes).to_ascii_uppercase();
            if self.commands.contains_key(name.as_str()) {
                self.dispatch(&name, &items[1..], None);
                replayed += 1;
            }
        }
        info!(replayed, "append-only log restore finished");
        Ok(())
    }

    /// Stops background tasks and closes the append-only log (drain,
    /// flush, fsync). Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        if let Some(aof) = &self.aof {
            aof.close().await;
        }
        info!("engine stopped");
    }
}

/// Commands that mutate state and therefore belong in the log.
fn is_write_command(name: &str) -> bool {
    matches!(name, "SET" | "DEL" | "PERSIST" | "HSET" | "HDEL")
}

fn register_basic(commands: &mut HashMap<&'static str, Handler>) {
    commands.insert("PING", Box::new(handlers::ping));
    commands.insert("GET", Box::new(handlers::get));
    commands.insert("SET", Box::new(handlers::set));
    commands.insert("DEL", Box::new(handlers::del));
    commands.insert("TTL", Box::new(handlers::ttl));
    commands.insert("PTTL", Box::new(handlers::pttl));
    commands.insert("PERSIST", Box::new(handlers::persist));
    commands.insert("COMMAND", Box::new(handlers::command));
    commands.insert("HSET", Box::new(handlers::hset));
    commands.insert("HGET", Box::new(handlers::hget));
    commands.insert("HGETALL", Box::new(handlers::hgetall));
    commands.insert("HDEL", Box::new(handlers::hdel));
    commands.insert("HEXISTS", Box::new(handlers::hexists));
    commands.insert("HLEN", Box::new(handlers::hlen));
}

/// SAVE and BGSAVE capture the snapshot handle, so they register as
/// closures rather than free functions.
fn register_persistence(
    commands: &mut HashMap<&'static str, Handler>,
    rdb: Option<Rdb>,
    store: Arc<ShardedStore>,
) {
    let save_rdb = rdb.clone();
    let save_store = Arc::clone(&store);
    commands.insert(
        "SAVE",
        Box::new(move |ctx| {
            if !ctx.args.is_empty() {
                return handlers::wrong_arity("SAVE");
            }
            match &save_rdb {
                None => Frame::error("ERR RDB disabled"),
                Some(rdb) => match rdb.save(|w| save_store.snapshot(w)) {
                    Ok(()) => Frame::Simple("OK".into()),
                    Err(e) => Frame::error(format!("ERR {e}")),
                },
            }
        }),
    );

    commands.insert(
        "BGSAVE",
        Box::new(move |ctx| {
            if !ctx.args.is_empty() {
                return handlers::wrong_arity("BGSAVE");
            }
            match &rdb {
                None => Frame::error("ERR RDB disabled"),
                Some(rdb) => {
                    if rdb.is_saving() {
                        return Frame::error("ERR Background save already in progress");
                    }
                    let rdb = rdb.clone();
                    let store = Arc::clone(&store);
                    tokio::task::spawn_blocking(move || {
                        if let Err(e) = rdb.save(|w| store.snapshot(w)) {
                            error!("background save failed: {e}");
                        }
                    });
                    Frame::Simple("Background saving started".into())
                }
            }
        }),
    );
}

/// Periodic snapshot ticker. Each tick starts a save on the blocking
/// pool; an overlapping save is refused by the snapshot handle and
/// logged, never propagated.
fn spawn_autosave(
    rdb: Rdb,
    store: Arc<ShardedStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately; the first save should
        // happen one full interval in
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rdb = rdb.clone();
                    let store = Arc::clone(&store);
                    tokio::task::spawn_blocking(move || {
                        if let Err(e) = rdb.save(|w| store.snapshot(w)) {
                            error!("auto-save failed: {e}");
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("auto-save stopped");
                        return;
                    }
                }
            }
        }
    });
}
