//! Append-only log of write commands.
//!
//! Each successful write command is re-serialized into its RESP array
//! form and handed to the log as an already-encoded payload. A single
//! background writer task consumes a bounded channel of payloads; when
//! the channel is full, senders block, which slows client writes;
//! that is the system's backpressure valve.
//!
//! The file is a raw concatenation of RESP arrays. No framing, no magic
//! header, no checksums: the log replays through the same parser that
//! handles client traffic.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use moonres_protocol::{parse_frame, Frame};

use crate::format::FormatError;

/// Capacity of the payload channel. Large enough to absorb write
/// bursts; once full, `append` blocks the command engine.
const CHANNEL_CAPACITY: usize = 10_000;

/// How often to fsync under the `EverySec` policy.
const FSYNC_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// When the log writer flushes and fsyncs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Flush and fsync after every record. Safest, slowest.
    Always,
    /// Flush and fsync once per second.
    #[default]
    EverySec,
    /// Never fsync from this layer; the OS decides. The writer still
    /// runs and writes every record.
    No,
}

/// The append-only log: a bounded channel in front of one writer task.
pub struct Aof {
    path: PathBuf,
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Aof {
    /// Opens (or creates) the log file and starts the background
    /// writer. Must be called from within a tokio runtime.
    pub fn open(path: impl Into<PathBuf>, policy: FsyncPolicy) -> Result<Self, FormatError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(writer_loop(file, rx, policy));

        Ok(Self {
            path,
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        })
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enqueues an encoded command payload.
    ///
    /// Blocks when the channel is full, applying backpressure to the caller.
    /// After [`close`](Self::close) this is a no-op.
    pub async fn append(&self, payload: Bytes) {
        let tx = self.tx.lock().clone();
        if let Some(tx) = tx {
            if tx.send(payload).await.is_err() {
                warn!("append-only log writer is gone, dropping record");
            }
        }
    }

    /// Shuts the log down: the writer drains the channel, flushes,
    /// fsyncs unconditionally, and exits. Idempotent.
    pub async fn close(&self) {
        // dropping the sender closes the channel once in-flight
        // appends finish; the writer sees `None` after the drain
        let tx = self.tx.lock().take();
        drop(tx);

        let task = self.task.lock().take();
        if let Some(task) = task {
            if task.await.is_err() {
                error!("append-only log writer task panicked");
            }
        }
    }

    /// Reads the log end-to-end and parses each record as a RESP frame.
    ///
    /// A truncated or malformed tail (a crash mid-append) stops reading
    /// with a warning; everything parsed before it is returned.
    pub fn load(&self) -> Result<Vec<Frame>, FormatError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FormatError::Io(e)),
        };

        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            match parse_frame(&data[offset..]) {
                Ok(Some((frame, consumed))) => {
                    frames.push(frame);
                    offset += consumed;
                }
                Ok(None) => {
                    warn!(
                        path = %self.path.display(),
                        offset,
                        "truncated record at end of append-only log, replaying prefix"
                    );
                    break;
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        offset,
                        "malformed record in append-only log ({e}), replaying prefix"
                    );
                    break;
                }
            }
        }

        info!(
            path = %self.path.display(),
            records = frames.len(),
            "append-only log read"
        );
        Ok(frames)
    }
}

/// The single background writer: consumes payloads, appends them, and
/// fsyncs per policy. Write errors are logged and the next record is
/// attempted; a payload is never silently dropped without a log line.
async fn writer_loop(file: File, mut rx: mpsc::Receiver<Bytes>, policy: FsyncPolicy) {
    let mut writer = BufWriter::new(file);
    let mut ticker = tokio::time::interval(FSYNC_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(payload) => {
                    if let Err(e) = writer.write_all(&payload) {
                        error!("append-only log write error: {e}");
                        continue;
                    }
                    if policy == FsyncPolicy::Always {
                        flush_and_sync(&mut writer);
                    }
                }
                // channel closed and drained: shut down
                None => break,
            },
            _ = ticker.tick(), if policy == FsyncPolicy::EverySec => {
                flush_and_sync(&mut writer);
            }
        }
    }

    // shutdown path: flush and fsync regardless of policy
    flush_and_sync(&mut writer);
}

fn flush_and_sync(writer: &mut BufWriter<File>) {
    if let Err(e) = writer.flush() {
        error!("append-only log flush error: {e}");
        return;
    }
    if let Err(e) = writer.get_ref().sync_all() {
        error!("append-only log fsync error: {e}");
    }
}
