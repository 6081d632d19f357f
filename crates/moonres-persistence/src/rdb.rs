//! Point-in-time snapshot file.
//!
//! A binary dump of the whole dataset, written atomically: records go
//! to `<path>.tmp` behind a large buffered writer, then a rename swaps
//! the new file into place. A crash before the rename leaves the old
//! snapshot intact.
//!
//! File layout:
//! ```text
//! [magic: 8 bytes = "MOONRES1"]
//! [record]* (see crate::record) until EOF
//! ```
//!
//! The `Rdb` handle is storage-agnostic: `save` hands the caller a
//! writer to stream records into, `load` hands back a reader positioned
//! just past the magic. The store decides what the records mean.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::format::{FormatError, SNAP_MAGIC};

/// Buffer size for the snapshot writer. Snapshots are written in one
/// sequential pass; a large buffer keeps syscall counts low.
const WRITE_BUF_SIZE: usize = 4 * 1024 * 1024;

/// Handle to the snapshot file. Cloneable; clones share the
/// overlapping-save guard.
#[derive(Debug, Clone)]
pub struct Rdb {
    path: PathBuf,
    saving: Arc<AtomicBool>,
}

impl Rdb {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            saving: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while a save holds the overlap guard.
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Writes a snapshot atomically.
    ///
    /// `dump` receives the buffered writer positioned just past the
    /// magic header and streams the record section. Returns
    /// `SaveInProgress` if another save is running.
    pub fn save<F>(&self, dump: F) -> Result<(), FormatError>
    where
        F: FnOnce(&mut dyn Write) -> Result<(), FormatError>,
    {
        if self.saving.swap(true, Ordering::SeqCst) {
            return Err(FormatError::SaveInProgress);
        }
        let result = self.save_inner(dump);
        self.saving.store(false, Ordering::SeqCst);
        result
    }

    fn save_inner<F>(&self, dump: F) -> Result<(), FormatError>
    where
        F: FnOnce(&mut dyn Write) -> Result<(), FormatError>,
    {
        let start = Instant::now();
        let tmp_path = tmp_path_for(&self.path);

        let result = (|| {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            let mut writer = BufWriter::with_capacity(WRITE_BUF_SIZE, file);

            writer.write_all(SNAP_MAGIC)?;
            dump(&mut writer)?;

            writer.flush()?;
            writer.get_ref().sync_all()?;
            drop(writer);

            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                info!(
                    file = %self.path.display(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "snapshot saved"
                );
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    /// Loads the snapshot, if one exists.
    ///
    /// A missing file is a clean fresh start (`Ok(false)`). A bad magic
    /// header logs a warning and aborts the load without touching the
    /// store (`Ok(false)`). `restore` receives the reader positioned at
    /// the first record; any error it returns (a truncated or
    /// unparsable record) propagates as fatal.
    pub fn load<F>(&self, restore: F) -> Result<bool, FormatError>
    where
        F: FnOnce(&mut dyn Read) -> Result<(), FormatError>,
    {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(FormatError::Io(e)),
        };
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        if crate::format::read_exact(&mut reader, &mut magic).is_err() || &magic != SNAP_MAGIC {
            warn!(
                file = %self.path.display(),
                "invalid snapshot header, assuming empty or incompatible"
            );
            return Ok(false);
        }

        let start = Instant::now();
        restore(&mut reader)?;
        info!(
            file = %self.path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "snapshot loaded"
        );
        Ok(true)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
