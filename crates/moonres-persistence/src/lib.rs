//! moonres-persistence: durability layer.
//!
//! Two independent, optionally-enabled sinks: the append-only log of
//! write commands ([`aof`]) and the point-in-time snapshot file
//! ([`rdb`]), plus the binary format helpers and record codec shared
//! between the snapshot writer and loader ([`format`], [`record`]).

pub mod aof;
pub mod format;
pub mod rdb;
pub mod record;

pub use aof::{Aof, FsyncPolicy};
pub use format::FormatError;
pub use rdb::Rdb;
pub use record::{SnapField, SnapRecord, SnapValue};
