//! moonres-core: the storage engine.
//!
//! Owns the sharded keyspace, data types, expiration, and the
//! background reaper. Each shard is one reader-writer lock over a
//! value table and a parallel expiration table; the sharded store
//! routes keys to shards by a stable hash and fans out the operations
//! that touch every shard.

pub mod error;
pub mod reaper;
pub mod shard;
pub mod store;
pub mod time;
pub mod types;

pub use error::StoreError;
pub use reaper::{spawn_reaper, ReaperConfig};
pub use shard::{Expiry, SetOptions, ShardMap};
pub use store::ShardedStore;
pub use types::{DataType, Field, Value};
