//! The sharded store: stable key → shard assignment and fan-out.
//!
//! Shard selection is `fnv1a32(key) & (n - 1)` with a power-of-two
//! shard count, so the mask is exact and a key's shard never changes
//! for the lifetime of the store. Single-key operations delegate to
//! the owning shard; the expiration sweep fans out one task per shard;
//! snapshot and restore walk shards without ever holding more than one
//! shard's lock at a time.

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;

use moonres_persistence::format::FormatError;
use moonres_persistence::record::{SnapRecord, SnapValue};

use crate::error::StoreError;
use crate::shard::{Expiry, SetOptions, ShardMap};
use crate::time::{now_nanos, NO_EXPIRY};
use crate::types::{Field, Value};

/// Upper bound on the shard count.
const MAX_SHARDS: usize = 64;

/// 32-bit FNV-1a. Stable, fast on short keys, and hashes raw bytes
/// without touching the std hasher machinery.
#[inline]
pub fn fnv1a32(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A fan-out over a power-of-two number of shards.
#[derive(Debug)]
pub struct ShardedStore {
    shards: Vec<Arc<ShardMap>>,
    mask: u32,
}

impl ShardedStore {
    /// Builds a store with `requested` shards.
    ///
    /// The count must be a power of two between 1 and 64 inclusive.
    pub fn new(requested: usize) -> Result<ShardedStore, StoreError> {
        if requested == 0 || requested > MAX_SHARDS || !requested.is_power_of_two() {
            return Err(StoreError::InvalidShardCount(requested));
        }

        let shards = (0..requested).map(|_| Arc::new(ShardMap::new())).collect();
        Ok(ShardedStore {
            shards,
            mask: (requested - 1) as u32,
        })
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard_for(&self, key: &[u8]) -> &ShardMap {
        &self.shards[(fnv1a32(key) & self.mask) as usize]
    }

    // -----------------------------------------------------------------
    // single-key delegation
    // -----------------------------------------------------------------

    pub fn get(&self, key: &Bytes) -> Result<Option<Bytes>, StoreError> {
        self.shard_for(key).get(key)
    }

    pub fn set(&self, key: Bytes, value: Bytes, opts: &SetOptions) -> bool {
        let shard = self.shard_for(&key);
        shard.set(key, value, opts)
    }

    pub fn delete(&self, key: &Bytes) -> bool {
        self.shard_for(key).delete(key)
    }

    pub fn expiry(&self, key: &Bytes) -> Expiry {
        self.shard_for(key).expiry(key)
    }

    pub fn persist(&self, key: &Bytes) -> i64 {
        self.shard_for(key).persist(key)
    }

    pub fn hset(&self, key: Bytes, fields: Vec<(Bytes, Bytes)>) -> Result<i64, StoreError> {
        let shard = self.shard_for(&key);
        shard.hset(key, fields)
    }

    pub fn hget(&self, key: &Bytes, field: &Bytes) -> Result<Option<Bytes>, StoreError> {
        self.shard_for(key).hget(key, field)
    }

    pub fn hget_all(&self, key: &Bytes) -> Result<Vec<(Bytes, Bytes)>, StoreError> {
        self.shard_for(key).hget_all(key)
    }

    pub fn hdel(&self, key: &Bytes, fields: &[Bytes]) -> Result<i64, StoreError> {
        self.shard_for(key).hdel(key, fields)
    }

    pub fn hexists(&self, key: &Bytes, field: &Bytes) -> Result<i64, StoreError> {
        self.shard_for(key).hexists(key, field)
    }

    pub fn hlen(&self, key: &Bytes) -> Result<i64, StoreError> {
        self.shard_for(key).hlen(key)
    }

    /// Total number of keys across shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.is_empty())
    }

    // -----------------------------------------------------------------
    // multi-shard fan-out
    // -----------------------------------------------------------------

    /// Runs each shard's expiration sweep on its own task and returns
    /// the arithmetic mean of the per-shard expired ratios.
    pub async fn delete_expired(&self, limit: usize) -> f64 {
        let handles: Vec<_> = self
            .shards
            .iter()
            .map(|shard| {
                let shard = Arc::clone(shard);
                tokio::spawn(async move { shard.delete_expired(limit) })
            })
            .collect();

        let mut total = 0.0;
        for handle in handles {
            total += handle.await.unwrap_or(0.0);
        }
        total / self.shards.len() as f64
    }

    /// Serializes every shard in order, each under its own read lock
    /// for the duration of its own section only. The result is
    /// consistent per shard, not globally.
    pub fn snapshot(&self, w: &mut dyn Write) -> Result<(), FormatError> {
        for shard in &self.shards {
            shard.snapshot(w)?;
        }
        Ok(())
    }

    /// Streams records from `r`, routing each to its owning shard.
    ///
    /// Records whose deadline is already in the past (including
    /// negative deadlines) are dropped, never materialized.
    pub fn restore(&self, r: &mut dyn Read) -> Result<(), FormatError> {
        let now = now_nanos();
        while let Some(record) = SnapRecord::read(r)? {
            if record.expire_at != NO_EXPIRY && record.expire_at <= now {
                continue;
            }
            let value = match record.value {
                SnapValue::String(data) => Value::String(data),
                SnapValue::Hash(fields) => Value::Hash(
                    fields
                        .into_iter()
                        .map(|f| {
                            (
                                f.field,
                                Field {
                                    value: f.value,
                                    expire_at: f.expire_at,
                                },
                            )
                        })
                        .collect(),
                ),
            };
            self.shard_for(&record.key)
                .insert_restored(record.key, value, record.expire_at);
        }
        Ok(())
    }
}
