//! One shard: a locked partition of the keyspace.
//!
//! A shard is a value table and a parallel expiration table guarded by
//! a single reader-writer lock. Every mutation that touches both
//! tables for a key happens under one lock acquisition, so the pair
//! can never disagree: an expiration entry implies a value entry.
//!
//! Reads that discover an expired key upgrade from the shared to the
//! exclusive lock by dropping and re-acquiring. State is re-checked
//! after re-acquisition; another writer may have reset the deadline
//! or deleted the key while the lock was released.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;

use moonres_persistence::format::FormatError;
use moonres_persistence::record::{SnapField, SnapRecord, SnapValue};

use crate::error::StoreError;
use crate::time::{deadline_after, now_nanos, NO_EXPIRY};
use crate::types::{Field, Value};

/// Options controlling a SET write.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Only write if the key does not exist.
    pub nx: bool,
    /// Only write if the key already exists.
    pub xx: bool,
    /// Retain the key's existing deadline instead of clearing it.
    pub keep_ttl: bool,
    /// Relative TTL for the write. `None` clears any existing deadline
    /// (unless `keep_ttl` is set).
    pub ttl: Option<Duration>,
}

/// Result of a TTL query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The key does not exist (or was expired). Wire code -2.
    NotFound,
    /// The key exists with no deadline. Wire code -1.
    NoTimeout,
    /// The key exists; remaining lifetime in nanoseconds.
    Active(i64),
}

/// Both tables of a shard, guarded together.
#[derive(Debug, Default)]
struct Tables {
    data: HashMap<Bytes, Value>,
    expires: HashMap<Bytes, i64>,
}

impl Tables {
    /// Removes a key from both tables.
    fn purge(&mut self, key: &Bytes) {
        self.data.remove(key);
        self.expires.remove(key);
    }

    /// True if the key has a deadline in the past.
    fn is_expired(&self, key: &Bytes, now: i64) -> bool {
        matches!(self.expires.get(key), Some(&exp) if now > exp)
    }
}

/// A thread-safe partition of the keyspace.
#[derive(Debug, Default)]
pub struct ShardMap {
    inner: RwLock<Tables>,
}

impl ShardMap {
    pub fn new() -> ShardMap {
        ShardMap::default()
    }

    /// Looks up a String value.
    ///
    /// Returns `Ok(None)` for a missing or expired key, `WrongType` if
    /// the key holds a non-String value. Expired entries are deleted
    /// under the exclusive lock before reporting absence.
    pub fn get(&self, key: &Bytes) -> Result<Option<Bytes>, StoreError> {
        {
            let tables = self.inner.read();
            let value = match tables.data.get(key) {
                None => return Ok(None),
                Some(v) => v,
            };
            let data = match value {
                Value::String(data) => data,
                _ => return Err(StoreError::WrongType),
            };
            match tables.expires.get(key) {
                None => return Ok(Some(data.clone())),
                Some(&exp) if now_nanos() <= exp => return Ok(Some(data.clone())),
                Some(_) => {} // expired under the shared lock
            }
        }

        // upgrade: drop the shared guard, take the exclusive one, and
        // re-check: the state may have changed while unlocked
        let mut tables = self.inner.write();
        if tables.is_expired(key, now_nanos()) {
            tables.purge(key);
            return Ok(None);
        }
        match tables.data.get(key) {
            None => Ok(None),
            Some(Value::String(data)) => Ok(Some(data.clone())),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Writes a String value according to `opts`.
    ///
    /// An existing entry whose deadline has passed is deleted first and
    /// treated as absent by the NX/XX gates. Returns whether the write
    /// was applied.
    pub fn set(&self, key: Bytes, value: Bytes, opts: &SetOptions) -> bool {
        let mut tables = self.inner.write();

        let mut exists = tables.data.contains_key(&key);
        if exists && tables.is_expired(&key, now_nanos()) {
            tables.purge(&key);
            exists = false;
        }

        if opts.nx && exists {
            return false;
        }
        if opts.xx && !exists {
            return false;
        }

        tables.data.insert(key.clone(), Value::String(value));

        if opts.keep_ttl {
            // retain an existing deadline; a fresh key gets none
            if !exists {
                tables.expires.remove(&key);
            }
        } else {
            match opts.ttl {
                None => {
                    tables.expires.remove(&key);
                }
                Some(ttl) => {
                    tables.expires.insert(key, deadline_after(ttl));
                }
            }
        }

        true
    }

    /// Removes a key. Returns whether it existed.
    pub fn delete(&self, key: &Bytes) -> bool {
        let mut tables = self.inner.write();
        if tables.data.contains_key(key) {
            tables.purge(key);
            true
        } else {
            false
        }
    }

    /// Queries the remaining lifetime of a key, lazily expiring it if
    /// the deadline has passed.
    pub fn expiry(&self, key: &Bytes) -> Expiry {
        {
            let tables = self.inner.read();
            if !tables.data.contains_key(key) {
                return Expiry::NotFound;
            }
            match tables.expires.get(key) {
                None => return Expiry::NoTimeout,
                Some(&exp) => {
                    let now = now_nanos();
                    if now <= exp {
                        return Expiry::Active(exp - now);
                    }
                }
            }
        }

        let mut tables = self.inner.write();
        if !tables.data.contains_key(key) {
            return Expiry::NotFound;
        }
        match tables.expires.get(key).copied() {
            None => Expiry::NoTimeout,
            Some(exp) => {
                let now = now_nanos();
                if now > exp {
                    tables.purge(key);
                    Expiry::NotFound
                } else {
                    Expiry::Active(exp - now)
                }
            }
        }
    }

    /// Removes a key's deadline. Returns 1 iff a deadline was removed.
    pub fn persist(&self, key: &Bytes) -> i64 {
        {
            let tables = self.inner.read();
            if !tables.data.contains_key(key) || !tables.expires.contains_key(key) {
                return 0;
            }
        }

        let mut tables = self.inner.write();
        if !tables.data.contains_key(key) || !tables.expires.contains_key(key) {
            return 0;
        }
        tables.expires.remove(key);
        1
    }

    /// Sweeps up to `limit` entries of the expiration table, deleting
    /// the expired ones. Returns `expired / checked` (0.0 when nothing
    /// was checked).
    pub fn delete_expired(&self, limit: usize) -> f64 {
        let mut tables = self.inner.write();
        if tables.expires.is_empty() {
            return 0.0;
        }

        let now = now_nanos();
        let mut checked = 0usize;
        let mut expired = Vec::new();

        for (key, &exp) in tables.expires.iter() {
            checked += 1;
            if now > exp {
                expired.push(key.clone());
            }
            if checked >= limit {
                break;
            }
        }

        for key in &expired {
            tables.purge(key);
        }

        if checked == 0 {
            0.0
        } else {
            expired.len() as f64 / checked as f64
        }
    }

    /// Serializes every entry of this shard to `w`.
    ///
    /// Holds the shared lock only for this shard's section of the
    /// snapshot; other shards stay writable meanwhile.
    pub fn snapshot(&self, w: &mut dyn Write) -> Result<(), FormatError> {
        let tables = self.inner.read();
        for (key, value) in tables.data.iter() {
            let expire_at = tables.expires.get(key).copied().unwrap_or(NO_EXPIRY);
            let snap_value = match value {
                Value::String(data) => SnapValue::String(data.clone()),
                Value::Hash(map) => SnapValue::Hash(
                    map.iter()
                        .map(|(field, f)| SnapField {
                            field: field.clone(),
                            value: f.value.clone(),
                            expire_at: f.expire_at,
                        })
                        .collect(),
                ),
            };
            SnapRecord {
                key: key.clone(),
                expire_at,
                value: snap_value,
            }
            .write(w)?;
        }
        Ok(())
    }

    /// Inserts a restored record into both tables.
    pub fn insert_restored(&self, key: Bytes, value: Value, expire_at: i64) {
        let mut tables = self.inner.write();
        if expire_at != NO_EXPIRY {
            tables.expires.insert(key.clone(), expire_at);
        }
        tables.data.insert(key, value);
    }

    /// Number of live entries in the value table.
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -----------------------------------------------------------------
    // hash operations
    // -----------------------------------------------------------------

    /// Sets fields in the hash at `key`, creating it if absent.
    /// Returns the number of newly-created fields.
    pub fn hset(&self, key: Bytes, fields: Vec<(Bytes, Bytes)>) -> Result<i64, StoreError> {
        let mut tables = self.inner.write();
        if tables.is_expired(&key, now_nanos()) {
            tables.purge(&key);
        }

        let entry = tables
            .data
            .entry(key)
            .or_insert_with(|| Value::Hash(HashMap::new()));
        let map = match entry {
            Value::Hash(map) => map,
            _ => return Err(StoreError::WrongType),
        };

        let mut created = 0i64;
        for (field, value) in fields {
            if !map.contains_key(&field) {
                created += 1;
            }
            map.insert(field, Field::new(value));
        }
        Ok(created)
    }

    /// Returns the value of one hash field, honoring the key deadline
    /// and any per-field deadline.
    pub fn hget(&self, key: &Bytes, field: &Bytes) -> Result<Option<Bytes>, StoreError> {
        {
            let tables = self.inner.read();
            if !tables.data.contains_key(key) {
                return Ok(None);
            }
            if !tables.is_expired(key, now_nanos()) {
                return Self::hash_field(&tables, key, field);
            }
        }

        let mut tables = self.inner.write();
        if tables.is_expired(key, now_nanos()) {
            tables.purge(key);
            return Ok(None);
        }
        if !tables.data.contains_key(key) {
            return Ok(None);
        }
        Self::hash_field(&tables, key, field)
    }

    fn hash_field(
        tables: &Tables,
        key: &Bytes,
        field: &Bytes,
    ) -> Result<Option<Bytes>, StoreError> {
        match tables.data.get(key) {
            Some(Value::Hash(map)) => Ok(map.get(field).and_then(|f| {
                if f.expire_at != NO_EXPIRY && now_nanos() > f.expire_at {
                    None
                } else {
                    Some(f.value.clone())
                }
            })),
            Some(_) => Err(StoreError::WrongType),
            None => Ok(None),
        }
    }

    /// Returns all live fields and values of the hash at `key`.
    pub fn hget_all(&self, key: &Bytes) -> Result<Vec<(Bytes, Bytes)>, StoreError> {
        let tables = self.inner.read();
        if tables.is_expired(key, now_nanos()) {
            return Ok(Vec::new());
        }
        match tables.data.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Hash(map)) => {
                let now = now_nanos();
                Ok(map
                    .iter()
                    .filter(|(_, f)| f.expire_at == NO_EXPIRY || now <= f.expire_at)
                    .map(|(field, f)| (field.clone(), f.value.clone()))
                    .collect())
            }
            Some(_) => Err(StoreError::WrongType),
        }
    }

    /// Removes fields from the hash at `key`; an emptied hash is
    /// deleted outright. Returns the number of fields removed.
    pub fn hdel(&self, key: &Bytes, fields: &[Bytes]) -> Result<i64, StoreError> {
        let mut tables = self.inner.write();
        if tables.is_expired(key, now_nanos()) {
            tables.purge(key);
            return Ok(0);
        }

        let map = match tables.data.get_mut(key) {
            None => return Ok(0),
            Some(Value::Hash(map)) => map,
            Some(_) => return Err(StoreError::WrongType),
        };

        let mut removed = 0i64;
        for field in fields {
            if map.remove(field).is_some() {
                removed += 1;
            }
        }
        if map.is_empty() {
            tables.purge(key);
        }
        Ok(removed)
    }

    /// Returns 1 if the field exists in the hash at `key`, else 0.
    pub fn hexists(&self, key: &Bytes, field: &Bytes) -> Result<i64, StoreError> {
        Ok(i64::from(self.hget(key, field)?.is_some()))
    }

    /// Returns the number of fields in the hash at `key`.
    pub fn hlen(&self, key: &Bytes) -> Result<i64, StoreError> {
        let tables = self.inner.read();
        if tables.is_expired(key, now_nanos()) {
            return Ok(0);
        }
        match tables.data.get(key) {
            None => Ok(0),
            Some(Value::Hash(map)) => Ok(map.len() as i64),
            Some(_) => Err(StoreError::WrongType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn set_then_get() {
        let shard = ShardMap::new();
        assert!(shard.set(b("key"), b("value"), &SetOptions::default()));
        assert_eq!(shard.get(&b("key")).unwrap(), Some(b("value")));
    }

    #[test]
    fn get_missing() {
        let shard = ShardMap::new();
        assert_eq!(shard.get(&b("nope")).unwrap(), None);
    }

    #[test]
    fn delete_existing_and_missing() {
        let shard = ShardMap::new();
        shard.set(b("key"), b("value"), &SetOptions::default());
        assert!(shard.delete(&b("key")));
        assert_eq!(shard.get(&b("key")).unwrap(), None);
        assert!(!shard.delete(&b("key")));
    }

    #[test]
    fn nx_blocks_existing_key() {
        let shard = ShardMap::new();
        let nx = SetOptions {
            nx: true,
            ..Default::default()
        };
        assert!(shard.set(b("a"), b("1"), &nx));
        assert!(!shard.set(b("a"), b("2"), &nx));
        assert_eq!(shard.get(&b("a")).unwrap(), Some(b("1")));
    }

    #[test]
    fn xx_requires_existing_key() {
        let shard = ShardMap::new();
        let xx = SetOptions {
            xx: true,
            ..Default::default()
        };
        assert!(!shard.set(b("b"), b("1"), &xx));
        shard.set(b("b"), b("1"), &SetOptions::default());
        assert!(shard.set(b("b"), b("2"), &xx));
        assert_eq!(shard.get(&b("b")).unwrap(), Some(b("2")));
    }

    #[test]
    fn expired_key_counts_as_absent_for_nx() {
        let shard = ShardMap::new();
        shard.set(
            b("k"),
            b("old"),
            &SetOptions {
                ttl: Some(Duration::from_millis(5)),
                ..Default::default()
            },
        );
        thread::sleep(Duration::from_millis(20));

        let nx = SetOptions {
            nx: true,
            ..Default::default()
        };
        assert!(shard.set(b("k"), b("new"), &nx));
        assert_eq!(shard.get(&b("k")).unwrap(), Some(b("new")));
    }

    #[test]
    fn lazy_expiration_on_get() {
        let shard = ShardMap::new();
        shard.set(
            b("t"),
            b("v"),
            &SetOptions {
                ttl: Some(Duration::from_millis(5)),
                ..Default::default()
            },
        );
        assert_eq!(shard.get(&b("t")).unwrap(), Some(b("v")));

        thread::sleep(Duration::from_millis(20));
        assert_eq!(shard.get(&b("t")).unwrap(), None);
        // the entry is gone, not just hidden
        assert_eq!(shard.len(), 0);
    }

    #[test]
    fn lazy_expiration_on_expiry_query() {
        let shard = ShardMap::new();
        shard.set(
            b("t"),
            b("v"),
            &SetOptions {
                ttl: Some(Duration::from_millis(5)),
                ..Default::default()
            },
        );
        thread::sleep(Duration::from_millis(20));
        assert_eq!(shard.expiry(&b("t")), Expiry::NotFound);
        assert_eq!(shard.len(), 0);
    }

    #[test]
    fn expiry_status_codes() {
        let shard = ShardMap::new();
        assert_eq!(shard.expiry(&b("missing")), Expiry::NotFound);

        shard.set(b("forever"), b("v"), &SetOptions::default());
        assert_eq!(shard.expiry(&b("forever")), Expiry::NoTimeout);

        shard.set(
            b("temp"),
            b("v"),
            &SetOptions {
                ttl: Some(Duration::from_secs(100)),
                ..Default::default()
            },
        );
        match shard.expiry(&b("temp")) {
            Expiry::Active(nanos) => {
                assert!(nanos > 0);
                assert!(nanos <= 100 * 1_000_000_000);
            }
            other => panic!("expected Active, got {other:?}"),
        }
    }

    #[test]
    fn persist_returns_one_exactly_once() {
        let shard = ShardMap::new();
        shard.set(
            b("k"),
            b("v"),
            &SetOptions {
                ttl: Some(Duration::from_secs(100)),
                ..Default::default()
            },
        );
        assert_eq!(shard.persist(&b("k")), 1);
        assert_eq!(shard.persist(&b("k")), 0);
        assert_eq!(shard.expiry(&b("k")), Expiry::NoTimeout);
    }

    #[test]
    fn persist_on_missing_or_deadline_free_key() {
        let shard = ShardMap::new();
        assert_eq!(shard.persist(&b("missing")), 0);
        shard.set(b("plain"), b("v"), &SetOptions::default());
        assert_eq!(shard.persist(&b("plain")), 0);
    }

    #[test]
    fn plain_set_clears_existing_deadline() {
        let shard = ShardMap::new();
        shard.set(
            b("k"),
            b("v"),
            &SetOptions {
                ttl: Some(Duration::from_secs(100)),
                ..Default::default()
            },
        );
        shard.set(b("k"), b("v2"), &SetOptions::default());
        assert_eq!(shard.expiry(&b("k")), Expiry::NoTimeout);
    }

    #[test]
    fn keep_ttl_retains_deadline() {
        let shard = ShardMap::new();
        shard.set(
            b("k"),
            b("v1"),
            &SetOptions {
                ttl: Some(Duration::from_secs(100)),
                ..Default::default()
            },
        );
        shard.set(
            b("k"),
            b("v2"),
            &SetOptions {
                keep_ttl: true,
                ..Default::default()
            },
        );
        assert_eq!(shard.get(&b("k")).unwrap(), Some(b("v2")));
        assert!(matches!(shard.expiry(&b("k")), Expiry::Active(_)));
    }

    #[test]
    fn keep_ttl_on_new_key_means_no_deadline() {
        let shard = ShardMap::new();
        shard.set(
            b("fresh"),
            b("v"),
            &SetOptions {
                keep_ttl: true,
                ..Default::default()
            },
        );
        assert_eq!(shard.expiry(&b("fresh")), Expiry::NoTimeout);
    }

    #[test]
    fn get_on_hash_key_is_wrong_type() {
        let shard = ShardMap::new();
        shard
            .hset(b("h"), vec![(b("f"), b("v"))])
            .unwrap();
        assert_eq!(shard.get(&b("h")), Err(StoreError::WrongType));
    }

    #[test]
    fn set_replaces_hash_with_string() {
        let shard = ShardMap::new();
        shard.hset(b("k"), vec![(b("f"), b("v"))]).unwrap();
        assert!(shard.set(b("k"), b("now a string"), &SetOptions::default()));
        assert_eq!(shard.get(&b("k")).unwrap(), Some(b("now a string")));
    }

    #[test]
    fn delete_expired_removes_only_expired() {
        let shard = ShardMap::new();
        for i in 0..10 {
            shard.set(
                b(&format!("dead:{i}")),
                b("x"),
                &SetOptions {
                    ttl: Some(Duration::from_millis(5)),
                    ..Default::default()
                },
            );
        }
        for i in 0..5 {
            shard.set(
                b(&format!("live:{i}")),
                b("x"),
                &SetOptions {
                    ttl: Some(Duration::from_secs(3600)),
                    ..Default::default()
                },
            );
        }
        thread::sleep(Duration::from_millis(20));

        let ratio = shard.delete_expired(100);
        assert!((ratio - 10.0 / 15.0).abs() < f64::EPSILON);
        assert_eq!(shard.len(), 5);
    }

    #[test]
    fn delete_expired_empty_table_is_zero() {
        let shard = ShardMap::new();
        shard.set(b("no-ttl"), b("v"), &SetOptions::default());
        assert_eq!(shard.delete_expired(10), 0.0);
    }

    #[test]
    fn delete_expired_respects_limit() {
        let shard = ShardMap::new();
        for i in 0..50 {
            shard.set(
                b(&format!("k:{i}")),
                b("x"),
                &SetOptions {
                    ttl: Some(Duration::from_millis(1)),
                    ..Default::default()
                },
            );
        }
        thread::sleep(Duration::from_millis(20));

        let ratio = shard.delete_expired(10);
        assert_eq!(ratio, 1.0);
        assert_eq!(shard.len(), 40);
    }

    #[test]
    fn snapshot_restore_round_trip() {
        use moonres_persistence::record::SnapRecord;

        let shard = ShardMap::new();
        shard.set(b("a"), b("1"), &SetOptions::default());
        shard.set(
            b("b"),
            b("2"),
            &SetOptions {
                ttl: Some(Duration::from_secs(3600)),
                ..Default::default()
            },
        );
        shard.hset(b("h"), vec![(b("f1"), b("v1")), (b("f2"), b("v2"))]).unwrap();

        let mut buf = Vec::new();
        shard.snapshot(&mut buf).unwrap();

        let restored = ShardMap::new();
        let mut cursor = std::io::Cursor::new(&buf);
        while let Some(rec) = SnapRecord::read(&mut cursor).unwrap() {
            let value = match rec.value {
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
            restored.insert_restored(rec.key, value, rec.expire_at);
        }

        assert_eq!(restored.get(&b("a")).unwrap(), Some(b("1")));
        assert_eq!(restored.get(&b("b")).unwrap(), Some(b("2")));
        assert!(matches!(restored.expiry(&b("b")), Expiry::Active(_)));
        assert_eq!(restored.expiry(&b("a")), Expiry::NoTimeout);
        assert_eq!(restored.hget(&b("h"), &b("f1")).unwrap(), Some(b("v1")));
        assert_eq!(restored.hlen(&b("h")).unwrap(), 2);
    }

    #[test]
    fn hash_basic_operations() {
        let shard = ShardMap::new();

        assert_eq!(
            shard.hset(b("h"), vec![(b("f1"), b("v1")), (b("f2"), b("v2"))]).unwrap(),
            2
        );
        // overwriting an existing field creates nothing
        assert_eq!(shard.hset(b("h"), vec![(b("f1"), b("v9"))]).unwrap(), 0);

        assert_eq!(shard.hget(&b("h"), &b("f1")).unwrap(), Some(b("v9")));
        assert_eq!(shard.hget(&b("h"), &b("missing")).unwrap(), None);
        assert_eq!(shard.hexists(&b("h"), &b("f2")).unwrap(), 1);
        assert_eq!(shard.hexists(&b("h"), &b("nope")).unwrap(), 0);
        assert_eq!(shard.hlen(&b("h")).unwrap(), 2);

        let mut all = shard.hget_all(&b("h")).unwrap();
        all.sort();
        assert_eq!(all, vec![(b("f1"), b("v9")), (b("f2"), b("v2"))]);

        assert_eq!(shard.hdel(&b("h"), &[b("f1"), b("nope")]).unwrap(), 1);
        assert_eq!(shard.hlen(&b("h")).unwrap(), 1);

        // removing the last field removes the key
        assert_eq!(shard.hdel(&b("h"), &[b("f2")]).unwrap(), 1);
        assert_eq!(shard.hlen(&b("h")).unwrap(), 0);
        assert_eq!(shard.len(), 0);
    }

    #[test]
    fn hash_ops_on_string_key_are_wrong_type() {
        let shard = ShardMap::new();
        shard.set(b("s"), b("v"), &SetOptions::default());

        assert_eq!(
            shard.hset(b("s"), vec![(b("f"), b("v"))]),
            Err(StoreError::WrongType)
        );
        assert_eq!(shard.hget(&b("s"), &b("f")), Err(StoreError::WrongType));
        assert_eq!(shard.hget_all(&b("s")), Err(StoreError::WrongType));
        assert_eq!(shard.hdel(&b("s"), &[b("f")]), Err(StoreError::WrongType));
        assert_eq!(shard.hlen(&b("s")), Err(StoreError::WrongType));
    }

    #[test]
    fn concurrent_mixed_workload() {
        use std::sync::Arc;

        let shard = Arc::new(ShardMap::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let shard = Arc::clone(&shard);
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    let key = b(&format!("key-{}", (worker * 31 + i) % 50));
                    match i % 3 {
                        0 => {
                            shard.set(key, b("v"), &SetOptions::default());
                        }
                        1 => {
                            let _ = shard.get(&key);
                        }
                        _ => {
                            shard.delete(&key);
                        }
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
    }
}
