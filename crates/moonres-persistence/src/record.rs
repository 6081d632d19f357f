//! Snapshot record codec.
//!
//! Each record in a snapshot file is:
//! ```text
//! header (13 bytes, little-endian):
//!   u32  key_len
//!   i64  expire_at_nanos   (0 == no expiration)
//!   u8   type_tag          (1=String, 2=List, 3=Set, 4=Hash, 5=ZSet)
//! key:   key_len bytes
//! value: type-dependent
//!   String: u32 value_len, value_len bytes
//!   Hash:   u32 field_count, then field_count ×
//!             (u32 field_len, field_len bytes,
//!              u32 val_len,   val_len bytes,
//!              i64 expire_at_nanos)
//! ```
//!
//! List/Set/ZSet tags are reserved; a reader encountering one fails the
//! load rather than partially populating the store.

use std::io::{Read, Write};

use bytes::Bytes;

use crate::format::{self, FormatError};

/// Wire type tags for stored values.
pub const TAG_STRING: u8 = 1;
pub const TAG_LIST: u8 = 2;
pub const TAG_SET: u8 = 3;
pub const TAG_HASH: u8 = 4;
pub const TAG_ZSET: u8 = 5;

/// One hash field: value plus its own expiration deadline (0 = none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapField {
    pub field: Bytes,
    pub value: Bytes,
    pub expire_at: i64,
}

/// The value part of a snapshot record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapValue {
    String(Bytes),
    Hash(Vec<SnapField>),
}

/// A single entry in a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapRecord {
    pub key: Bytes,
    /// Absolute deadline in nanoseconds since the UNIX epoch; 0 = none.
    pub expire_at: i64,
    pub value: SnapValue,
}

impl SnapRecord {
    /// Writes this record to `w` in the wire layout above.
    pub fn write(&self, w: &mut dyn Write) -> Result<(), FormatError> {
        format::write_u32(w, self.key.len() as u32)?;
        format::write_i64(w, self.expire_at)?;

        match &self.value {
            SnapValue::String(data) => {
                format::write_u8(w, TAG_STRING)?;
                w.write_all(&self.key)?;
                format::write_bytes(w, data)?;
            }
            SnapValue::Hash(fields) => {
                format::write_u8(w, TAG_HASH)?;
                w.write_all(&self.key)?;
                format::write_u32(w, fields.len() as u32)?;
                for f in fields {
                    format::write_bytes(w, &f.field)?;
                    format::write_bytes(w, &f.value)?;
                    format::write_i64(w, f.expire_at)?;
                }
            }
        }
        Ok(())
    }

    /// Reads the next record from `r`.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (EOF exactly at a
    /// record boundary). A partial header or body is an error: a
    /// truncated file must not load silently.
    pub fn read(r: &mut dyn Read) -> Result<Option<SnapRecord>, FormatError> {
        let mut header = [0u8; 13];

        // distinguish clean EOF from a torn header
        match r.read(&mut header[..1]) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(FormatError::Io(e)),
        }
        format::read_exact(r, &mut header[1..])?;

        let key_len = u32::from_le_bytes(header[0..4].try_into().expect("4-byte slice")) as usize;
        let expire_at = i64::from_le_bytes(header[4..12].try_into().expect("8-byte slice"));
        let tag = header[12];

        if key_len > format::MAX_FIELD_LEN {
            return Err(FormatError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("key length {key_len} exceeds maximum"),
            )));
        }

        let mut key = vec![0u8; key_len];
        format::read_exact(r, &mut key)?;

        let value = match tag {
            TAG_STRING => SnapValue::String(Bytes::from(format::read_bytes(r)?)),
            TAG_HASH => {
                let count = format::read_u32(r)?;
                let mut fields = Vec::with_capacity((count as usize).min(65_536));
                for _ in 0..count {
                    let field = Bytes::from(format::read_bytes(r)?);
                    let value = Bytes::from(format::read_bytes(r)?);
                    let expire_at = format::read_i64(r)?;
                    fields.push(SnapField {
                        field,
                        value,
                        expire_at,
                    });
                }
                SnapValue::Hash(fields)
            }
            TAG_LIST | TAG_SET | TAG_ZSET => return Err(FormatError::UnsupportedType(tag)),
            other => return Err(FormatError::UnknownTag(other)),
        };

        Ok(Some(SnapRecord {
            key: Bytes::from(key),
            expire_at,
            value,
        }))
    }
}
