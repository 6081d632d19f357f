//! Stored value types.
//!
//! A key maps to a tagged [`Value`]. The tag is immutable for the
//! key's lifetime: a write that changes the type replaces the whole
//! record, and a mis-typed read fails with `WrongType` instead of
//! coercing. List/Set/ZSet tags are reserved in the wire format but
//! have no in-memory representation yet.

use std::collections::HashMap;

use bytes::Bytes;

/// Wire-level type tags. The discriminants are the snapshot format's
/// type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    String = 1,
    List = 2,
    Set = 3,
    Hash = 4,
    ZSet = 5,
}

impl DataType {
    /// Maps a wire tag back to a data type.
    pub fn from_tag(tag: u8) -> Option<DataType> {
        match tag {
            1 => Some(DataType::String),
            2 => Some(DataType::List),
            3 => Some(DataType::Set),
            4 => Some(DataType::Hash),
            5 => Some(DataType::ZSet),
            _ => None,
        }
    }
}

/// One hash field: its value and an optional per-field deadline
/// (nanoseconds since the UNIX epoch, 0 = none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub value: Bytes,
    pub expire_at: i64,
}

impl Field {
    pub fn new(value: Bytes) -> Field {
        Field {
            value,
            expire_at: crate::time::NO_EXPIRY,
        }
    }
}

/// A stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Bytes),
    Hash(HashMap<Bytes, Field>),
}

impl Value {
    /// The wire tag for this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Hash(_) => DataType::Hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for dt in [
            DataType::String,
            DataType::List,
            DataType::Set,
            DataType::Hash,
            DataType::ZSet,
        ] {
            assert_eq!(DataType::from_tag(dt as u8), Some(dt));
        }
        assert_eq!(DataType::from_tag(0), None);
        assert_eq!(DataType::from_tag(6), None);
    }

    #[test]
    fn tag_values_match_wire_format() {
        assert_eq!(DataType::String as u8, 1);
        assert_eq!(DataType::List as u8, 2);
        assert_eq!(DataType::Set as u8, 3);
        assert_eq!(DataType::Hash as u8, 4);
        assert_eq!(DataType::ZSet as u8, 5);
    }

    #[test]
    fn value_reports_its_type() {
        assert_eq!(
            Value::String(Bytes::from_static(b"x")).data_type(),
            DataType::String
        );
        assert_eq!(Value::Hash(HashMap::new()).data_type(), DataType::Hash);
    }
}
