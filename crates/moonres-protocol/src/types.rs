//! RESP2 frame types.
//!
//! The [`Frame`] enum represents a single parsed RESP2 value. Bulk
//! strings use `Bytes` for reference-counted storage that avoids
//! copies when moving data between the connection buffer, the engine,
//! and the append-only log.

use bytes::Bytes;

/// A single RESP2 protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple string response, e.g. `+OK\r\n`.
    /// Used for short, non-binary status replies.
    Simple(String),

    /// Error response, e.g. `-WRONGTYPE ...\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Bulk (binary-safe) string, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// The null bulk string, `$-1\r\n`. Used for "no value" replies.
    NullBulk,

    /// Ordered array of frames, e.g. `*2\r\n+a\r\n+b\r\n`.
    /// `*0\r\n` is an empty (non-null) array.
    Array(Vec<Frame>),

    /// The null array, `*-1\r\n`.
    NullArray,
}

impl Frame {
    /// Builds a bulk frame from anything byte-like.
    pub fn bulk(data: impl Into<Bytes>) -> Frame {
        Frame::Bulk(data.into())
    }

    /// Builds an error frame from anything string-like.
    pub fn error(msg: impl Into<String>) -> Frame {
        Frame::Error(msg.into())
    }

    /// Returns `true` for the null bulk string and the null array.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::NullBulk | Frame::NullArray)
    }

    /// Returns the raw bytes of a Bulk or Simple frame, if this is one.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            Frame::Bulk(data) => Some(data.clone()),
            Frame::Simple(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_equality() {
        assert_eq!(Frame::Simple("OK".into()), Frame::Simple("OK".into()));
        assert_ne!(Frame::Simple("OK".into()), Frame::Simple("ERR".into()));
        assert_eq!(Frame::Integer(42), Frame::Integer(42));
        assert_eq!(Frame::NullBulk, Frame::NullBulk);
        assert_ne!(Frame::NullBulk, Frame::NullArray);
    }

    #[test]
    fn is_null() {
        assert!(Frame::NullBulk.is_null());
        assert!(Frame::NullArray.is_null());
        assert!(!Frame::Simple("OK".into()).is_null());
        assert!(!Frame::Array(vec![]).is_null());
    }

    #[test]
    fn as_bytes() {
        assert_eq!(
            Frame::bulk("hi").as_bytes(),
            Some(Bytes::from_static(b"hi"))
        );
        assert_eq!(
            Frame::Simple("PONG".into()).as_bytes(),
            Some(Bytes::from_static(b"PONG"))
        );
        assert_eq!(Frame::Integer(1).as_bytes(), None);
    }
}
