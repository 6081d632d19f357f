//! Protocol error types for RESP2 parsing.

use thiserror::Error;

/// Errors that can occur when parsing the RESP2 wire format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A line was not terminated by `\r\n`: a bare `\n`, a `\r` followed
    /// by something else, or a bulk body not followed by `\r\n`.
    #[error("invalid line ending")]
    InvalidLineEnding,

    /// The first byte of a frame didn't match any RESP2 type prefix.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Failed to parse an integer from a length or integer line.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string or array declared an invalid length. Negative
    /// lengths are only valid as the `-1` null sentinel.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    /// A bulk string declared a length beyond the protocol cap.
    #[error("bulk string too large: {0} bytes")]
    BulkStringTooLarge(usize),

    /// Arrays nested deeper than the parser allows.
    #[error("frame nesting exceeds maximum depth of {0}")]
    NestingTooDeep(usize),
}
