//! Single-pass RESP2 parser.
//!
//! Operates on buffered byte slices. The caller is responsible for
//! reading data from the network into a buffer; this parser is purely
//! synchronous. A `Cursor<&[u8]>` tracks the position through the input
//! without consuming it, so the caller can retry once more data arrives.
//!
//! Returning `Ok(None)` means the buffer does not yet hold a complete
//! frame. Callers draining a finite input (the append-only log loader)
//! treat a trailing `Ok(None)` with leftover bytes as a truncated frame.
//!
//! Line endings are validated strictly: every line must terminate with
//! `\r\n`, and the two bytes after a bulk body must be exactly `\r\n`.
//! A `\n` reached before any `\r`, or a `\r` followed by anything else,
//! fails with [`ProtocolError::InvalidLineEnding`]. Truncating is never
//! an option.

use std::io::Cursor;

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// Maximum nesting depth for arrays. Prevents stack overflow from
/// malformed deeply-nested frames.
const MAX_NESTING_DEPTH: usize = 64;

/// Maximum number of elements in an array. Prevents memory
/// amplification where tiny elements create disproportionately large
/// Vec allocations.
const MAX_ARRAY_ELEMENTS: i64 = 1_048_576;

/// Maximum length of a bulk string in bytes (512 MB, matching Redis).
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Cap for Vec::with_capacity in array parsing, limiting the up-front
/// allocation from a declared count before any child data is parsed.
const PREALLOC_CAP: usize = 1024;

/// Parses one complete RESP2 frame from the front of `buf`.
///
/// Returns `Ok(Some((frame, consumed)))` if a complete frame was parsed,
/// `Ok(None)` if the buffer doesn't contain enough data yet, or
/// `Err(...)` if the data is malformed.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(buf);
    match try_parse(&mut cursor, 0) {
        Ok(Some(frame)) => {
            let consumed = cursor.position() as usize;
            Ok(Some((frame, consumed)))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parses a frame at the cursor position. `Ok(None)` means incomplete.
fn try_parse(cursor: &mut Cursor<&[u8]>, depth: usize) -> Result<Option<Frame>, ProtocolError> {
    let prefix = match read_byte(cursor) {
        Some(b) => b,
        None => return Ok(None),
    };

    match prefix {
        b'+' => {
            let line = match read_line(cursor)? {
                Some(l) => l,
                None => return Ok(None),
            };
            let s = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidLineEnding)?;
            Ok(Some(Frame::Simple(s.to_owned())))
        }
        b'-' => {
            let line = match read_line(cursor)? {
                Some(l) => l,
                None => return Ok(None),
            };
            let s = std::str::from_utf8(line).map_err(|_| ProtocolError::InvalidLineEnding)?;
            Ok(Some(Frame::Error(s.to_owned())))
        }
        b':' => match read_integer_line(cursor)? {
            Some(val) => Ok(Some(Frame::Integer(val))),
            None => Ok(None),
        },
        b'$' => {
            let len = match read_integer_line(cursor)? {
                Some(l) => l,
                None => return Ok(None),
            };

            if len == -1 {
                return Ok(Some(Frame::NullBulk));
            }
            if len < 0 {
                return Err(ProtocolError::InvalidFrameLength(len));
            }
            if len > MAX_BULK_LEN {
                return Err(ProtocolError::BulkStringTooLarge(len as usize));
            }
            let len = len as usize;

            // need the body plus its trailing \r\n
            let pos = cursor.position() as usize;
            let buf = *cursor.get_ref();
            if buf.len() < pos + len + 2 {
                // the body terminator may already be provably wrong
                if buf.len() == pos + len + 1 && buf[pos + len] != b'\r' {
                    return Err(ProtocolError::InvalidLineEnding);
                }
                return Ok(None);
            }
            if buf[pos + len] != b'\r' || buf[pos + len + 1] != b'\n' {
                return Err(ProtocolError::InvalidLineEnding);
            }

            let data = Bytes::copy_from_slice(&buf[pos..pos + len]);
            cursor.set_position((pos + len + 2) as u64);
            Ok(Some(Frame::Bulk(data)))
        }
        b'*' => {
            let next_depth = depth + 1;
            if next_depth > MAX_NESTING_DEPTH {
                return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH));
            }

            let count = match read_integer_line(cursor)? {
                Some(c) => c,
                None => return Ok(None),
            };

            if count == -1 {
                return Ok(Some(Frame::NullArray));
            }
            if count < 0 {
                return Err(ProtocolError::InvalidFrameLength(count));
            }
            if count > MAX_ARRAY_ELEMENTS {
                return Err(ProtocolError::InvalidFrameLength(count));
            }

            let count = count as usize;
            let mut frames = Vec::with_capacity(count.min(PREALLOC_CAP));
            for _ in 0..count {
                match try_parse(cursor, next_depth)? {
                    Some(frame) => frames.push(frame),
                    None => return Ok(None),
                }
            }
            Ok(Some(Frame::Array(frames)))
        }
        other => Err(ProtocolError::InvalidPrefix(other)),
    }
}

// ---------------------------------------------------------------------------
// low-level cursor helpers
// ---------------------------------------------------------------------------

fn read_byte(cursor: &mut Cursor<&[u8]>) -> Option<u8> {
    let pos = cursor.position() as usize;
    if pos >= cursor.get_ref().len() {
        return None;
    }
    cursor.set_position((pos + 1) as u64);
    Some(cursor.get_ref()[pos])
}

/// Reads the bytes up to (but not including) the next `\r\n` and
/// advances the cursor past it. `Ok(None)` means the terminator hasn't
/// arrived yet. A `\n` before any `\r`, or a `\r` followed by anything
/// other than `\n`, is a hard error.
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<Option<&'a [u8]>, ProtocolError> {
    let buf = *cursor.get_ref();
    let start = cursor.position() as usize;

    match memchr::memchr2(b'\r', b'\n', &buf[start..]) {
        Some(offset) => {
            let pos = start + offset;
            if buf[pos] == b'\n' {
                // newline with no preceding carriage return
                return Err(ProtocolError::InvalidLineEnding);
            }
            // found \r; the \n must follow immediately
            match buf.get(pos + 1) {
                Some(b'\n') => {
                    cursor.set_position((pos + 2) as u64);
                    Ok(Some(&buf[start..pos]))
                }
                Some(_) => Err(ProtocolError::InvalidLineEnding),
                None => Ok(None),
            }
        }
        None => Ok(None),
    }
}

/// Reads a line and parses it as an i64.
fn read_integer_line(cursor: &mut Cursor<&[u8]>) -> Result<Option<i64>, ProtocolError> {
    match read_line(cursor)? {
        Some(line) => parse_i64_bytes(line).map(Some),
        None => Ok(None),
    }
}

/// Parses an i64 directly from a byte slice without allocating.
///
/// Negative numbers accumulate in the negative direction so that
/// `i64::MIN` is representable without overflow.
fn parse_i64_bytes(buf: &[u8]) -> Result<i64, ProtocolError> {
    if buf.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let (negative, digits) = if buf[0] == b'-' {
        (true, &buf[1..])
    } else {
        (false, buf)
    };

    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        let digit = (b - b'0') as i64;
        n = if negative {
            n.checked_mul(10).and_then(|n| n.checked_sub(digit))
        } else {
            n.checked_mul(10).and_then(|n| n.checked_add(digit))
        }
        .ok_or(ProtocolError::InvalidInteger)?;
    }
    Ok(n)
}
