//! Binary format helpers for the snapshot file.
//!
//! All multi-byte integers are stored in little-endian. Length-prefixed
//! fields cap their allocation so a corrupt prefix can't exhaust memory.

use std::io::{self, Read, Write};

use thiserror::Error;

/// Magic bytes at the start of a snapshot file.
pub const SNAP_MAGIC: &[u8; 8] = b"MOONRES1";

/// Errors that can occur when reading or writing persistence formats.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unknown value type tag: {0}")]
    UnknownTag(u8),

    #[error("value type tag {0} is reserved but not supported by this loader")]
    UnsupportedType(u8),

    #[error("a save is already in progress")]
    SaveInProgress,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Maximum length accepted for a length-prefixed field. 512 MB is
/// generous for any realistic key or value while keeping a corrupt
/// length prefix from triggering a multi-gigabyte allocation.
pub const MAX_FIELD_LEN: usize = 512 * 1024 * 1024;

// ---------------------------------------------------------------------------
// write helpers
// ---------------------------------------------------------------------------

/// Writes a `u8`.
pub fn write_u8(w: &mut (impl Write + ?Sized), val: u8) -> io::Result<()> {
    w.write_all(&[val])
}

/// Writes a `u32` in little-endian.
pub fn write_u32(w: &mut (impl Write + ?Sized), val: u32) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

/// Writes an `i64` in little-endian.
pub fn write_i64(w: &mut (impl Write + ?Sized), val: i64) -> io::Result<()> {
    w.write_all(&val.to_le_bytes())
}

/// Writes a length-prefixed byte slice: `[len: u32][data]`.
///
/// Returns an error if the data length exceeds `u32::MAX`.
pub fn write_bytes(w: &mut (impl Write + ?Sized), data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("data length {} exceeds u32::MAX", data.len()),
        )
    })?;
    write_u32(w, len)?;
    w.write_all(data)
}

// ---------------------------------------------------------------------------
// read helpers
// ---------------------------------------------------------------------------

/// Reads a `u8`.
pub fn read_u8(r: &mut (impl Read + ?Sized)) -> Result<u8, FormatError> {
    let mut buf = [0u8; 1];
    read_exact(r, &mut buf)?;
    Ok(buf[0])
}

/// Reads a `u32` in little-endian.
pub fn read_u32(r: &mut (impl Read + ?Sized)) -> Result<u32, FormatError> {
    let mut buf = [0u8; 4];
    read_exact(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads an `i64` in little-endian.
pub fn read_i64(r: &mut (impl Read + ?Sized)) -> Result<i64, FormatError> {
    let mut buf = [0u8; 8];
    read_exact(r, &mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Reads a length-prefixed byte vector: `[len: u32][data]`.
///
/// Rejects lengths above [`MAX_FIELD_LEN`].
pub fn read_bytes(r: &mut (impl Read + ?Sized)) -> Result<Vec<u8>, FormatError> {
    let len = read_u32(r)? as usize;
    if len > MAX_FIELD_LEN {
        return Err(FormatError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("field length {len} exceeds maximum of {MAX_FIELD_LEN}"),
        )));
    }
    let mut buf = vec![0u8; len];
    read_exact(r, &mut buf)?;
    Ok(buf)
}

/// Reads exactly `buf.len()` bytes, mapping a short read to `UnexpectedEof`.
pub fn read_exact(r: &mut (impl Read + ?Sized), buf: &mut [u8]) -> Result<(), FormatError> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FormatError::UnexpectedEof
        } else {
            FormatError::Io(e)
        }
    })
}
