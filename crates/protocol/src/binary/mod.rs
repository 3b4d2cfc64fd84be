//! Binary serialization infrastructure for confidential envelopes
//!
//! All multi-byte integers use big-endian byte order.

use std::io::{self, Read, Write};

pub mod traits;

pub use traits::{BinaryRead, BinaryWrite};

/// Read a u8 from a reader
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a u16 (big-endian) from a reader
pub fn read_u16_be<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Read a u32 (big-endian) from a reader
pub fn read_u32_be<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read exactly `n` bytes from a reader
///
/// The buffer grows with the data actually read, so a forged length prefix
/// on a short input fails with `UnexpectedEof` instead of allocating `n`.
pub fn read_bytes<R: Read>(reader: &mut R, n: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(n as u64).read_to_end(&mut buf)?;
    if buf.len() != n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, found {}", n, buf.len()),
        ));
    }
    Ok(buf)
}

/// Write a u8 to a writer
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Write a u16 (big-endian) to a writer
pub fn write_u16_be<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

/// Write a u32 (big-endian) to a writer
pub fn write_u32_be<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

/// Write a length-checked u16 prefix for a byte field
pub fn write_len_u16<W: Write>(writer: &mut W, len: usize) -> io::Result<()> {
    let value = u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("length {} does not fit in u16", len),
        )
    })?;
    write_u16_be(writer, value)
}

/// Write a length-checked u32 prefix for a byte field
pub fn write_len_u32<W: Write>(writer: &mut W, len: usize) -> io::Result<()> {
    let value = u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("length {} does not fit in u32", len),
        )
    })?;
    write_u32_be(writer, value)
}

/// Write bytes to a writer
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)
}
