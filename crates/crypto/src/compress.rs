//! Gzip framing applied to JSON before it enters an envelope

use crate::helpers::CryptoError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| CryptoError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CryptoError::Compression(e.to_string()))
}

pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CryptoError::Decompression(e.to_string()))?;
    Ok(out)
}
