//! Cryptographic helper functions
//!
//! Random material for envelopes, cipher initialization and fingerprinting.

use crate::types::{Aad96, AesKey, Nonce96};
use aes_gcm::{Aes256Gcm, KeyInit};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key length")]
    InvalidKeyLength,

    #[error("Secure random source unavailable: {0}")]
    Randomness(String),

    #[error("Authentication failed: ciphertext or associated data was modified")]
    AuthenticationFailed,

    #[error("AES-GCM sealing failed")]
    SealFailed,

    #[error("RSA-OAEP encryption failed: {0}")]
    RsaEncrypt(String),

    #[error("RSA-OAEP decryption failed: {0}")]
    RsaDecrypt(String),

    #[error("Plaintext of {len} bytes exceeds the RSA-OAEP limit of {max} bytes")]
    PlaintextTooLong { len: usize, max: usize },

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),
}

/// Create an AES-256-GCM cipher from a key
pub fn create_aes_cipher(key: &AesKey) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| CryptoError::InvalidKeyLength)
}

fn fill_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Randomness(e.to_string()))
}

/// Generate a random 96-bit nonce for AES-GCM
pub fn generate_nonce() -> Result<Nonce96, CryptoError> {
    let mut nonce = Nonce96::default();
    fill_random(nonce.as_mut_slice())?;
    Ok(nonce)
}

/// Generate 96 bits of random additional authenticated data
pub fn generate_aad() -> Result<Aad96, CryptoError> {
    let mut aad = Aad96::default();
    fill_random(aad.as_mut_slice())?;
    Ok(aad)
}

/// Generate a random AES-256 content-encryption key
pub fn generate_aes_key() -> Result<AesKey, CryptoError> {
    let mut key = AesKey::default();
    fill_random(key.as_mut_slice())?;
    Ok(key)
}

/// Lowercase hex SHA-256 digest of a string
///
/// Used to fingerprint confidential values without storing them.
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
