//! Zeroizing cryptographic key types
//!
//! Content-encryption keys and the GCM nonce/AAD drawn for every hybrid
//! envelope live in these wrappers so the bytes are cleared on drop.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-256 content-encryption key
pub const AES_KEY_SIZE: usize = 32;

/// Size of the GCM nonce
pub const NONCE_SIZE: usize = 12;

/// Size of the random additional authenticated data
pub const AAD_SIZE: usize = 12;

/// AES-256 key (32 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop, Default)]
pub struct AesKey(pub(crate) [u8; AES_KEY_SIZE]);

impl AesKey {
    /// Create a new AES key from a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut key = [0u8; AES_KEY_SIZE];
        copy_exact(bytes, &mut key)?;
        Ok(AesKey(key))
    }

    /// Get a reference to the key bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Get a mutable reference to the key bytes
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// 96-bit nonce (12 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop, Default)]
pub struct Nonce96(pub(crate) [u8; NONCE_SIZE]);

impl Nonce96 {
    /// Create a new nonce from a 12-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut nonce = [0u8; NONCE_SIZE];
        copy_exact(bytes, &mut nonce)?;
        Ok(Nonce96(nonce))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// 96-bit additional authenticated data bound into every GCM seal
#[derive(Clone, Zeroize, ZeroizeOnDrop, Default)]
pub struct Aad96(pub(crate) [u8; AAD_SIZE]);

impl Aad96 {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut aad = [0u8; AAD_SIZE];
        copy_exact(bytes, &mut aad)?;
        Ok(Aad96(aad))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

fn copy_exact(src: &[u8], dst: &mut [u8]) -> Result<(), KeyError> {
    if src.len() != dst.len() {
        return Err(KeyError::InvalidLength {
            expected: dst.len(),
            got: src.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}

/// Key-related errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
}
