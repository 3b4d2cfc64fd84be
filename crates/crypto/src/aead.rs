//! AES-256-GCM sealing of envelope payloads
//!
//! The caller supplies the key, nonce and AAD; the output is `ciphertext || tag`
//! as produced by `aes-gcm`.

// Nonce::from_slice is the supported constructor on aes-gcm 0.10.x
#![allow(deprecated)]

use crate::helpers::{create_aes_cipher, CryptoError};
use crate::types::{AesKey, Nonce96};
use aes_gcm::{
    aead::{Aead, Payload},
    Nonce,
};

/// Size of the GCM authentication tag appended to every sealed payload
pub const GCM_TAG_SIZE: usize = 16;

/// Seal `plaintext` under `key`, binding `aad` into the tag
pub fn aes_gcm_seal(
    key: &AesKey,
    iv: &Nonce96,
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = create_aes_cipher(key)?;
    let nonce = Nonce::from_slice(iv.as_slice());
    cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::SealFailed)
}

/// Open a sealed payload; any modification of ciphertext, tag or AAD fails
/// with [`CryptoError::AuthenticationFailed`]
pub fn aes_gcm_open(
    key: &AesKey,
    iv: &Nonce96,
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < GCM_TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }
    let cipher = create_aes_cipher(key)?;
    let nonce = Nonce::from_slice(iv.as_slice());
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}
