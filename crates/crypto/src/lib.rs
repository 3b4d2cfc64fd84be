//! Confidential Envelope Cryptographic Operations
//!
//! This crate provides the primitives behind confidential envelopes:
//! - Zeroizing key types that automatically clear memory
//! - AES-256-GCM seal/open with explicit IV and additional data
//! - RSA-OAEP-SHA256 key wrapping with the OAEP size threshold
//! - Gzip framing for JSON payloads
//! - A key-material codec for PEM, PKCS#12, JWK and raw symmetric keys
//!
//! # Security Features
//!
//! - **Zeroization**: All key material uses `zeroize` to clear memory on drop
//! - **Authenticated encryption**: GCM failures surface as a single opaque error
//!
//! # Example
//!
//! ```
//! use confidential_crypto::{aes_gcm_open, aes_gcm_seal, generate_aad, generate_aes_key, generate_nonce};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key = generate_aes_key()?;
//! let iv = generate_nonce()?;
//! let aad = generate_aad()?;
//!
//! let sealed = aes_gcm_seal(&key, &iv, aad.as_slice(), b"sensitive information")?;
//! let opened = aes_gcm_open(&key, &iv, aad.as_slice(), &sealed)?;
//! assert_eq!(b"sensitive information", opened.as_slice());
//! # Ok(())
//! # }
//! ```

pub mod aead;
pub mod compress;
pub mod helpers;
pub mod kem;
pub mod keys;
pub mod types;

// Re-export commonly used types
pub use aead::{aes_gcm_open, aes_gcm_seal, GCM_TAG_SIZE};
pub use compress::{gzip_compress, gzip_decompress};
pub use helpers::{
    create_aes_cipher, generate_aad, generate_aes_key, generate_nonce, sha256_hex, CryptoError,
};
pub use kem::{
    max_oaep_plaintext, rsa_modulus_bytes, rsa_oaep_decrypt, rsa_oaep_encrypt,
    rsa_public_key_from_pem, OAEP_HASH_LEN,
};
pub use keys::{
    from_jwk_set, import_symmetric, pkcs12_decode, private_key_from_pem, public_key_from_pem,
    to_jwk, AzureJwk, Jwk, KeyMaterialError, PemBlock, Pkcs12Bundle, PrivateKey,
};
pub use types::{Aad96, AesKey, KeyError, Nonce96, AAD_SIZE, AES_KEY_SIZE, NONCE_SIZE};

// Re-export underlying crypto libraries for callers that hold raw keys
pub use p256;
pub use p384;
pub use p521;
pub use pkcs8;
pub use rsa;
