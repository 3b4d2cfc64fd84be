//! Key-material codec
//!
//! Operators hand the producer PEM files, PKCS#12 bundles or raw symmetric
//! keys. This module classifies and decodes them and converts the result into
//! the JSON-Web-Key form stored inside a binary confidential payload.
//!
//! Supported private key containers:
//! - `PRIVATE KEY` (PKCS#8), RSA or EC on P-256/P-384/P-521
//! - `ENCRYPTED PRIVATE KEY` (PKCS#8 PBES2), given the password
//! - `EC PRIVATE KEY` (SEC1)
//! - `RSA PRIVATE KEY` (PKCS#1)

pub mod jwk;
pub mod pem;
pub mod pkcs12;

use std::fmt;
use thiserror::Error;

pub use self::jwk::{from_jwk_set, import_symmetric, to_jwk, AzureJwk, Jwk};
pub use self::pem::{
    find_certificate_blocks, find_private_key_block, parse_pem_blocks, private_key_from_block,
    private_key_from_encrypted_block, private_key_from_pem, public_key_from_pem, PemBlock,
};
pub use self::pkcs12::{pkcs12_decode, Pkcs12Bundle};

#[derive(Debug, Error)]
pub enum KeyMaterialError {
    #[error("Malformed PEM input: {0}")]
    MalformedPem(String),

    #[error("Unsupported key: {0}")]
    UnsupportedKey(String),

    #[error("Wrong password for protected key material")]
    WrongPassword,

    #[error("Unsupported elliptic curve: {0}")]
    UnsupportedCurve(String),

    #[error("Invalid symmetric key length: {bits} bits (expected 128, 192 or 256)")]
    InvalidKeyLength { bits: usize },

    #[error("Malformed PKCS#12 bundle: {0}")]
    MalformedPkcs12(String),
}

/// A decoded private key
pub enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

impl PrivateKey {
    /// Short algorithm name, safe to log
    pub fn algorithm(&self) -> &'static str {
        match self {
            PrivateKey::Rsa(_) => "RSA",
            PrivateKey::P256(_) => "EC P-256",
            PrivateKey::P384(_) => "EC P-384",
            PrivateKey::P521(_) => "EC P-521",
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.algorithm())
    }
}

/// Decode a PKCS#8 `PrivateKeyInfo`, trying RSA and then each supported curve
pub(crate) fn private_key_from_pkcs8_der(der: &[u8]) -> Result<PrivateKey, KeyMaterialError> {
    use pkcs8::DecodePrivateKey;

    if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::Rsa(key));
    }
    if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::P256(key));
    }
    if let Ok(key) = p384::SecretKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::P384(key));
    }
    if let Ok(key) = p521::SecretKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::P521(key));
    }
    Err(KeyMaterialError::UnsupportedKey(
        "PKCS#8 key is neither RSA nor EC on P-256/P-384/P-521".to_string(),
    ))
}
