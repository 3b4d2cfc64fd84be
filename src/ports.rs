//! Ports to the outside world
//!
//! The engine reaches the wrapping key, the remote object store and the
//! operator's input only through these traits. Adapters classify their
//! failures at the boundary; nothing downstream inspects error messages.

use crate::coordinate::{AzKeyVaultObjectCoordinate, AzKeyVaultObjectVersionedCoordinate};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use confidential_crypto::rsa::RsaPrivateKey;
use confidential_crypto::{private_key_from_pem, rsa_oaep_decrypt, AzureJwk, KeyMaterialError, PrivateKey};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Error)]
pub enum DecrypterError {
    #[error("RSA decryption failed: {0}")]
    Decryption(String),

    #[error("Decrypter unavailable: {0}")]
    Unavailable(String),
}

/// Unwraps RSA-OAEP-SHA256 ciphertext
///
/// Implementations may hold the private key in process or call out to a
/// remote HSM; the engine only ever sees the plaintext.
#[async_trait]
pub trait RsaDecrypter: Send + Sync {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DecrypterError>;
}

#[async_trait]
impl<F> RsaDecrypter for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>, DecrypterError> + Send + Sync,
{
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DecrypterError> {
        self(ciphertext)
    }
}

/// In-process decrypter over an RSA private key
pub struct RsaPrivateKeyDecrypter {
    key: RsaPrivateKey,
}

impl RsaPrivateKeyDecrypter {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }

    /// Load from PEM; the key must be RSA
    pub fn from_pem(pem: &[u8], password: Option<&str>) -> Result<Self, KeyMaterialError> {
        match private_key_from_pem(pem, password)? {
            PrivateKey::Rsa(key) => Ok(Self::new(key)),
            other => Err(KeyMaterialError::UnsupportedKey(format!(
                "wrapping key must be RSA, found {}",
                other.algorithm()
            ))),
        }
    }
}

impl fmt::Debug for RsaPrivateKeyDecrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RsaPrivateKeyDecrypter")
    }
}

#[async_trait]
impl RsaDecrypter for RsaPrivateKeyDecrypter {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DecrypterError> {
        rsa_oaep_decrypt(&self.key, ciphertext).map_err(|e| DecrypterError::Decryption(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Remote object already exists: {0}")]
    Conflict(String),

    #[error("Access to remote object denied: {0}")]
    Forbidden(String),

    #[error("Remote service unavailable: {0}")]
    Unavailable(String),

    #[error("Remote request failed: {0}")]
    Request(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

/// Object attributes managed alongside the content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub enabled: bool,
    pub not_before: Option<i64>,
    pub expires: Option<i64>,
    pub content_type: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl Default for ObjectAttributes {
    fn default() -> Self {
        Self {
            enabled: true,
            not_before: None,
            expires: None,
            content_type: None,
            tags: BTreeMap::new(),
        }
    }
}

/// Object content as stored by Key Vault
#[derive(Clone, PartialEq, Eq)]
pub enum ObjectContent {
    Secret { value: String },
    Key { jwk: AzureJwk },
    Certificate { data: Vec<u8>, content_type: String, password: String },
}

impl fmt::Debug for ObjectContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectContent::Secret { .. } => f.write_str("Secret([REDACTED])"),
            ObjectContent::Key { jwk } => write!(f, "Key({})", jwk.kty),
            ObjectContent::Certificate { content_type, .. } => {
                write!(f, "Certificate({})", content_type)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub id: AzKeyVaultObjectVersionedCoordinate,
    pub content: ObjectContent,
    pub attributes: ObjectAttributes,
}

/// Key Vault data-plane client for one vault
#[async_trait]
pub trait KeyVaultObjectClient: Send + Sync {
    /// Create (or add a version to) an object
    async fn create_object(
        &self,
        coordinate: &AzKeyVaultObjectCoordinate,
        content: ObjectContent,
        attributes: ObjectAttributes,
    ) -> Result<RemoteObject, RemoteError>;

    /// Fetch one version; an empty version means the latest
    async fn get_object(
        &self,
        id: &AzKeyVaultObjectVersionedCoordinate,
    ) -> Result<RemoteObject, RemoteError>;

    async fn update_attributes(
        &self,
        id: &AzKeyVaultObjectVersionedCoordinate,
        attributes: ObjectAttributes,
    ) -> Result<RemoteObject, RemoteError>;

    /// Store new content as a new version
    async fn update_content(
        &self,
        coordinate: &AzKeyVaultObjectCoordinate,
        content: ObjectContent,
        attributes: ObjectAttributes,
    ) -> Result<RemoteObject, RemoteError>;

    /// Soft delete: the object stays but is disabled
    async fn disable_object(&self, id: &AzKeyVaultObjectVersionedCoordinate)
        -> Result<(), RemoteError>;
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input is not valid base64: {0}")]
    Base64(String),

    #[error("Input is empty")]
    Empty,
}

/// Producer-side source of plaintext
#[async_trait]
pub trait InputReader: Send + Sync {
    async fn read_input(
        &self,
        prompt: &str,
        file: Option<&Path>,
        base64_decode: bool,
        multiline: bool,
    ) -> Result<Vec<u8>, InputError>;
}

/// Reads from a file when given, otherwise prompts on stderr and reads stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct StdInputReader;

#[async_trait]
impl InputReader for StdInputReader {
    async fn read_input(
        &self,
        prompt: &str,
        file: Option<&Path>,
        base64_decode: bool,
        multiline: bool,
    ) -> Result<Vec<u8>, InputError> {
        let raw = match file {
            Some(path) => tokio::fs::read(path).await?,
            None => {
                let mut stderr = tokio::io::stderr();
                stderr.write_all(prompt.as_bytes()).await?;
                if multiline {
                    stderr.write_all(b" (end with EOF)").await?;
                }
                stderr.write_all(b"\n").await?;
                stderr.flush().await?;

                let mut reader = BufReader::new(tokio::io::stdin());
                let mut buf = Vec::new();
                if multiline {
                    reader.read_to_end(&mut buf).await?;
                } else {
                    reader.read_until(b'\n', &mut buf).await?;
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                }
                buf
            }
        };

        decode_input(raw, base64_decode)
    }
}

/// Apply the base64 option and reject empty input
pub fn decode_input(raw: Vec<u8>, base64_decode: bool) -> Result<Vec<u8>, InputError> {
    let data = if base64_decode {
        let compact: Vec<u8> = raw
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(&compact)
            .map_err(|e| InputError::Base64(e.to_string()))?
    } else {
        raw
    };

    if data.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_closure_decrypter() {
        let decrypter = |ciphertext: &[u8]| -> Result<Vec<u8>, DecrypterError> {
            Ok(ciphertext.iter().rev().copied().collect())
        };
        let out = RsaDecrypter::decrypt(&decrypter, &[1, 2, 3]).await.unwrap();
        assert_eq!(out, vec![3, 2, 1]);

        let failing = |_: &[u8]| -> Result<Vec<u8>, DecrypterError> {
            Err(DecrypterError::Unavailable("hsm offline".to_string()))
        };
        let dynamic: &dyn RsaDecrypter = &failing;
        assert!(dynamic.decrypt(&[0]).await.is_err());
    }

    #[test]
    fn test_decrypter_requires_rsa() {
        let ec = include_bytes!("../tests/data/ec_p256_sec1.pem");
        assert!(matches!(
            RsaPrivateKeyDecrypter::from_pem(ec, None),
            Err(KeyMaterialError::UnsupportedKey(_))
        ));

        let rsa = include_bytes!("../tests/data/rsa2048_pkcs1.pem");
        assert!(RsaPrivateKeyDecrypter::from_pem(rsa, None).is_ok());
    }

    #[test]
    fn test_secret_content_is_redacted() {
        let content = ObjectContent::Secret {
            value: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", content).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_read_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"aGVs\nbG8=\n").unwrap();

        let reader = StdInputReader;
        let decoded = reader
            .read_input("secret", Some(file.path()), true, true)
            .await
            .unwrap();
        assert_eq!(decoded, b"hello");

        let raw = reader
            .read_input("secret", Some(file.path()), false, true)
            .await
            .unwrap();
        assert_eq!(raw, b"aGVs\nbG8=\n");
    }

    #[tokio::test]
    async fn test_read_input_errors() {
        let empty = tempfile::NamedTempFile::new().unwrap();
        let reader = StdInputReader;
        assert!(matches!(
            reader.read_input("x", Some(empty.path()), false, false).await,
            Err(InputError::Empty)
        ));
        assert!(matches!(
            decode_input(b"!!!".to_vec(), true),
            Err(InputError::Base64(_))
        ));
        assert!(matches!(
            reader
                .read_input("x", Some(Path::new("/nonexistent/input")), false, false)
                .await,
            Err(InputError::Io(_))
        ));
    }
}
