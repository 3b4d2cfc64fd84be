//! Unified error type for the confidential-envelope API
//!
//! Internal modules maintain their domain-specific errors for precise handling.
//! This unified type provides one surface for producers and for the lifecycle
//! engine, which turns it into diagnostics.
//!
//! # Example
//!
//! ```no_run
//! use az_confidential::ConfidentialError;
//!
//! fn produce() -> Result<(), ConfidentialError> {
//!     // Envelope, model and coordinate errors convert automatically
//!     Ok(())
//! }
//! ```

use crate::config::ConfigError;
use crate::coordinate::CoordinateError;
use crate::model::ModelError;
use crate::ports::{DecrypterError, InputError, RemoteError};
use crate::tracking::TrackingError;
use confidential_crypto::{CryptoError, KeyError, KeyMaterialError};
use confidential_protocol::EnvelopeError;
use thiserror::Error;

/// Unified error type for all confidential-envelope operations
///
/// # Error Categories
///
/// - **Envelope**: armor and binary format errors
/// - **Crypto**: RSA, AES-GCM, compression and randomness errors
/// - **KeyMaterial**: PEM, PKCS#12, JWK and symmetric key errors
/// - **Model**: JSON, type tag and model reference errors
/// - **Remote**: Key Vault client errors
#[derive(Debug, Error)]
pub enum ConfidentialError {
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Key material error: {0}")]
    KeyMaterial(#[from] KeyMaterialError),

    #[error("Decrypter error: {0}")]
    Decrypter(#[from] DecrypterError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Coordinate error: {0}")]
    Coordinate(#[from] CoordinateError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

impl ConfidentialError {
    /// Returns true if the error is potentially retryable
    ///
    /// Remote and tracking-store outages may clear after a delay; everything
    /// else depends on the input.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_retryable(),
            Self::Tracking(e) => e.is_retryable(),
            Self::Decrypter(DecrypterError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Envelope(EnvelopeError::MalformedArmor(_)) => {
                Some("Paste the complete armored envelope, including the BEGIN/END lines")
            }
            Self::Envelope(EnvelopeError::UnknownEnvelopeVersion(_)) => {
                Some("Re-encrypt the material with a current producer")
            }
            Self::Crypto(CryptoError::AuthenticationFailed) => {
                Some("The ciphertext was modified or belongs to another key; re-encrypt it")
            }
            Self::Crypto(CryptoError::RsaDecrypt(_)) | Self::Decrypter(_) => {
                Some("Check that the wrapping key matches the key used to encrypt")
            }
            Self::KeyMaterial(KeyMaterialError::WrongPassword) => {
                Some("Supply the password the key material was protected with")
            }
            Self::Model(e) => e.suggestion(),
            Self::Coordinate(e) => Some(e.hint()),
            Self::Config(e) => e.suggestion(),
            Self::Remote(RemoteError::NotFound(_)) => {
                Some("The object was removed outside of this tool")
            }
            _ => None,
        }
    }

    /// Returns a stable error code
    ///
    /// Codes follow the format `AZC_E_<CATEGORY>_<SPECIFIC>`.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Envelope(EnvelopeError::MalformedArmor(_)) => "AZC_E_ENVELOPE_ARMOR",
            Self::Envelope(EnvelopeError::UnknownEnvelopeVersion(_)) => "AZC_E_ENVELOPE_VERSION",
            Self::Envelope(_) => "AZC_E_ENVELOPE_FORMAT",
            Self::Crypto(CryptoError::AuthenticationFailed) => "AZC_E_CRYPTO_AUTHENTICATION",
            Self::Crypto(CryptoError::Decompression(_)) => "AZC_E_CRYPTO_DECOMPRESSION",
            Self::Crypto(CryptoError::Randomness(_)) => "AZC_E_CRYPTO_RANDOMNESS",
            Self::Crypto(CryptoError::RsaDecrypt(_)) => "AZC_E_CRYPTO_DECRYPTION",
            Self::Crypto(_) => "AZC_E_CRYPTO",
            Self::Key(KeyError::InvalidLength { .. }) => "AZC_E_KEY_LENGTH",
            Self::KeyMaterial(KeyMaterialError::MalformedPem(_)) => "AZC_E_KEY_PEM",
            Self::KeyMaterial(KeyMaterialError::WrongPassword) => "AZC_E_KEY_PASSWORD",
            Self::KeyMaterial(KeyMaterialError::UnsupportedCurve(_)) => "AZC_E_KEY_CURVE",
            Self::KeyMaterial(KeyMaterialError::MalformedPkcs12(_)) => "AZC_E_KEY_PKCS12",
            Self::KeyMaterial(KeyMaterialError::InvalidKeyLength { .. }) => "AZC_E_KEY_LENGTH",
            Self::KeyMaterial(_) => "AZC_E_KEY_UNSUPPORTED",
            Self::Decrypter(_) => "AZC_E_CRYPTO_DECRYPTION",
            Self::Model(e) => e.error_code(),
            Self::Coordinate(e) => e.error_code(),
            Self::Remote(RemoteError::NotFound(_)) => "AZC_E_REMOTE_NOT_FOUND",
            Self::Remote(_) => "AZC_E_REMOTE",
            Self::Tracking(_) => "AZC_E_TRACKING",
            Self::Config(e) => e.error_code(),
            Self::Input(_) => "AZC_E_INPUT",
        }
    }

    /// Returns true if this is an envelope or cryptographic error
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::Envelope(_) | Self::Crypto(_) | Self::Key(_) | Self::Decrypter(_)
        )
    }

    /// Returns true if the remote object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote(RemoteError::NotFound(_)))
    }
}
