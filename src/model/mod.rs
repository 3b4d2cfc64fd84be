//! Versioned confidential-data model
//!
//! Every envelope carries a gzipped JSON object
//! `{"header": <header>, "confidentialData": <payload>}`. The header names
//! the object type the payload is meant for and the model reference that
//! fixes the payload's shape.

pub mod header;
pub mod helper;
pub mod inspect;
pub mod params;
pub mod payload;

pub use header::{ConfidentialDataHeader, ConfidentialObjectType};
pub use helper::{ConfidentialDataHelper, ExportedEnvelope};
pub use inspect::{decode_payload, inspect_envelope, ConfidentialPayload, InspectedEnvelope};
pub use params::ContentWrappingParams;
pub use payload::{
    CertificateBag, CertificateFormat, ConfidentialValue, NamedValue, SubscriptionKeys,
    MODEL_APIM_NAMED_VALUE, MODEL_APIM_SUBSCRIPTION, MODEL_BINARY, MODEL_CERTIFICATE,
    MODEL_STRING,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Malformed confidential data JSON: {0}")]
    MalformedJson(String),

    #[error("Object type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Unknown object type '{0}'")]
    UnknownObjectType(String),

    #[error("Unknown model reference: expected {expected}, found {found}")]
    UnknownModel { expected: String, found: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl ModelError {
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ModelError::TypeMismatch { .. } => {
                Some("The ciphertext was produced for a different kind of object; re-encrypt it for this resource")
            }
            ModelError::UnknownModel { .. } | ModelError::UnknownObjectType(_) => {
                Some("The ciphertext was produced by an incompatible version; re-encrypt it")
            }
            ModelError::MalformedJson(_) | ModelError::InvalidPayload(_) => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ModelError::MalformedJson(_) => "AZC_E_MODEL_JSON",
            ModelError::TypeMismatch { .. } => "AZC_E_MODEL_TYPE_MISMATCH",
            ModelError::UnknownObjectType(_) => "AZC_E_MODEL_OBJECT_TYPE",
            ModelError::UnknownModel { .. } => "AZC_E_MODEL_UNKNOWN",
            ModelError::InvalidPayload(_) => "AZC_E_MODEL_PAYLOAD",
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::MalformedJson(err.to_string())
    }
}
