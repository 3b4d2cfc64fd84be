//! Untyped decoding for producer-side diagnostics

use super::header::{ConfidentialDataHeader, ConfidentialObjectType};
use super::helper::ConfidentialDataIn;
use super::payload::{CertificateBag, ConfidentialValue, NamedValue, SubscriptionKeys};
use super::ModelError;
use crate::envelope::decrypt_envelope;
use crate::ports::RsaDecrypter;
use crate::ConfidentialError;
use confidential_crypto::gzip_decompress;
use confidential_protocol::Envelope;
use serde_json::Value;

/// Any registered payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfidentialPayload {
    String(String),
    Binary(Vec<u8>),
    Certificate(CertificateBag),
    Subscription(SubscriptionKeys),
    NamedValue(NamedValue),
}

impl ConfidentialPayload {
    pub fn model_reference(&self) -> &'static str {
        match self {
            ConfidentialPayload::String(_) => String::MODEL,
            ConfidentialPayload::Binary(_) => <Vec<u8>>::MODEL,
            ConfidentialPayload::Certificate(_) => CertificateBag::MODEL,
            ConfidentialPayload::Subscription(_) => SubscriptionKeys::MODEL,
            ConfidentialPayload::NamedValue(_) => NamedValue::MODEL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InspectedEnvelope {
    pub header: ConfidentialDataHeader,
    pub payload: ConfidentialPayload,
}

/// Model each object type is produced with
fn model_for(object_type: ConfidentialObjectType) -> &'static str {
    match object_type {
        ConfidentialObjectType::KeyVaultSecret => String::MODEL,
        ConfidentialObjectType::KeyVaultKey => <Vec<u8>>::MODEL,
        ConfidentialObjectType::KeyVaultCertificate => CertificateBag::MODEL,
        ConfidentialObjectType::ApimSubscription => SubscriptionKeys::MODEL,
        ConfidentialObjectType::ApimNamedValue => NamedValue::MODEL,
    }
}

fn typed<T: ConfidentialValue>(value: Value) -> Result<T, ModelError> {
    T::from_rest(serde_json::from_value(value)?)
}

/// Decode decompressed JSON by dispatching on the type tag, then the model
pub fn decode_payload(json: &[u8]) -> Result<InspectedEnvelope, ModelError> {
    let raw: ConfidentialDataIn = serde_json::from_slice(json)?;
    let object_type = raw.header.parsed_object_type()?;

    let expected = model_for(object_type);
    if raw.header.model_reference != expected {
        return Err(ModelError::UnknownModel {
            expected: expected.to_string(),
            found: raw.header.model_reference,
        });
    }

    let data = raw.confidential_data;
    let payload = match object_type {
        ConfidentialObjectType::KeyVaultSecret => ConfidentialPayload::String(typed(data)?),
        ConfidentialObjectType::KeyVaultKey => ConfidentialPayload::Binary(typed(data)?),
        ConfidentialObjectType::KeyVaultCertificate => {
            ConfidentialPayload::Certificate(typed(data)?)
        }
        ConfidentialObjectType::ApimSubscription => {
            ConfidentialPayload::Subscription(typed(data)?)
        }
        ConfidentialObjectType::ApimNamedValue => ConfidentialPayload::NamedValue(typed(data)?),
    };

    Ok(InspectedEnvelope {
        header: raw.header,
        payload,
    })
}

/// Decrypt and decode an envelope of any registered type
pub async fn inspect_envelope(
    envelope: &Envelope,
    decrypter: &dyn RsaDecrypter,
) -> Result<InspectedEnvelope, ConfidentialError> {
    let compressed = decrypt_envelope(envelope, decrypter).await?;
    let json = gzip_decompress(&compressed)?;
    Ok(decode_payload(&json)?)
}
