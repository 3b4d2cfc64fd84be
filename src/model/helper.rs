//! Export and import of typed confidential data

use super::header::{ConfidentialDataHeader, ConfidentialObjectType};
use super::params::ContentWrappingParams;
use super::payload::ConfidentialValue;
use super::ModelError;
use crate::envelope::{decrypt_envelope, encrypt_envelope};
use crate::ports::RsaDecrypter;
use crate::ConfidentialError;
use chrono::{DateTime, Utc};
use confidential_crypto::{gzip_compress, gzip_decompress};
use confidential_protocol::{armor_envelope, Envelope};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;
use uuid::Uuid;

#[derive(Serialize)]
struct ConfidentialDataOut<'a, R> {
    header: &'a ConfidentialDataHeader,
    #[serde(rename = "confidentialData")]
    confidential_data: R,
}

#[derive(Deserialize)]
pub(crate) struct ConfidentialDataIn {
    pub header: ConfidentialDataHeader,
    #[serde(rename = "confidentialData")]
    pub confidential_data: serde_json::Value,
}

/// Result of an export
#[derive(Debug, Clone)]
pub struct ExportedEnvelope {
    pub header: ConfidentialDataHeader,
    pub envelope: Envelope,
    pub armored: String,
}

/// Binds a value type to the object type it is produced for
#[derive(Debug, Clone)]
pub struct ConfidentialDataHelper<T> {
    object_type: ConfidentialObjectType,
    _value: PhantomData<fn() -> T>,
}

impl<T: ConfidentialValue> ConfidentialDataHelper<T> {
    pub fn new(object_type: ConfidentialObjectType) -> Self {
        Self {
            object_type,
            _value: PhantomData,
        }
    }

    pub fn object_type(&self) -> ConfidentialObjectType {
        self.object_type
    }

    pub fn model_reference(&self) -> &'static str {
        T::MODEL
    }

    pub fn export(
        &self,
        value: &T,
        params: &ContentWrappingParams,
    ) -> Result<ExportedEnvelope, ConfidentialError> {
        self.export_at(value, params, Utc::now())
    }

    /// Export with protection limits computed from `now`
    pub fn export_at(
        &self,
        value: &T,
        params: &ContentWrappingParams,
        now: DateTime<Utc>,
    ) -> Result<ExportedEnvelope, ConfidentialError> {
        let header = ConfidentialDataHeader {
            uuid: Uuid::new_v4().to_string(),
            object_type: self.object_type.as_str().to_string(),
            model_reference: T::MODEL.to_string(),
            protection: params.protection_at(now),
        };

        let json = serde_json::to_vec(&ConfidentialDataOut {
            header: &header,
            confidential_data: value.to_rest(),
        })
        .map_err(ModelError::from)?;
        let compressed = gzip_compress(&json)?;
        let envelope = encrypt_envelope(params.public_key(), &compressed)?;
        let armored = armor_envelope(&envelope, &header.armor_headers())?;

        debug!(
            uuid = %header.uuid,
            object_type = %header.object_type,
            has_cek = envelope.has_cek(),
            "exported confidential data"
        );
        Ok(ExportedEnvelope {
            header,
            envelope,
            armored,
        })
    }

    /// Decrypt an envelope and decode it as this helper's type
    pub async fn import(
        &self,
        envelope: &Envelope,
        decrypter: &dyn RsaDecrypter,
    ) -> Result<(ConfidentialDataHeader, T), ConfidentialError> {
        let compressed = decrypt_envelope(envelope, decrypter).await?;
        let json = gzip_decompress(&compressed)?;
        Ok(self.decode(&json)?)
    }

    /// Decode decompressed JSON; the type tag is checked before the model
    pub fn decode(&self, json: &[u8]) -> Result<(ConfidentialDataHeader, T), ModelError> {
        let raw: ConfidentialDataIn = serde_json::from_slice(json)?;
        let header = raw.header;

        if !header.is_type(self.object_type) {
            return Err(ModelError::TypeMismatch {
                expected: self.object_type.to_string(),
                found: header.object_type,
            });
        }
        if header.model_reference != T::MODEL {
            return Err(ModelError::UnknownModel {
                expected: T::MODEL.to_string(),
                found: header.model_reference,
            });
        }

        let rest: T::Rest = serde_json::from_value(raw.confidential_data)?;
        let value = T::from_rest(rest)?;
        debug!(uuid = %header.uuid, object_type = %header.object_type, "decoded confidential data");
        Ok((header, value))
    }
}
