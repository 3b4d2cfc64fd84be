//! Payload shapes for each registered model reference

use super::ModelError;
use confidential_crypto::{pkcs12_decode, private_key_from_pem, KeyMaterialError, PrivateKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::fmt;

pub const MODEL_STRING: &str = "core/string/v01";
pub const MODEL_BINARY: &str = "core/binary/v01";
pub const MODEL_CERTIFICATE: &str = "core/certificate/v01";
pub const MODEL_APIM_SUBSCRIPTION: &str = "apim/subscription/v01";
pub const MODEL_APIM_NAMED_VALUE: &str = "apim/namedValue/v01";

/// A value that can travel inside an envelope
///
/// `Rest` is the on-wire JSON shape; `MODEL` pins it to a model reference.
pub trait ConfidentialValue: Sized {
    type Rest: Serialize + DeserializeOwned;
    const MODEL: &'static str;

    fn to_rest(&self) -> Self::Rest;
    fn from_rest(rest: Self::Rest) -> Result<Self, ModelError>;
}

#[derive(Serialize, Deserialize)]
pub struct StringRest {
    #[serde(rename = "s")]
    pub value: String,
}

impl ConfidentialValue for String {
    type Rest = StringRest;
    const MODEL: &'static str = MODEL_STRING;

    fn to_rest(&self) -> StringRest {
        StringRest {
            value: self.clone(),
        }
    }

    fn from_rest(rest: StringRest) -> Result<Self, ModelError> {
        Ok(rest.value)
    }
}

#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct BinaryRest {
    #[serde(rename = "b")]
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
}

impl ConfidentialValue for Vec<u8> {
    type Rest = BinaryRest;
    const MODEL: &'static str = MODEL_BINARY;

    fn to_rest(&self) -> BinaryRest {
        BinaryRest { data: self.clone() }
    }

    fn from_rest(rest: BinaryRest) -> Result<Self, ModelError> {
        Ok(rest.data)
    }
}

/// Media type of a certificate bag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateFormat {
    #[serde(rename = "application/x-pem-file")]
    Pem,
    #[serde(rename = "application/x-pkcs12")]
    Pkcs12,
    #[serde(rename = "application/unknown")]
    Unknown,
}

impl CertificateFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            CertificateFormat::Pem => "application/x-pem-file",
            CertificateFormat::Pkcs12 => "application/x-pkcs12",
            CertificateFormat::Unknown => "application/unknown",
        }
    }
}

/// Certificate with its private key, as PEM or PKCS#12
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateBag {
    pub data: Vec<u8>,
    pub format: CertificateFormat,
    /// Password protecting the key material; empty when none
    pub password: String,
}

impl fmt::Debug for CertificateBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBag")
            .field("len", &self.data.len())
            .field("format", &self.format)
            .finish()
    }
}

impl CertificateBag {
    fn password(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(&self.password)
        }
    }

    /// Decode the private key held in the bag
    pub fn private_key(&self) -> Result<PrivateKey, KeyMaterialError> {
        match self.format {
            CertificateFormat::Pem => private_key_from_pem(&self.data, self.password()),
            CertificateFormat::Pkcs12 => Ok(pkcs12_decode(&self.data, &self.password)?.key),
            CertificateFormat::Unknown => private_key_from_pem(&self.data, self.password())
                .or_else(|_| pkcs12_decode(&self.data, &self.password).map(|bundle| bundle.key)),
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct CertificateRest {
    #[serde(rename = "crt")]
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
    #[serde(rename = "crt_f")]
    pub format: CertificateFormat,
    #[serde(rename = "crt_p", default)]
    pub password: String,
}

impl ConfidentialValue for CertificateBag {
    type Rest = CertificateRest;
    const MODEL: &'static str = MODEL_CERTIFICATE;

    fn to_rest(&self) -> CertificateRest {
        CertificateRest {
            data: self.data.clone(),
            format: self.format,
            password: self.password.clone(),
        }
    }

    fn from_rest(rest: CertificateRest) -> Result<Self, ModelError> {
        if rest.data.is_empty() {
            return Err(ModelError::InvalidPayload(
                "certificate data is empty".to_string(),
            ));
        }
        Ok(CertificateBag {
            data: rest.data,
            format: rest.format,
            password: rest.password,
        })
    }
}

/// API Management subscription key pair
#[derive(Clone, PartialEq, Eq)]
pub struct SubscriptionKeys {
    pub primary: String,
    pub secondary: String,
}

impl fmt::Debug for SubscriptionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubscriptionKeys([REDACTED])")
    }
}

#[derive(Serialize, Deserialize)]
pub struct SubscriptionRest {
    #[serde(rename = "pk", default)]
    pub primary: String,
    #[serde(rename = "sk", default)]
    pub secondary: String,
}

impl ConfidentialValue for SubscriptionKeys {
    type Rest = SubscriptionRest;
    const MODEL: &'static str = MODEL_APIM_SUBSCRIPTION;

    fn to_rest(&self) -> SubscriptionRest {
        SubscriptionRest {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
        }
    }

    fn from_rest(rest: SubscriptionRest) -> Result<Self, ModelError> {
        if rest.primary.is_empty() && rest.secondary.is_empty() {
            return Err(ModelError::InvalidPayload(
                "subscription carries neither a primary nor a secondary key".to_string(),
            ));
        }
        Ok(SubscriptionKeys {
            primary: rest.primary,
            secondary: rest.secondary,
        })
    }
}

/// API Management named value
#[derive(Clone, PartialEq, Eq)]
pub struct NamedValue(pub String);

impl fmt::Debug for NamedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NamedValue([REDACTED])")
    }
}

impl ConfidentialValue for NamedValue {
    type Rest = StringRest;
    const MODEL: &'static str = MODEL_APIM_NAMED_VALUE;

    fn to_rest(&self) -> StringRest {
        StringRest {
            value: self.0.clone(),
        }
    }

    fn from_rest(rest: StringRest) -> Result<Self, ModelError> {
        Ok(NamedValue(rest.value))
    }
}
