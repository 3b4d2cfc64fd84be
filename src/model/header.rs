use super::ModelError;
use crate::policy::SecondaryProtectionParameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target object type an envelope is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidentialObjectType {
    #[serde(rename = "kv/secret")]
    KeyVaultSecret,
    #[serde(rename = "kv/key")]
    KeyVaultKey,
    #[serde(rename = "kv/certificate")]
    KeyVaultCertificate,
    #[serde(rename = "apim/subscription")]
    ApimSubscription,
    #[serde(rename = "apim/namedValue")]
    ApimNamedValue,
}

impl ConfidentialObjectType {
    pub const ALL: [ConfidentialObjectType; 5] = [
        ConfidentialObjectType::KeyVaultSecret,
        ConfidentialObjectType::KeyVaultKey,
        ConfidentialObjectType::KeyVaultCertificate,
        ConfidentialObjectType::ApimSubscription,
        ConfidentialObjectType::ApimNamedValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidentialObjectType::KeyVaultSecret => "kv/secret",
            ConfidentialObjectType::KeyVaultKey => "kv/key",
            ConfidentialObjectType::KeyVaultCertificate => "kv/certificate",
            ConfidentialObjectType::ApimSubscription => "apim/subscription",
            ConfidentialObjectType::ApimNamedValue => "apim/namedValue",
        }
    }
}

impl fmt::Display for ConfidentialObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidentialObjectType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ModelError::UnknownObjectType(s.to_string()))
    }
}

/// Authenticated header of a confidential-data object
///
/// The type tag is kept as a plain string so that an envelope produced for
/// an unknown type still decodes far enough to report a mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialDataHeader {
    #[serde(rename = "u")]
    pub uuid: String,
    #[serde(rename = "t")]
    pub object_type: String,
    #[serde(rename = "m")]
    pub model_reference: String,
    #[serde(flatten)]
    pub protection: SecondaryProtectionParameters,
}

impl ConfidentialDataHeader {
    pub fn parsed_object_type(&self) -> Result<ConfidentialObjectType, ModelError> {
        self.object_type.parse()
    }

    pub fn is_type(&self, expected: ConfidentialObjectType) -> bool {
        self.object_type == expected.as_str()
    }

    /// Armor header lines describing this object
    pub fn armor_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Type".to_string(), self.object_type.clone()),
            ("ModelReference".to_string(), self.model_reference.clone()),
        ];
        headers.extend(self.protection.armor_headers());
        headers
    }
}
