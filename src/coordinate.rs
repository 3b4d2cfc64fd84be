//! Key Vault object coordinates
//!
//! Objects are addressed by URL:
//!
//! - Versioned: `https://<vault>.<dns-suffix>/<keys|secrets|certificates>/<name>/<version>`
//! - Versionless: `https://<vault>.<dns-suffix>/<keys|secrets|certificates>/<name>`
//!
//! Placement constraints compare the canonical label
//! `az-c-keyvault://<vault>@<type>=<name>` verbatim; [`placement_label`] is
//! the only function that renders it.
//!
//! # Example
//!
//! ```
//! use az_confidential::coordinate::{AzKeyVaultObjectVersionedCoordinate, ObjectType};
//!
//! let id = AzKeyVaultObjectVersionedCoordinate::parse(
//!     "https://myvault.vault.azure.net/secrets/db-password/0123456789abcdef",
//! )?;
//! assert_eq!(id.coordinate.vault_name, "myvault");
//! assert_eq!(id.coordinate.object_type, ObjectType::Secrets);
//! assert_eq!(id.coordinate.canonical_label(), "az-c-keyvault://myvault@secrets=db-password");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const DEFAULT_DNS_SUFFIX: &str = "vault.azure.net";
pub const DEFAULT_WRAPPING_ALGORITHM: &str = "RSA-OAEP-256";
pub const PLACEMENT_LABEL_SCHEME: &str = "az-c-keyvault";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("Malformed object id '{id}': {reason}")]
    MalformedId { id: String, reason: String },
}

impl CoordinateError {
    fn malformed(id: &str, reason: impl Into<String>) -> Self {
        CoordinateError::MalformedId {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns a hint for how to fix this error
    pub fn hint(&self) -> &'static str {
        "Object ids look like https://<vault>.vault.azure.net/<keys|secrets|certificates>/<name>[/<version>]"
    }

    /// Returns a stable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            CoordinateError::MalformedId { .. } => "AZC_E_COORDINATE_MALFORMED",
        }
    }
}

/// Key Vault object collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Keys,
    Secrets,
    Certificates,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Keys => "keys",
            ObjectType::Secrets => "secrets",
            ObjectType::Certificates => "certificates",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keys" => Ok(ObjectType::Keys),
            "secrets" => Ok(ObjectType::Secrets),
            "certificates" => Ok(ObjectType::Certificates),
            other => Err(CoordinateError::malformed(
                other,
                "object type must be keys, secrets or certificates",
            )),
        }
    }
}

/// Render the canonical placement label
pub fn placement_label(vault_name: &str, object_type: ObjectType, name: &str) -> String {
    format!(
        "{}://{}@{}={}",
        PLACEMENT_LABEL_SCHEME, vault_name, object_type, name
    )
}

/// Versionless identity of a Key Vault object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AzKeyVaultObjectCoordinate {
    pub vault_name: String,
    pub object_type: ObjectType,
    pub name: String,
}

impl AzKeyVaultObjectCoordinate {
    pub fn new(vault_name: impl Into<String>, object_type: ObjectType, name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            object_type,
            name: name.into(),
        }
    }

    pub fn canonical_label(&self) -> String {
        placement_label(&self.vault_name, self.object_type, &self.name)
    }

    /// `https://<vault>.<dns-suffix>/<type>/<name>`
    pub fn versionless_id(&self, dns_suffix: &str) -> String {
        format!(
            "https://{}.{}/{}/{}",
            self.vault_name, dns_suffix, self.object_type, self.name
        )
    }

    pub fn with_version(&self, version: impl Into<String>) -> AzKeyVaultObjectVersionedCoordinate {
        AzKeyVaultObjectVersionedCoordinate {
            coordinate: self.clone(),
            version: version.into(),
        }
    }
}

impl fmt::Display for AzKeyVaultObjectCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_label())
    }
}

/// A coordinate pinned to one object version; `version` is empty for the
/// versionless form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AzKeyVaultObjectVersionedCoordinate {
    pub coordinate: AzKeyVaultObjectCoordinate,
    pub version: String,
}

impl AzKeyVaultObjectVersionedCoordinate {
    /// Parse an object URL, with or without the version segment
    pub fn parse(id: &str) -> Result<Self, CoordinateError> {
        let url = Url::parse(id).map_err(|e| CoordinateError::malformed(id, e.to_string()))?;
        if url.scheme() != "https" {
            return Err(CoordinateError::malformed(id, "scheme must be https"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(CoordinateError::malformed(
                id,
                "query and fragment are not allowed",
            ));
        }

        let host = url
            .host_str()
            .ok_or_else(|| CoordinateError::malformed(id, "missing host"))?;
        let vault_name = host.split('.').next().unwrap_or_default();
        if !is_valid_name(vault_name) {
            return Err(CoordinateError::malformed(id, "invalid vault name"));
        }

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();
        if segments.last() == Some(&"") {
            segments.pop();
        }

        let (object_type, name, version) = match segments.as_slice() {
            [object_type, name] => (*object_type, *name, ""),
            [object_type, name, version] => (*object_type, *name, *version),
            _ => {
                return Err(CoordinateError::malformed(
                    id,
                    "path must be /<type>/<name>[/<version>]",
                ))
            }
        };
        let object_type = object_type
            .parse::<ObjectType>()
            .map_err(|_| CoordinateError::malformed(id, "unknown object type"))?;
        if !is_valid_name(name) {
            return Err(CoordinateError::malformed(id, "invalid object name"));
        }
        if !version.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoordinateError::malformed(id, "invalid object version"));
        }

        Ok(Self {
            coordinate: AzKeyVaultObjectCoordinate::new(vault_name, object_type, name),
            version: version.to_string(),
        })
    }

    pub fn is_versionless(&self) -> bool {
        self.version.is_empty()
    }

    pub fn versionless(&self) -> &AzKeyVaultObjectCoordinate {
        &self.coordinate
    }

    /// Full object URL; falls back to the versionless URL when unversioned
    pub fn id(&self, dns_suffix: &str) -> String {
        let base = self.coordinate.versionless_id(dns_suffix);
        if self.is_versionless() {
            base
        } else {
            format!("{}/{}", base, self.version)
        }
    }
}

impl FromStr for AzKeyVaultObjectVersionedCoordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Key Vault key used to unwrap envelopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrappingKeyCoordinate {
    pub vault_name: String,
    pub key_name: String,
    pub key_version: String,
    pub algorithm: String,
}

impl Default for WrappingKeyCoordinate {
    fn default() -> Self {
        Self {
            vault_name: String::new(),
            key_name: String::new(),
            key_version: String::new(),
            algorithm: DEFAULT_WRAPPING_ALGORITHM.to_string(),
        }
    }
}

impl WrappingKeyCoordinate {
    pub fn new(vault_name: impl Into<String>, key_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            key_name: key_name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn version(mut self, key_version: impl Into<String>) -> Self {
        self.key_version = key_version.into();
        self
    }

    /// Parse a key URL (`https://<vault>.<suffix>/keys/<name>[/<version>]`)
    pub fn from_key_id(id: &str) -> Result<Self, CoordinateError> {
        let parsed = AzKeyVaultObjectVersionedCoordinate::parse(id)?;
        if parsed.coordinate.object_type != ObjectType::Keys {
            return Err(CoordinateError::malformed(id, "wrapping key must be a key"));
        }
        Ok(Self::new(parsed.coordinate.vault_name, parsed.coordinate.name).version(parsed.version))
    }

    /// True when neither vault nor key name is set
    pub fn is_empty(&self) -> bool {
        self.vault_name.is_empty() && self.key_name.is_empty()
    }

    /// Fill empty fields from a provider-level default
    pub fn merge(&self, default: &WrappingKeyCoordinate) -> WrappingKeyCoordinate {
        fn pick(own: &str, fallback: &str) -> String {
            let value = if own.is_empty() { fallback } else { own };
            value.to_string()
        }

        WrappingKeyCoordinate {
            vault_name: pick(&self.vault_name, &default.vault_name),
            key_name: pick(&self.key_name, &default.key_name),
            key_version: pick(&self.key_version, &default.key_version),
            algorithm: pick(
                &self.algorithm,
                if default.algorithm.is_empty() {
                    DEFAULT_WRAPPING_ALGORITHM
                } else {
                    &default.algorithm
                },
            ),
        }
    }
}

impl fmt::Display for WrappingKeyCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vault_name, self.key_name)?;
        if !self.key_version.is_empty() {
            write!(f, "/{}", self.key_version)?;
        }
        write!(f, " ({})", self.algorithm)
    }
}

fn is_valid_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
