//! Provider configuration
//!
//! Replaces process-wide flags with one explicit value handed to the clients
//! factory. Loadable from serde (e.g. a provider block) or from environment
//! variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `AZ_CONFIDENTIAL_PROVIDER_LABEL` | `provider_label` |
//! | `AZ_CONFIDENTIAL_CONSTRAINT_MODE` | `constraint_mode` (`strict` or `provider`) |
//! | `AZ_CONFIDENTIAL_TRACKING` | `object_tracking` (`true` or `false`) |
//! | `AZ_CONFIDENTIAL_DEFAULT_VAULT` | `default_destination_vault` |
//! | `AZ_CONFIDENTIAL_WRAPPING_KEY` | `default_wrapping_key` (key URL) |
//! | `AZ_CONFIDENTIAL_DNS_SUFFIX` | `dns_suffix` |

use crate::coordinate::{WrappingKeyCoordinate, DEFAULT_DNS_SUFFIX};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub const ENV_PROVIDER_LABEL: &str = "AZ_CONFIDENTIAL_PROVIDER_LABEL";
pub const ENV_CONSTRAINT_MODE: &str = "AZ_CONFIDENTIAL_CONSTRAINT_MODE";
pub const ENV_TRACKING: &str = "AZ_CONFIDENTIAL_TRACKING";
pub const ENV_DEFAULT_VAULT: &str = "AZ_CONFIDENTIAL_DEFAULT_VAULT";
pub const ENV_WRAPPING_KEY: &str = "AZ_CONFIDENTIAL_WRAPPING_KEY";
pub const ENV_DNS_SUFFIX: &str = "AZ_CONFIDENTIAL_DNS_SUFFIX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("No wrapping key configured and none supplied by the resource")]
    MissingWrappingKey,

    #[error("No destination vault given and no default vault configured")]
    MissingDestinationVault,

    #[error("No Key Vault client configured for vault '{0}'")]
    UnknownVault(String),
}

impl ConfigError {
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ConfigError::InvalidValue { field, .. } if *field == ENV_CONSTRAINT_MODE => {
                Some("Use 'strict' or 'provider'")
            }
            ConfigError::InvalidValue { field, .. } if *field == ENV_TRACKING => {
                Some("Use 'true' or 'false'")
            }
            ConfigError::InvalidValue { .. } => None,
            ConfigError::MissingWrappingKey => Some(
                "Set the wrapping key on the resource or AZ_CONFIDENTIAL_WRAPPING_KEY on the provider",
            ),
            ConfigError::MissingDestinationVault => Some(
                "Set the destination vault on the resource or AZ_CONFIDENTIAL_DEFAULT_VAULT on the provider",
            ),
            ConfigError::UnknownVault(_) => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::InvalidValue { .. } => "AZC_E_CONFIG_INVALID",
            ConfigError::MissingWrappingKey => "AZC_E_CONFIG_WRAPPING_KEY",
            ConfigError::MissingDestinationVault => "AZC_E_CONFIG_DESTINATION",
            ConfigError::UnknownVault(_) => "AZC_E_CONFIG_VAULT",
        }
    }
}

/// How a provider-constraint mismatch is reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintMode {
    /// Mismatch is an error at create/update
    #[default]
    #[serde(rename = "strict")]
    Strict,
    /// Mismatch is a warning
    #[serde(rename = "provider")]
    ProviderLevel,
}

impl FromStr for ConstraintMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ConstraintMode::Strict),
            "provider" => Ok(ConstraintMode::ProviderLevel),
            _ => Err(ConfigError::InvalidValue {
                field: ENV_CONSTRAINT_MODE,
                value: s.to_string(),
                reason: "expected 'strict' or 'provider'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Tag matched against an envelope's provider constraints
    pub provider_label: Option<String>,
    pub constraint_mode: ConstraintMode,
    pub object_tracking: bool,
    pub default_wrapping_key: Option<WrappingKeyCoordinate>,
    pub default_destination_vault: Option<String>,
    pub dns_suffix: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_label: None,
            constraint_mode: ConstraintMode::default(),
            object_tracking: false,
            default_wrapping_key: None,
            default_destination_vault: None,
            dns_suffix: DEFAULT_DNS_SUFFIX.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset or blank variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(label) = get(ENV_PROVIDER_LABEL) {
            config.provider_label = Some(label.trim().to_string());
        }
        if let Some(mode) = get(ENV_CONSTRAINT_MODE) {
            config.constraint_mode = mode.parse()?;
        }
        if let Some(tracking) = get(ENV_TRACKING) {
            config.object_tracking = parse_bool(ENV_TRACKING, &tracking)?;
        }
        if let Some(vault) = get(ENV_DEFAULT_VAULT) {
            config.default_destination_vault = Some(vault.trim().to_string());
        }
        if let Some(key_id) = get(ENV_WRAPPING_KEY) {
            let coordinate = WrappingKeyCoordinate::from_key_id(key_id.trim()).map_err(|e| {
                ConfigError::InvalidValue {
                    field: ENV_WRAPPING_KEY,
                    value: key_id.clone(),
                    reason: e.to_string(),
                }
            })?;
            config.default_wrapping_key = Some(coordinate);
        }
        if let Some(suffix) = get(ENV_DNS_SUFFIX) {
            config.dns_suffix = suffix.trim().trim_start_matches('.').to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dns_suffix.is_empty() || self.dns_suffix.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: ENV_DNS_SUFFIX,
                value: self.dns_suffix.clone(),
                reason: "must be a DNS suffix such as vault.azure.net".to_string(),
            });
        }
        if let Some(vault) = &self.default_destination_vault {
            if vault.is_empty() || !vault.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(ConfigError::InvalidValue {
                    field: ENV_DEFAULT_VAULT,
                    value: vault.clone(),
                    reason: "vault names contain only letters, digits and hyphens".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert_eq!(config.dns_suffix, "vault.azure.net");
        assert_eq!(config.constraint_mode, ConstraintMode::Strict);
        assert!(!config.object_tracking);
    }

    #[test]
    fn test_all_variables() {
        let config = ProviderConfig::from_lookup(lookup(&[
            (ENV_PROVIDER_LABEL, "prod"),
            (ENV_CONSTRAINT_MODE, "provider"),
            (ENV_TRACKING, "true"),
            (ENV_DEFAULT_VAULT, "vaultb"),
            (ENV_WRAPPING_KEY, "https://kv1.vault.azure.net/keys/wrap/v1"),
            (ENV_DNS_SUFFIX, "vault.azure.cn"),
        ]))
        .unwrap();

        assert_eq!(config.provider_label.as_deref(), Some("prod"));
        assert_eq!(config.constraint_mode, ConstraintMode::ProviderLevel);
        assert!(config.object_tracking);
        assert_eq!(config.default_destination_vault.as_deref(), Some("vaultb"));
        let key = config.default_wrapping_key.unwrap();
        assert_eq!(key.key_name, "wrap");
        assert_eq!(key.key_version, "v1");
        assert_eq!(config.dns_suffix, "vault.azure.cn");
    }

    #[test]
    fn test_invalid_values() {
        let err = ProviderConfig::from_lookup(lookup(&[(ENV_CONSTRAINT_MODE, "lenient")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == ENV_CONSTRAINT_MODE));
        assert!(err.suggestion().is_some());

        assert!(ProviderConfig::from_lookup(lookup(&[(ENV_TRACKING, "maybe")])).is_err());
        assert!(ProviderConfig::from_lookup(lookup(&[(
            ENV_WRAPPING_KEY,
            "https://kv1.vault.azure.net/secrets/wrap"
        )]))
        .is_err());
        assert!(ProviderConfig::from_lookup(lookup(&[(ENV_DEFAULT_VAULT, "bad vault")])).is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"constraint_mode":"provider","object_tracking":true}"#)
                .unwrap();
        assert_eq!(config.constraint_mode, ConstraintMode::ProviderLevel);
        assert!(config.object_tracking);
        assert_eq!(config.dns_suffix, DEFAULT_DNS_SUFFIX);
    }
}
