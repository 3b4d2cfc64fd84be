//! Clients factory
//!
//! The lifecycle engine reaches remote vaults, the wrapping key and the
//! tracking store through one [`AzClientsFactory`]. [`DefaultClientsFactory`]
//! composes a [`ProviderConfig`] with pluggable client and decrypter
//! providers.

use crate::config::{ConfigError, ProviderConfig};
use crate::coordinate::{AzKeyVaultObjectCoordinate, WrappingKeyCoordinate};
use crate::diagnostics::Diagnostic;
use crate::policy::{check_placement, check_provider, SecondaryProtectionParameters};
use crate::ports::{KeyVaultObjectClient, RsaDecrypter};
use crate::tracking::{ObjectTracker, TrackingError, UseReservation};
use crate::ConfidentialError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait AzClientsFactory: Send + Sync {
    async fn key_vault_client(
        &self,
        vault_name: &str,
    ) -> Result<Arc<dyn KeyVaultObjectClient>, ConfidentialError>;

    /// Decryption capability for an already-merged wrapping key
    async fn decrypter_for(
        &self,
        coordinate: &WrappingKeyCoordinate,
    ) -> Result<Arc<dyn RsaDecrypter>, ConfidentialError>;

    /// Fill gaps in a resource's wrapping key from the provider default
    fn merge_wrapping_key_coordinate(
        &self,
        coordinate: &WrappingKeyCoordinate,
    ) -> Result<WrappingKeyCoordinate, ConfigError>;

    /// Resource vault, or the provider's default vault
    fn resolve_destination(&self, vault_name: Option<&str>) -> Result<String, ConfigError>;

    fn dns_suffix(&self) -> &str;

    fn provider_constraint_diagnostics(
        &self,
        protection: &SecondaryProtectionParameters,
    ) -> Option<Diagnostic>;

    fn placement_constraint_diagnostics(
        &self,
        protection: &SecondaryProtectionParameters,
        destination: &AzKeyVaultObjectCoordinate,
    ) -> Option<Diagnostic>;

    fn is_object_tracking_enabled(&self) -> bool;

    async fn is_object_id_tracked(&self, uuid: &str) -> Result<bool, TrackingError>;

    /// Returns the new use count
    async fn track_object_id(&self, uuid: &str) -> Result<u64, TrackingError>;

    async fn tracked_object_uses(&self, uuid: &str) -> Result<u64, TrackingError>;

    /// Atomically consume one of `limit` uses before a remote write
    async fn reserve_object_use(
        &self,
        uuid: &str,
        limit: u64,
    ) -> Result<UseReservation, TrackingError>;
}

/// Hands out one Key Vault client per vault
#[async_trait]
pub trait KeyVaultClientProvider: Send + Sync {
    async fn client_for(
        &self,
        vault_name: &str,
    ) -> Result<Arc<dyn KeyVaultObjectClient>, ConfidentialError>;
}

/// Hands out a decrypter for a wrapping key
#[async_trait]
pub trait DecrypterProvider: Send + Sync {
    async fn decrypter_for(
        &self,
        coordinate: &WrappingKeyCoordinate,
    ) -> Result<Arc<dyn RsaDecrypter>, ConfidentialError>;
}

/// Fixed vault-name to client map
#[derive(Default, Clone)]
pub struct StaticClientProvider {
    clients: HashMap<String, Arc<dyn KeyVaultObjectClient>>,
}

impl StaticClientProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_vault(
        mut self,
        vault_name: impl Into<String>,
        client: Arc<dyn KeyVaultObjectClient>,
    ) -> Self {
        self.clients.insert(vault_name.into(), client);
        self
    }
}

#[async_trait]
impl KeyVaultClientProvider for StaticClientProvider {
    async fn client_for(
        &self,
        vault_name: &str,
    ) -> Result<Arc<dyn KeyVaultObjectClient>, ConfidentialError> {
        self.clients
            .get(vault_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownVault(vault_name.to_string()).into())
    }
}

/// Serves every wrapping key with the same decrypter
#[derive(Clone)]
pub struct SingleKeyDecrypterProvider {
    decrypter: Arc<dyn RsaDecrypter>,
}

impl SingleKeyDecrypterProvider {
    pub fn new(decrypter: Arc<dyn RsaDecrypter>) -> Self {
        Self { decrypter }
    }
}

#[async_trait]
impl DecrypterProvider for SingleKeyDecrypterProvider {
    async fn decrypter_for(
        &self,
        _coordinate: &WrappingKeyCoordinate,
    ) -> Result<Arc<dyn RsaDecrypter>, ConfidentialError> {
        Ok(self.decrypter.clone())
    }
}

pub struct DefaultClientsFactory {
    config: ProviderConfig,
    tracker: Arc<dyn ObjectTracker>,
    clients: Arc<dyn KeyVaultClientProvider>,
    decrypters: Arc<dyn DecrypterProvider>,
}

impl DefaultClientsFactory {
    pub fn new(
        config: ProviderConfig,
        tracker: Arc<dyn ObjectTracker>,
        clients: Arc<dyn KeyVaultClientProvider>,
        decrypters: Arc<dyn DecrypterProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            tracker,
            clients,
            decrypters,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl AzClientsFactory for DefaultClientsFactory {
    async fn key_vault_client(
        &self,
        vault_name: &str,
    ) -> Result<Arc<dyn KeyVaultObjectClient>, ConfidentialError> {
        self.clients.client_for(vault_name).await
    }

    async fn decrypter_for(
        &self,
        coordinate: &WrappingKeyCoordinate,
    ) -> Result<Arc<dyn RsaDecrypter>, ConfidentialError> {
        debug!(coordinate = %coordinate, "resolving decrypter");
        self.decrypters.decrypter_for(coordinate).await
    }

    fn merge_wrapping_key_coordinate(
        &self,
        coordinate: &WrappingKeyCoordinate,
    ) -> Result<WrappingKeyCoordinate, ConfigError> {
        let merged = match &self.config.default_wrapping_key {
            Some(default) => coordinate.merge(default),
            None => coordinate.clone(),
        };
        if merged.vault_name.is_empty() || merged.key_name.is_empty() {
            return Err(ConfigError::MissingWrappingKey);
        }
        Ok(merged)
    }

    fn resolve_destination(&self, vault_name: Option<&str>) -> Result<String, ConfigError> {
        vault_name
            .filter(|v| !v.is_empty())
            .or(self.config.default_destination_vault.as_deref())
            .map(str::to_string)
            .ok_or(ConfigError::MissingDestinationVault)
    }

    fn dns_suffix(&self) -> &str {
        &self.config.dns_suffix
    }

    fn provider_constraint_diagnostics(
        &self,
        protection: &SecondaryProtectionParameters,
    ) -> Option<Diagnostic> {
        check_provider(
            protection,
            self.config.provider_label.as_deref(),
            self.config.constraint_mode,
        )
    }

    fn placement_constraint_diagnostics(
        &self,
        protection: &SecondaryProtectionParameters,
        destination: &AzKeyVaultObjectCoordinate,
    ) -> Option<Diagnostic> {
        check_placement(protection, &destination.canonical_label())
    }

    fn is_object_tracking_enabled(&self) -> bool {
        self.config.object_tracking
    }

    async fn is_object_id_tracked(&self, uuid: &str) -> Result<bool, TrackingError> {
        if !self.config.object_tracking {
            return Err(TrackingError::Disabled);
        }
        self.tracker.is_tracked(uuid).await
    }

    async fn track_object_id(&self, uuid: &str) -> Result<u64, TrackingError> {
        if !self.config.object_tracking {
            return Err(TrackingError::Disabled);
        }
        self.tracker.track(uuid).await
    }

    async fn tracked_object_uses(&self, uuid: &str) -> Result<u64, TrackingError> {
        if !self.config.object_tracking {
            return Err(TrackingError::Disabled);
        }
        self.tracker.uses(uuid).await
    }

    async fn reserve_object_use(
        &self,
        uuid: &str,
        limit: u64,
    ) -> Result<UseReservation, TrackingError> {
        if !self.config.object_tracking {
            return Err(TrackingError::Disabled);
        }
        self.tracker.track_if_below(uuid, limit).await
    }
}
