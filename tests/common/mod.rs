//! Common test utilities for az-confidential integration tests
//!
//! This module provides shared fixtures, an in-memory Key Vault and a
//! factory wired to both, to reduce code duplication across integration
//! test files.

#![allow(dead_code)]

use async_trait::async_trait;
use az_confidential::config::ProviderConfig;
use az_confidential::coordinate::{
    AzKeyVaultObjectCoordinate, AzKeyVaultObjectVersionedCoordinate, WrappingKeyCoordinate,
};
use az_confidential::crypto::rsa::{RsaPrivateKey, RsaPublicKey};
use az_confidential::crypto::{private_key_from_pem, rsa_public_key_from_pem, PrivateKey};
use az_confidential::factory::{
    DefaultClientsFactory, SingleKeyDecrypterProvider, StaticClientProvider,
};
use az_confidential::model::ContentWrappingParams;
use az_confidential::ports::{
    KeyVaultObjectClient, ObjectAttributes, ObjectContent, RemoteError, RemoteObject,
    RsaPrivateKeyDecrypter,
};
use az_confidential::tracking::{
    InMemoryObjectTracker, ObjectTracker, TrackingError, UseReservation,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const RSA4096_PEM: &[u8] = include_bytes!("../data/rsa4096.pem");
pub const RSA4096_PUB_PEM: &[u8] = include_bytes!("../data/rsa4096.pub.pem");
pub const RSA2048_PKCS1_PEM: &[u8] = include_bytes!("../data/rsa2048_pkcs1.pem");
pub const EC_P384_PEM: &[u8] = include_bytes!("../data/ec_p384_pkcs8.pem");
pub const EC_P256_SEC1_PEM: &[u8] = include_bytes!("../data/ec_p256_sec1.pem");
pub const EC_P256_CERT_PEM: &[u8] = include_bytes!("../data/ec_p256_cert.pem");

/// Vault the provider creates in by default
pub const DEFAULT_VAULT: &str = "vaulta";
/// Second vault, used for placement checks
pub const OTHER_VAULT: &str = "vaultb";
pub const PROVIDER_LABEL: &str = "integration";

/// Install a tracing subscriber once; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn wrapping_private_key() -> RsaPrivateKey {
    match private_key_from_pem(RSA4096_PEM, None).unwrap() {
        PrivateKey::Rsa(key) => key,
        other => panic!("fixture is not RSA: {}", other.algorithm()),
    }
}

pub fn wrapping_public_key() -> RsaPublicKey {
    rsa_public_key_from_pem(std::str::from_utf8(RSA4096_PUB_PEM).unwrap()).unwrap()
}

pub fn wrapping_params() -> ContentWrappingParams {
    ContentWrappingParams::from_public_key_pem(RSA4096_PUB_PEM).unwrap()
}

pub fn decrypter() -> RsaPrivateKeyDecrypter {
    RsaPrivateKeyDecrypter::new(wrapping_private_key())
}

/// Key Vault double: versions per object, soft delete, call counting
#[derive(Default)]
pub struct InMemoryKeyVaultClient {
    objects: Mutex<HashMap<AzKeyVaultObjectCoordinate, Vec<RemoteObject>>>,
    calls: AtomicUsize,
}

impl InMemoryKeyVaultClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of client calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Write a new secret version behind the provider's back
    pub async fn overwrite_secret(&self, coordinate: &AzKeyVaultObjectCoordinate, value: &str) {
        let mut objects = self.objects.lock().await;
        let versions = objects.entry(coordinate.clone()).or_default();
        let attributes = versions
            .last()
            .map(|o| o.attributes.clone())
            .unwrap_or_default();
        let version = format!("v{}", versions.len() + 1);
        versions.push(RemoteObject {
            id: coordinate.with_version(version),
            content: ObjectContent::Secret {
                value: value.to_string(),
            },
            attributes,
        });
    }

    pub async fn version_count(&self, coordinate: &AzKeyVaultObjectCoordinate) -> usize {
        self.objects
            .lock()
            .await
            .get(coordinate)
            .map_or(0, Vec::len)
    }

    async fn push_version(
        &self,
        coordinate: &AzKeyVaultObjectCoordinate,
        content: ObjectContent,
        attributes: ObjectAttributes,
    ) -> RemoteObject {
        let mut objects = self.objects.lock().await;
        let versions = objects.entry(coordinate.clone()).or_default();
        let object = RemoteObject {
            id: coordinate.with_version(format!("v{}", versions.len() + 1)),
            content,
            attributes,
        };
        versions.push(object.clone());
        object
    }

    fn not_found(id: &AzKeyVaultObjectVersionedCoordinate) -> RemoteError {
        RemoteError::NotFound(format!("{}/{}", id.coordinate, id.version))
    }
}

#[async_trait]
impl KeyVaultObjectClient for InMemoryKeyVaultClient {
    async fn create_object(
        &self,
        coordinate: &AzKeyVaultObjectCoordinate,
        content: ObjectContent,
        attributes: ObjectAttributes,
    ) -> Result<RemoteObject, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.push_version(coordinate, content, attributes).await)
    }

    async fn get_object(
        &self,
        id: &AzKeyVaultObjectVersionedCoordinate,
    ) -> Result<RemoteObject, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().await;
        let versions = objects
            .get(&id.coordinate)
            .ok_or_else(|| Self::not_found(id))?;
        let found = if id.version.is_empty() {
            versions.last()
        } else {
            versions.iter().find(|o| o.id.version == id.version)
        };
        found.cloned().ok_or_else(|| Self::not_found(id))
    }

    async fn update_attributes(
        &self,
        id: &AzKeyVaultObjectVersionedCoordinate,
        attributes: ObjectAttributes,
    ) -> Result<RemoteObject, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().await;
        let object = objects
            .get_mut(&id.coordinate)
            .and_then(|versions| versions.iter_mut().find(|o| o.id.version == id.version))
            .ok_or_else(|| Self::not_found(id))?;
        object.attributes = attributes;
        Ok(object.clone())
    }

    async fn update_content(
        &self,
        coordinate: &AzKeyVaultObjectCoordinate,
        content: ObjectContent,
        attributes: ObjectAttributes,
    ) -> Result<RemoteObject, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.push_version(coordinate, content, attributes).await)
    }

    async fn disable_object(
        &self,
        id: &AzKeyVaultObjectVersionedCoordinate,
    ) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut objects = self.objects.lock().await;
        let versions = objects
            .get_mut(&id.coordinate)
            .ok_or_else(|| Self::not_found(id))?;
        for object in versions.iter_mut() {
            object.attributes.enabled = false;
        }
        Ok(())
    }
}

/// Tracking store that suspends before every access, like one behind a network hop
pub struct YieldingTracker(pub Arc<InMemoryObjectTracker>);

#[async_trait]
impl ObjectTracker for YieldingTracker {
    async fn is_tracked(&self, uuid: &str) -> Result<bool, TrackingError> {
        tokio::task::yield_now().await;
        self.0.is_tracked(uuid).await
    }

    async fn track(&self, uuid: &str) -> Result<u64, TrackingError> {
        tokio::task::yield_now().await;
        self.0.track(uuid).await
    }

    async fn uses(&self, uuid: &str) -> Result<u64, TrackingError> {
        tokio::task::yield_now().await;
        self.0.uses(uuid).await
    }

    async fn track_if_below(
        &self,
        uuid: &str,
        limit: u64,
    ) -> Result<UseReservation, TrackingError> {
        tokio::task::yield_now().await;
        self.0.track_if_below(uuid, limit).await
    }
}

/// Everything a lifecycle test needs, wired together
pub struct TestEnv {
    pub factory: Arc<DefaultClientsFactory>,
    pub tracker: Arc<InMemoryObjectTracker>,
    pub vault_a: Arc<InMemoryKeyVaultClient>,
    pub vault_b: Arc<InMemoryKeyVaultClient>,
}

impl TestEnv {
    pub fn new(object_tracking: bool) -> Self {
        Self::with_config(ProviderConfig {
            object_tracking,
            ..test_config()
        })
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self::build(config, false)
    }

    /// Tracking enabled, with a store that yields on every access
    pub fn with_yielding_tracker() -> Self {
        Self::build(
            ProviderConfig {
                object_tracking: true,
                ..test_config()
            },
            true,
        )
    }

    fn build(config: ProviderConfig, yielding: bool) -> Self {
        init_tracing();
        let tracker = Arc::new(InMemoryObjectTracker::new());
        let store: Arc<dyn ObjectTracker> = if yielding {
            Arc::new(YieldingTracker(tracker.clone()))
        } else {
            tracker.clone()
        };
        let vault_a = Arc::new(InMemoryKeyVaultClient::new());
        let vault_b = Arc::new(InMemoryKeyVaultClient::new());
        let clients = StaticClientProvider::new()
            .with_vault(DEFAULT_VAULT, vault_a.clone())
            .with_vault(OTHER_VAULT, vault_b.clone());
        let decrypters = SingleKeyDecrypterProvider::new(Arc::new(decrypter()));
        let factory =
            DefaultClientsFactory::new(config, store, Arc::new(clients), Arc::new(decrypters))
                .unwrap();
        Self {
            factory: Arc::new(factory),
            tracker,
            vault_a,
            vault_b,
        }
    }

    /// Recorded uses, read straight from the store
    pub async fn tracker_uses(&self, uuid: &str) -> u64 {
        self.tracker.uses(uuid).await.unwrap()
    }

    /// Client calls across both vaults
    pub fn remote_calls(&self) -> usize {
        self.vault_a.calls() + self.vault_b.calls()
    }
}

pub fn test_config() -> ProviderConfig {
    ProviderConfig {
        provider_label: Some(PROVIDER_LABEL.to_string()),
        default_wrapping_key: Some(WrappingKeyCoordinate::new("wrapvault", "wrapkey")),
        default_destination_vault: Some(DEFAULT_VAULT.to_string()),
        ..ProviderConfig::default()
    }
}
