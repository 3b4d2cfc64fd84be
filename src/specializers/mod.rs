//! Key Vault specializers
//!
//! - [`KeyVaultSecretSpecializer`]: `kv/secret`, content may drift
//! - [`KeyVaultKeySpecializer`]: `kv/key`, content fixed at import

pub mod kv_key;
pub mod kv_secret;

pub use kv_key::KeyVaultKeySpecializer;
pub use kv_secret::KeyVaultSecretSpecializer;

use crate::coordinate::{AzKeyVaultObjectCoordinate, AzKeyVaultObjectVersionedCoordinate, ObjectType};
use crate::diagnostics::{Diagnostic, SUMMARY_CONFIGURATION, SUMMARY_READ_FAILED};
use crate::factory::AzClientsFactory;
use crate::lifecycle::{ConfidentialMaterial, ReadResult};
use crate::model::ConfidentialDataHeader;
use crate::ports::{ObjectAttributes, RemoteError, RemoteObject};
use crate::ConfidentialError;
use std::collections::BTreeMap;

/// Local state of a Key Vault object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyVaultObjectModel {
    /// Versioned id once the object exists
    pub id: Option<AzKeyVaultObjectVersionedCoordinate>,
    /// Vault to create in; the provider default when unset
    pub destination_vault: Option<String>,
    pub name: String,
    pub material: ConfidentialMaterial,
    /// Unset means enabled
    pub enabled: Option<bool>,
    pub content_type: Option<String>,
    pub not_before: Option<i64>,
    pub expires: Option<i64>,
    pub tags: BTreeMap<String, String>,
}

impl KeyVaultObjectModel {
    pub fn new(name: impl Into<String>, material: ConfidentialMaterial) -> Self {
        Self {
            name: name.into(),
            material,
            ..Default::default()
        }
    }

    pub fn attributes(&self) -> ObjectAttributes {
        ObjectAttributes {
            enabled: self.enabled.unwrap_or(true),
            not_before: self.not_before,
            expires: self.expires,
            content_type: self.content_type.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Copy of `self` reflecting what the vault returned
    pub(crate) fn with_remote(&self, remote: &RemoteObject) -> Self {
        let mut model = self.clone();
        model.id = Some(remote.id.clone());
        model.destination_vault = Some(remote.id.coordinate.vault_name.clone());
        model.enabled = Some(remote.attributes.enabled);
        model.content_type = remote.attributes.content_type.clone();
        model.not_before = remote.attributes.not_before;
        model.expires = remote.attributes.expires;
        model.tags = remote.attributes.tags.clone();
        model
    }
}

pub(crate) fn destination(
    factory: &dyn AzClientsFactory,
    model: &KeyVaultObjectModel,
    object_type: ObjectType,
) -> Result<AzKeyVaultObjectCoordinate, ConfidentialError> {
    let vault = factory.resolve_destination(model.destination_vault.as_deref())?;
    Ok(AzKeyVaultObjectCoordinate::new(vault, object_type, model.name.clone()))
}

pub(crate) fn placement_diagnostic(
    factory: &dyn AzClientsFactory,
    header: &ConfidentialDataHeader,
    model: &KeyVaultObjectModel,
    object_type: ObjectType,
) -> Option<Diagnostic> {
    match destination(factory, model, object_type) {
        Ok(coordinate) => factory.placement_constraint_diagnostics(&header.protection, &coordinate),
        Err(err) => Some(Diagnostic::from_error(SUMMARY_CONFIGURATION, &err)),
    }
}

/// Fetch an object; disabled objects count as deleted
pub(crate) async fn read_remote(
    factory: &dyn AzClientsFactory,
    id: &AzKeyVaultObjectVersionedCoordinate,
) -> ReadResult<RemoteObject> {
    let fetched = match factory.key_vault_client(&id.coordinate.vault_name).await {
        Ok(client) => client.get_object(id).await.map_err(ConfidentialError::from),
        Err(err) => Err(err),
    };
    match fetched {
        Ok(object) if !object.attributes.enabled => ReadResult::not_found(),
        Ok(object) => ReadResult::exists(object),
        Err(ConfidentialError::Remote(RemoteError::NotFound(_))) => ReadResult::not_found(),
        Err(err) => ReadResult::check_error(Diagnostic::from_error(SUMMARY_READ_FAILED, &err).into()),
    }
}

/// Disable the object behind `model`; an already-missing object is fine
pub(crate) async fn disable_remote(
    factory: &dyn AzClientsFactory,
    model: &KeyVaultObjectModel,
) -> Result<(), ConfidentialError> {
    let id = match &model.id {
        Some(id) => id,
        None => return Ok(()),
    };
    let client = factory.key_vault_client(&id.coordinate.vault_name).await?;
    match client.disable_object(id).await {
        Ok(()) | Err(RemoteError::NotFound(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}
