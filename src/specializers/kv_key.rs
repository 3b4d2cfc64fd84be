use super::{destination, disable_remote, placement_diagnostic, read_remote, KeyVaultObjectModel};
use crate::coordinate::ObjectType;
use crate::diagnostics::Diagnostic;
use crate::factory::AzClientsFactory;
use crate::lifecycle::{ConfidentialMaterial, ImmutableRu, ReadResult, Specializer};
use crate::model::{ConfidentialDataHeader, ConfidentialDataHelper, ConfidentialObjectType, ModelError};
use crate::ports::{ObjectContent, RemoteError, RemoteObject, RsaDecrypter};
use crate::ConfidentialError;
use async_trait::async_trait;
use confidential_crypto::{
    from_jwk_set, import_symmetric, private_key_from_pem, to_jwk, AzureJwk, Jwk,
};
use confidential_protocol::Envelope;
use tracing::debug;

/// Key Vault key imported from a JWK (or PEM) payload
///
/// Key material cannot change after import; updates touch attributes only.
#[derive(Debug, Clone)]
pub struct KeyVaultKeySpecializer {
    helper: ConfidentialDataHelper<Vec<u8>>,
}

impl Default for KeyVaultKeySpecializer {
    fn default() -> Self {
        Self {
            helper: ConfidentialDataHelper::new(ConfidentialObjectType::KeyVaultKey),
        }
    }
}

impl KeyVaultKeySpecializer {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Interpret a binary key payload: JWK JSON, then a PEM private key, then
/// raw AES key bytes
pub fn jwk_from_payload(payload: &[u8]) -> Result<AzureJwk, ConfidentialError> {
    if let Ok(jwk) = serde_json::from_slice::<Jwk>(payload) {
        return Ok(from_jwk_set(&jwk)?);
    }
    if let Ok(key) = private_key_from_pem(payload, None) {
        return Ok(from_jwk_set(&to_jwk(&key)?)?);
    }
    if let Ok(jwk) = import_symmetric(payload) {
        return Ok(from_jwk_set(&jwk)?);
    }
    Err(ModelError::InvalidPayload(
        "key payload is not a JWK, a PEM private key or an AES key".to_string(),
    )
    .into())
}

#[async_trait]
impl Specializer for KeyVaultKeySpecializer {
    type Model = KeyVaultObjectModel;
    type Data = AzureJwk;
    type Remote = RemoteObject;

    fn object_type(&self) -> ConfidentialObjectType {
        ConfidentialObjectType::KeyVaultKey
    }

    fn new_model(&self) -> KeyVaultObjectModel {
        KeyVaultObjectModel::default()
    }

    fn convert_to_remote(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &KeyVaultObjectModel,
        data: &AzureJwk,
    ) -> Result<RemoteObject, ConfidentialError> {
        let coordinate = destination(factory, plan, ObjectType::Keys)?;
        Ok(RemoteObject {
            id: coordinate.with_version(""),
            content: ObjectContent::Key { jwk: data.clone() },
            attributes: plan.attributes(),
        })
    }

    fn convert_to_local(
        &self,
        remote: &RemoteObject,
        plan: &KeyVaultObjectModel,
    ) -> KeyVaultObjectModel {
        plan.with_remote(remote)
    }

    fn confidential_material(&self, model: &KeyVaultObjectModel) -> ConfidentialMaterial {
        model.material.clone()
    }

    async fn decrypt(
        &self,
        envelope: &Envelope,
        decrypter: &dyn RsaDecrypter,
    ) -> Result<(ConfidentialDataHeader, AzureJwk), ConfidentialError> {
        let (header, payload) = self.helper.import(envelope, decrypter).await?;
        Ok((header, jwk_from_payload(&payload)?))
    }

    fn check_placement(
        &self,
        factory: &dyn AzClientsFactory,
        header: &ConfidentialDataHeader,
        plan: &KeyVaultObjectModel,
    ) -> Option<Diagnostic> {
        placement_diagnostic(factory, header, plan, ObjectType::Keys)
    }

    async fn do_create(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &KeyVaultObjectModel,
        data: &AzureJwk,
    ) -> Result<RemoteObject, ConfidentialError> {
        let remote = self.convert_to_remote(factory, plan, data)?;
        let client = factory
            .key_vault_client(&remote.id.coordinate.vault_name)
            .await?;
        debug!(coordinate = %remote.id.coordinate, kty = %data.kty, "importing key");
        Ok(client
            .create_object(&remote.id.coordinate, remote.content, remote.attributes)
            .await?)
    }

    async fn do_delete(
        &self,
        factory: &dyn AzClientsFactory,
        state: &KeyVaultObjectModel,
    ) -> Result<(), ConfidentialError> {
        disable_remote(factory, state).await
    }
}

#[async_trait]
impl ImmutableRu<KeyVaultKeySpecializer> for KeyVaultKeySpecializer {
    async fn do_read(
        &self,
        factory: &dyn AzClientsFactory,
        state: &KeyVaultObjectModel,
    ) -> ReadResult<RemoteObject> {
        match &state.id {
            Some(id) => read_remote(factory, id).await,
            None => ReadResult::not_yet_created(),
        }
    }

    async fn do_update(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &KeyVaultObjectModel,
    ) -> Result<RemoteObject, ConfidentialError> {
        let id = plan
            .id
            .as_ref()
            .ok_or_else(|| RemoteError::NotFound(format!("key '{}' was never created", plan.name)))?;
        let client = factory.key_vault_client(&id.coordinate.vault_name).await?;
        debug!(coordinate = %id.coordinate, "updating key attributes");
        Ok(client.update_attributes(id, plan.attributes()).await?)
    }
}
