use super::{destination, disable_remote, placement_diagnostic, read_remote, KeyVaultObjectModel};
use crate::coordinate::ObjectType;
use crate::diagnostics::Diagnostic;
use crate::factory::AzClientsFactory;
use crate::lifecycle::{
    create_drift_message, ConfidentialMaterial, MutableRu, ReadResult, ResourceExistence,
    Specializer,
};
use crate::model::{ConfidentialDataHeader, ConfidentialDataHelper, ConfidentialObjectType};
use crate::ports::{ObjectContent, RemoteObject, RsaDecrypter};
use crate::ConfidentialError;
use async_trait::async_trait;
use confidential_protocol::Envelope;
use tracing::debug;

/// Key Vault secret holding a string; drift is detected on read
#[derive(Debug, Clone)]
pub struct KeyVaultSecretSpecializer {
    helper: ConfidentialDataHelper<String>,
}

impl Default for KeyVaultSecretSpecializer {
    fn default() -> Self {
        Self {
            helper: ConfidentialDataHelper::new(ConfidentialObjectType::KeyVaultSecret),
        }
    }
}

impl KeyVaultSecretSpecializer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Specializer for KeyVaultSecretSpecializer {
    type Model = KeyVaultObjectModel;
    type Data = String;
    type Remote = RemoteObject;

    fn object_type(&self) -> ConfidentialObjectType {
        ConfidentialObjectType::KeyVaultSecret
    }

    fn new_model(&self) -> KeyVaultObjectModel {
        KeyVaultObjectModel::default()
    }

    fn convert_to_remote(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &KeyVaultObjectModel,
        data: &String,
    ) -> Result<RemoteObject, ConfidentialError> {
        let coordinate = destination(factory, plan, ObjectType::Secrets)?;
        Ok(RemoteObject {
            id: coordinate.with_version(""),
            content: ObjectContent::Secret {
                value: data.clone(),
            },
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
    ) -> Result<(ConfidentialDataHeader, String), ConfidentialError> {
        self.helper.import(envelope, decrypter).await
    }

    fn check_placement(
        &self,
        factory: &dyn AzClientsFactory,
        header: &ConfidentialDataHeader,
        plan: &KeyVaultObjectModel,
    ) -> Option<Diagnostic> {
        placement_diagnostic(factory, header, plan, ObjectType::Secrets)
    }

    async fn do_create(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &KeyVaultObjectModel,
        data: &String,
    ) -> Result<RemoteObject, ConfidentialError> {
        let remote = self.convert_to_remote(factory, plan, data)?;
        let client = factory
            .key_vault_client(&remote.id.coordinate.vault_name)
            .await?;
        debug!(coordinate = %remote.id.coordinate, "creating secret");
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
impl MutableRu<KeyVaultSecretSpecializer> for KeyVaultSecretSpecializer {
    async fn do_read(
        &self,
        factory: &dyn AzClientsFactory,
        state: &KeyVaultObjectModel,
        data: Option<&String>,
    ) -> ReadResult<RemoteObject> {
        let id = match &state.id {
            Some(id) => id.versionless().with_version(""),
            None => return ReadResult::not_yet_created(),
        };

        let mut result = read_remote(factory, &id).await;
        if result.existence == ResourceExistence::Exists {
            if let (Some(expected), Some(object)) = (data, &result.object) {
                let matches = matches!(
                    &object.content,
                    ObjectContent::Secret { value } if value == expected
                );
                if !matches {
                    result.existence = ResourceExistence::ConfidentialDataDrift;
                }
            }
        }
        result
    }

    async fn do_update(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &KeyVaultObjectModel,
        data: &String,
    ) -> Result<RemoteObject, ConfidentialError> {
        let remote = self.convert_to_remote(factory, plan, data)?;
        let client = factory
            .key_vault_client(&remote.id.coordinate.vault_name)
            .await?;
        debug!(coordinate = %remote.id.coordinate, "updating secret");
        Ok(client
            .update_content(&remote.id.coordinate, remote.content, remote.attributes)
            .await?)
    }

    fn set_drift_to_confidential_data(&self, state: &mut KeyVaultObjectModel) {
        state.material.armored = create_drift_message(self.object_type().as_str());
    }
}
