mod common;

use async_trait::async_trait;
use az_confidential::config::{ConstraintMode, ProviderConfig};
use az_confidential::coordinate::{AzKeyVaultObjectCoordinate, ObjectType};
use az_confidential::crypto::{private_key_from_pem, PrivateKey};
use az_confidential::diagnostics::{
    Diagnostics, SUMMARY_CREATE_WINDOW_CLOSED, SUMMARY_CREATE_WINDOW_IMMINENT,
    SUMMARY_DECRYPT_FAILED, SUMMARY_EXPIRED, SUMMARY_EXPIRY_IMMINENT, SUMMARY_IMPLICIT_MOVE,
    SUMMARY_LAST_USE, SUMMARY_MISSING_READ_ERROR, SUMMARY_PROVIDER_CONSTRAINT,
    SUMMARY_USES_EXHAUSTED, SUMMARY_USES_INSECURE,
};
use az_confidential::factory::AzClientsFactory;
use az_confidential::lifecycle::{
    is_drift_message, ConfidentialMaterial, ConfidentialResource, ImmutableRu, ReadResult,
    ReadUpdate,
};
use az_confidential::model::{
    ConfidentialDataHelper, ConfidentialObjectType, ContentWrappingParams, ExportedEnvelope,
};
use az_confidential::ports::{KeyVaultObjectClient, ObjectContent, RemoteObject};
use az_confidential::specializers::{
    KeyVaultKeySpecializer, KeyVaultObjectModel, KeyVaultSecretSpecializer,
};
use az_confidential::ConfidentialError;
use chrono::{DateTime, Duration, Utc};
use common::*;
use std::sync::Arc;

fn secret_envelope(value: &str, params: &ContentWrappingParams) -> ExportedEnvelope {
    ConfidentialDataHelper::<String>::new(ConfidentialObjectType::KeyVaultSecret)
        .export(&value.to_string(), params)
        .unwrap()
}

fn secret_envelope_at(
    value: &str,
    params: &ContentWrappingParams,
    now: DateTime<Utc>,
) -> ExportedEnvelope {
    ConfidentialDataHelper::<String>::new(ConfidentialObjectType::KeyVaultSecret)
        .export_at(&value.to_string(), params, now)
        .unwrap()
}

fn secret_plan(name: &str, exported: &ExportedEnvelope) -> KeyVaultObjectModel {
    KeyVaultObjectModel::new(
        name,
        ConfidentialMaterial {
            armored: exported.armored.clone(),
            ..Default::default()
        },
    )
}

fn secret_resource(env: &TestEnv) -> ConfidentialResource<KeyVaultSecretSpecializer> {
    let specializer = Arc::new(KeyVaultSecretSpecializer::new());
    ConfidentialResource::new(
        specializer.clone(),
        ReadUpdate::Mutable(specializer),
        env.factory.clone(),
    )
}

fn key_resource(env: &TestEnv) -> ConfidentialResource<KeyVaultKeySpecializer> {
    let specializer = Arc::new(KeyVaultKeySpecializer::new());
    ConfidentialResource::new(
        specializer.clone(),
        ReadUpdate::Immutable(specializer),
        env.factory.clone(),
    )
}

fn secret_coordinate(vault: &str, name: &str) -> AzKeyVaultObjectCoordinate {
    AzKeyVaultObjectCoordinate::new(vault, ObjectType::Secrets, name)
}

#[tokio::test]
async fn test_create_secret() {
    let env = TestEnv::new(false);
    let exported = secret_envelope("s3cr3t", &wrapping_params());

    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;

    assert!(!response.has_error(), "{:?}", response.diagnostics);
    let state = response.state.unwrap();
    let id = state.id.unwrap();
    assert_eq!(id.coordinate, secret_coordinate(DEFAULT_VAULT, "s1"));
    assert_eq!(id.version, "v1");
    assert_eq!(state.destination_vault.as_deref(), Some(DEFAULT_VAULT));
    assert_eq!(state.enabled, Some(true));
}

#[tokio::test]
async fn test_expired_ciphertext_is_fatal_without_remote_call() {
    let env = TestEnv::new(false);
    let produced = Utc::now() - Duration::days(2);
    let exported = secret_envelope_at(
        "late",
        &wrapping_params().expires_in(Duration::days(1)),
        produced,
    );

    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;

    assert!(response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_EXPIRED));
    assert!(response.state.is_none());
    assert_eq!(env.remote_calls(), 0);
}

#[tokio::test]
async fn test_create_window_imminent_is_a_warning() {
    let env = TestEnv::new(false);
    let exported = secret_envelope("soon", &wrapping_params().create_within(Duration::hours(23)));

    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;

    assert!(!response.has_error(), "{:?}", response.diagnostics);
    assert!(response
        .diagnostics
        .warnings()
        .any(|d| d.summary == SUMMARY_CREATE_WINDOW_IMMINENT));
    assert!(response.state.is_some());
}

#[tokio::test]
async fn test_closed_create_window() {
    let env = TestEnv::new(false);
    let produced = Utc::now() - Duration::hours(3);
    let exported = secret_envelope_at(
        "closed",
        &wrapping_params().create_within(Duration::hours(1)),
        produced,
    );

    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;

    assert!(response.diagnostics.contains_summary(SUMMARY_CREATE_WINDOW_CLOSED));
    assert_eq!(env.remote_calls(), 0);
}

#[tokio::test]
async fn test_placement_mismatch_refuses_create() {
    let env = TestEnv::new(false);
    let exported = secret_envelope(
        "pinned",
        &wrapping_params().placement(&secret_coordinate(DEFAULT_VAULT, "s1")),
    );
    assert!(exported
        .header
        .protection
        .placement_constraints
        .contains("az-c-keyvault://vaulta@secrets=s1"));

    let mut plan = secret_plan("s1", &exported);
    plan.destination_vault = Some(OTHER_VAULT.to_string());
    let response = secret_resource(&env).create(&plan).await;

    assert!(response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_IMPLICIT_MOVE));
    assert_eq!(env.remote_calls(), 0);

    // The permitted destination works
    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;
    assert!(!response.has_error(), "{:?}", response.diagnostics);
}

#[tokio::test]
async fn test_provider_constraint_modes() {
    let params = wrapping_params().provider_constraint("another-provider");
    let exported = secret_envelope("elsewhere", &params);

    let strict = TestEnv::new(false);
    let response = secret_resource(&strict)
        .create(&secret_plan("s1", &exported))
        .await;
    assert!(response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_PROVIDER_CONSTRAINT));
    assert_eq!(strict.remote_calls(), 0);

    let lenient = TestEnv::with_config(ProviderConfig {
        constraint_mode: ConstraintMode::ProviderLevel,
        ..test_config()
    });
    let response = secret_resource(&lenient)
        .create(&secret_plan("s1", &exported))
        .await;
    assert!(!response.has_error(), "{:?}", response.diagnostics);
    assert!(response.diagnostics.contains_summary(SUMMARY_PROVIDER_CONSTRAINT));
}

#[tokio::test]
async fn test_exhausted_uses_refuse_create() {
    let env = TestEnv::new(true);
    let exported = secret_envelope("twice", &wrapping_params().num_uses(2));
    env.tracker.seed(&exported.header.uuid, 2).await.unwrap();

    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;

    assert!(response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_USES_EXHAUSTED));
    assert!(response.state.is_none());
    assert_eq!(env.remote_calls(), 0);
}

#[tokio::test]
async fn test_each_create_consumes_one_use() {
    let env = TestEnv::new(true);
    let exported = secret_envelope("thrice", &wrapping_params().num_uses(3));
    let resource = secret_resource(&env);

    for (i, name) in ["s1", "s2", "s3"].iter().enumerate() {
        let response = resource.create(&secret_plan(name, &exported)).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        assert_eq!(
            env.factory.tracked_object_uses(&exported.header.uuid).await.unwrap(),
            i as u64 + 1
        );
        let last = response.diagnostics.contains_summary(SUMMARY_LAST_USE);
        assert_eq!(last, i == 2, "create {}", i + 1);
    }

    let calls = env.remote_calls();
    let response = resource.create(&secret_plan("s4", &exported)).await;
    assert!(response.diagnostics.contains_summary(SUMMARY_USES_EXHAUSTED));
    assert_eq!(env.remote_calls(), calls);
}

#[tokio::test]
async fn test_concurrent_creates_respect_use_limit() {
    let env = TestEnv::with_yielding_tracker();
    let resource = secret_resource(&env);
    let exported = secret_envelope("contended", &wrapping_params().num_uses(2));
    let plans: Vec<_> = ["s1", "s2", "s3", "s4"]
        .iter()
        .map(|name| secret_plan(name, &exported))
        .collect();

    let (a, b, c, d) = tokio::join!(
        resource.create(&plans[0]),
        resource.create(&plans[1]),
        resource.create(&plans[2]),
        resource.create(&plans[3])
    );
    let responses = [a, b, c, d];

    let created = responses.iter().filter(|r| r.state.is_some()).count();
    let refused = responses
        .iter()
        .filter(|r| r.diagnostics.contains_summary(SUMMARY_USES_EXHAUSTED))
        .count();
    assert_eq!(created, 2);
    assert_eq!(refused, 2);
    assert_eq!(env.tracker_uses(&exported.header.uuid).await, 2);
}

#[tokio::test]
async fn test_failed_create_keeps_reserved_use() {
    let env = TestEnv::new(true);
    let resource = secret_resource(&env);
    let exported = secret_envelope("once", &wrapping_params().num_uses(1));

    let mut plan = secret_plan("s1", &exported);
    plan.destination_vault = Some("nowhere".to_string());
    let response = resource.create(&plan).await;
    assert!(response.has_error());
    assert!(response.state.is_none());
    assert_eq!(env.tracker_uses(&exported.header.uuid).await, 1);

    // Refusing further creates is the safe outcome
    let response = resource.create(&secret_plan("s1", &exported)).await;
    assert!(response.diagnostics.contains_summary(SUMMARY_USES_EXHAUSTED));
}

#[tokio::test]
async fn test_limited_uses_need_tracking() {
    let env = TestEnv::new(false);
    let exported = secret_envelope("once", &wrapping_params().num_uses(1));

    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;

    assert!(response.diagnostics.contains_summary(SUMMARY_USES_INSECURE));
    assert_eq!(env.remote_calls(), 0);
}

#[tokio::test]
async fn test_unlimited_uses_are_tracked_not_limited() {
    let env = TestEnv::new(true);
    let exported = secret_envelope("many", &wrapping_params().num_uses(-1));
    let resource = secret_resource(&env);

    for name in ["s1", "s2", "s3"] {
        let response = resource.create(&secret_plan(name, &exported)).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        assert!(!response.diagnostics.contains_summary(SUMMARY_LAST_USE));
    }
    assert_eq!(env.tracker_uses(&exported.header.uuid).await, 3);
}

#[tokio::test]
async fn test_wrong_wrapping_key_cannot_decrypt() {
    let env = TestEnv::new(false);
    let mut exported = secret_envelope("x", &wrapping_params());
    // Swap in an envelope sealed for an unrelated key
    let other = match private_key_from_pem(RSA2048_PKCS1_PEM, None).unwrap() {
        PrivateKey::Rsa(key) => key,
        other => panic!("fixture is not RSA: {}", other.algorithm()),
    };
    let other_params = ContentWrappingParams::new(other.to_public_key());
    exported.armored = secret_envelope("x", &other_params).armored;

    let response = secret_resource(&env)
        .create(&secret_plan("s1", &exported))
        .await;
    assert!(response.diagnostics.contains_summary(SUMMARY_DECRYPT_FAILED));
    assert_eq!(env.remote_calls(), 0);
}

#[tokio::test]
async fn test_secret_drift_is_marked_and_repaired() {
    let env = TestEnv::new(false);
    let resource = secret_resource(&env);
    let exported = secret_envelope("original", &wrapping_params());
    let plan = secret_plan("s1", &exported);

    let state = resource.create(&plan).await.state.unwrap();
    let response = resource.read(&state).await;
    assert!(!response.has_error(), "{:?}", response.diagnostics);
    assert_eq!(response.state.as_ref().unwrap().material.armored, exported.armored);

    env.vault_a
        .overwrite_secret(&secret_coordinate(DEFAULT_VAULT, "s1"), "changed by hand")
        .await;
    let drifted = resource.read(&state).await.state.unwrap();
    assert!(is_drift_message(&drifted.material.armored));

    // A drift marker is not an envelope; reading it again must not decrypt
    let response = resource.read(&drifted).await;
    assert!(!response.has_error(), "{:?}", response.diagnostics);
    assert!(is_drift_message(&response.state.unwrap().material.armored));

    let response = resource.update(&drifted, &plan).await;
    assert!(!response.has_error(), "{:?}", response.diagnostics);
    let repaired = response.state.unwrap();
    assert_eq!(repaired.material.armored, exported.armored);
    assert_eq!(
        env.vault_a
            .version_count(&secret_coordinate(DEFAULT_VAULT, "s1"))
            .await,
        3
    );

    let response = resource.read(&repaired).await;
    assert_eq!(response.state.unwrap().material.armored, exported.armored);
}

#[tokio::test]
async fn test_read_reports_expiry() {
    let env = TestEnv::new(false);
    let resource = secret_resource(&env);
    let exported = secret_envelope("brief", &wrapping_params().expires_in(Duration::days(5)));
    let state = resource
        .create(&secret_plan("s1", &exported))
        .await
        .state
        .unwrap();

    let response = resource.read(&state).await;
    assert!(!response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_EXPIRY_IMMINENT));

    let later = resource.with_clock(|| Utc::now() + Duration::days(6));
    let response = later.read(&state).await;
    assert!(response.diagnostics.contains_summary(SUMMARY_EXPIRED));
    assert_eq!(response.state, Some(state));
}

#[tokio::test]
async fn test_update_tracks_new_envelope_once() {
    let env = TestEnv::new(true);
    let resource = secret_resource(&env);
    let first = secret_envelope("v1", &wrapping_params());
    let state = resource
        .create(&secret_plan("s1", &first))
        .await
        .state
        .unwrap();
    // No limit and no tracking requested
    assert_eq!(env.tracker_uses(&first.header.uuid).await, 0);

    let second = secret_envelope("v2", &wrapping_params().num_uses(-1));
    let plan = secret_plan("s1", &second);
    let updated = resource.update(&state, &plan).await;
    assert!(!updated.has_error(), "{:?}", updated.diagnostics);
    assert_eq!(env.tracker_uses(&second.header.uuid).await, 1);

    let again = resource.update(&updated.state.unwrap(), &plan).await;
    assert!(!again.has_error());
    assert_eq!(env.tracker_uses(&second.header.uuid).await, 1);
}

#[tokio::test]
async fn test_update_refuses_exhausted_ciphertext() {
    let env = TestEnv::new(true);
    let resource = secret_resource(&env);
    let first = secret_envelope("v1", &wrapping_params().num_uses(-1));
    let prior = resource
        .create(&secret_plan("s1", &first))
        .await
        .state
        .unwrap();

    let spent = secret_envelope("v2", &wrapping_params().num_uses(1));
    env.tracker.seed(&spent.header.uuid, 1).await.unwrap();
    let calls = env.remote_calls();
    let response = resource.update(&prior, &secret_plan("s1", &spent)).await;

    assert!(response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_USES_EXHAUSTED));
    assert_eq!(response.state, Some(prior));
    assert_eq!(env.remote_calls(), calls);
    assert_eq!(env.tracker_uses(&spent.header.uuid).await, 1);
}

#[tokio::test]
async fn test_update_to_limited_uses_needs_tracking() {
    let env = TestEnv::new(false);
    let resource = secret_resource(&env);
    let first = secret_envelope("v1", &wrapping_params());
    let prior = resource
        .create(&secret_plan("s1", &first))
        .await
        .state
        .unwrap();

    let limited = secret_envelope("v2", &wrapping_params().num_uses(2));
    let calls = env.remote_calls();
    let response = resource.update(&prior, &secret_plan("s1", &limited)).await;

    assert!(response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_USES_INSECURE));
    assert_eq!(response.state, Some(prior));
    assert_eq!(env.remote_calls(), calls);
}

#[tokio::test]
async fn test_update_consumes_one_use_per_new_ciphertext() {
    let env = TestEnv::new(true);
    let resource = secret_resource(&env);
    let first = secret_envelope("v1", &wrapping_params());
    let prior = resource
        .create(&secret_plan("s1", &first))
        .await
        .state
        .unwrap();

    let single = secret_envelope("v2", &wrapping_params().num_uses(1));
    let plan = secret_plan("s1", &single);
    let updated = resource.update(&prior, &plan).await;
    assert!(!updated.has_error(), "{:?}", updated.diagnostics);
    assert_eq!(env.tracker_uses(&single.header.uuid).await, 1);

    // Re-applying the deployed ciphertext costs nothing, even to repair drift
    let again = resource.update(&updated.state.unwrap(), &plan).await;
    assert!(!again.has_error(), "{:?}", again.diagnostics);
    env.vault_a
        .overwrite_secret(&secret_coordinate(DEFAULT_VAULT, "s1"), "changed by hand")
        .await;
    let drifted = resource.read(&again.state.unwrap()).await.state.unwrap();
    assert!(is_drift_message(&drifted.material.armored));
    let repaired = resource.update(&drifted, &plan).await;
    assert!(!repaired.has_error(), "{:?}", repaired.diagnostics);
    assert_eq!(env.tracker_uses(&single.header.uuid).await, 1);

    // The single use is gone for every other object
    let response = resource.create(&secret_plan("s2", &single)).await;
    assert!(response.diagnostics.contains_summary(SUMMARY_USES_EXHAUSTED));
}

#[tokio::test]
async fn test_failed_update_keeps_prior_state() {
    let env = TestEnv::new(false);
    let resource = secret_resource(&env);
    let first = secret_envelope("v1", &wrapping_params());
    let prior = resource
        .create(&secret_plan("s1", &first))
        .await
        .state
        .unwrap();

    let mut plan = prior.clone();
    plan.material.armored = "not an envelope".to_string();
    let response = resource.update(&prior, &plan).await;

    assert!(response.has_error());
    assert_eq!(response.state, Some(prior));
}

fn key_envelope() -> ExportedEnvelope {
    let jwk = serde_json::json!({"kty": "oct", "k": "AAECAwQFBgcICQoLDA0ODw"});
    ConfidentialDataHelper::<Vec<u8>>::new(ConfidentialObjectType::KeyVaultKey)
        .export(&serde_json::to_vec(&jwk).unwrap(), &wrapping_params())
        .unwrap()
}

#[tokio::test]
async fn test_key_lifecycle() {
    let env = TestEnv::new(false);
    let resource = key_resource(&env);
    let exported = key_envelope();

    let response = resource
        .create(&KeyVaultObjectModel::new(
            "k1",
            ConfidentialMaterial {
                armored: exported.armored.clone(),
                ..Default::default()
            },
        ))
        .await;
    assert!(!response.has_error(), "{:?}", response.diagnostics);
    let state = response.state.unwrap();
    let id = state.id.clone().unwrap();
    assert_eq!(id.coordinate.object_type, ObjectType::Keys);

    let stored = env.vault_a.get_object(&id).await.unwrap();
    match stored.content {
        ObjectContent::Key { jwk } => assert_eq!(jwk.kty, "oct"),
        other => panic!("unexpected content {:?}", other),
    }

    let mut plan = state.clone();
    plan.tags.insert("env".to_string(), "test".to_string());
    let updated = resource.update(&state, &plan).await;
    assert!(!updated.has_error(), "{:?}", updated.diagnostics);
    assert_eq!(updated.state.as_ref().unwrap().tags.get("env").map(String::as_str), Some("test"));

    let read = resource.read(&state).await;
    assert!(read.state.is_some());

    let deleted = resource.delete(&state).await;
    assert!(!deleted.has_error());
    assert!(deleted.state.is_none());

    // Disabled objects read as gone
    let read = resource.read(&state).await;
    assert!(!read.has_error(), "{:?}", read.diagnostics);
    assert!(read.state.is_none());

    // Deleting again is fine
    assert!(!resource.delete(&state).await.has_error());
}

#[tokio::test]
async fn test_delete_never_created() {
    let env = TestEnv::new(false);
    let response = secret_resource(&env)
        .delete(&KeyVaultObjectModel::default())
        .await;
    assert!(!response.has_error());
    assert!(response.state.is_none());
    assert_eq!(env.remote_calls(), 0);
}

/// Read/update that fails its lookup without saying why
struct SilentFailure;

#[async_trait]
impl ImmutableRu<KeyVaultKeySpecializer> for SilentFailure {
    async fn do_read(
        &self,
        _factory: &dyn AzClientsFactory,
        _state: &KeyVaultObjectModel,
    ) -> ReadResult<RemoteObject> {
        ReadResult::check_error(Diagnostics::new())
    }

    async fn do_update(
        &self,
        _factory: &dyn AzClientsFactory,
        _plan: &KeyVaultObjectModel,
    ) -> Result<RemoteObject, ConfidentialError> {
        unreachable!("not exercised")
    }
}

#[tokio::test]
async fn test_check_error_without_reason() {
    let env = TestEnv::new(false);
    let resource = ConfidentialResource::new(
        Arc::new(KeyVaultKeySpecializer::new()),
        ReadUpdate::Immutable(Arc::new(SilentFailure)),
        env.factory.clone(),
    );
    let state = KeyVaultObjectModel::new("k1", ConfidentialMaterial::default());

    let response = resource.read(&state).await;
    assert!(response.has_error());
    assert!(response.diagnostics.contains_summary(SUMMARY_MISSING_READ_ERROR));
    assert_eq!(response.state, Some(state));
}
