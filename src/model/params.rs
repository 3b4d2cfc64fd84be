use crate::coordinate::AzKeyVaultObjectCoordinate;
use crate::policy::SecondaryProtectionParameters;
use chrono::{DateTime, Duration, Utc};
use confidential_crypto::rsa::RsaPublicKey;
use confidential_crypto::{public_key_from_pem, KeyMaterialError};
use std::collections::BTreeSet;

/// Producer-side wrapping options
///
/// Durations are relative; [`ContentWrappingParams::protection_at`] turns
/// them into absolute epoch limits for a given `now`.
///
/// # Example
///
/// ```no_run
/// use az_confidential::model::ContentWrappingParams;
/// use chrono::Duration;
///
/// # fn example(pem: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
/// let params = ContentWrappingParams::from_public_key_pem(pem)?
///     .expires_in(Duration::days(90))
///     .num_uses(1)
///     .provider_constraint("prod");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ContentWrappingParams {
    public_key: RsaPublicKey,
    create_within: Option<Duration>,
    expires_in: Option<Duration>,
    num_uses: i32,
    provider_constraints: BTreeSet<String>,
    placement_constraints: BTreeSet<String>,
}

impl ContentWrappingParams {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self {
            public_key,
            create_within: None,
            expires_in: None,
            num_uses: 0,
            provider_constraints: BTreeSet::new(),
            placement_constraints: BTreeSet::new(),
        }
    }

    pub fn from_public_key_pem(pem: &[u8]) -> Result<Self, KeyMaterialError> {
        Ok(Self::new(public_key_from_pem(pem)?))
    }

    /// Objects must be created within this duration
    #[must_use]
    pub fn create_within(mut self, window: Duration) -> Self {
        self.create_within = Some(window);
        self
    }

    #[must_use]
    pub fn expires_in(mut self, lifetime: Duration) -> Self {
        self.expires_in = Some(lifetime);
        self
    }

    /// 0 = untracked, -1 = tracked without limit, >0 = limited
    #[must_use]
    pub fn num_uses(mut self, uses: i32) -> Self {
        self.num_uses = uses;
        self
    }

    #[must_use]
    pub fn provider_constraint(mut self, label: impl Into<String>) -> Self {
        self.provider_constraints.insert(label.into());
        self
    }

    #[must_use]
    pub fn placement(mut self, coordinate: &AzKeyVaultObjectCoordinate) -> Self {
        self.placement_constraints.insert(coordinate.canonical_label());
        self
    }

    /// Placement given as an already-rendered label
    #[must_use]
    pub fn placement_label(mut self, label: impl Into<String>) -> Self {
        self.placement_constraints.insert(label.into());
        self
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn protection_at(&self, now: DateTime<Utc>) -> SecondaryProtectionParameters {
        let absolute = |d: Option<Duration>| d.map_or(0, |d| (now + d).timestamp());
        SecondaryProtectionParameters {
            create_limit: absolute(self.create_within),
            expiry: absolute(self.expires_in),
            num_uses: self.num_uses,
            provider_constraints: self.provider_constraints.clone(),
            placement_constraints: self.placement_constraints.clone(),
        }
    }
}
