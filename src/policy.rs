//! Secondary-protection policy
//!
//! The header of every envelope carries the protection the producer asked
//! for. The hooks below evaluate it against an injected `now` and the
//! engine's configuration; each yields at most one [`Diagnostic`].

use crate::config::ConstraintMode;
use crate::diagnostics::{
    Diagnostic, SUMMARY_CREATE_WINDOW_CLOSED, SUMMARY_CREATE_WINDOW_IMMINENT, SUMMARY_EXPIRED,
    SUMMARY_EXPIRY_IMMINENT, SUMMARY_IMPLICIT_MOVE, SUMMARY_LAST_USE,
    SUMMARY_PROVIDER_CONSTRAINT, SUMMARY_USES_EXHAUSTED, SUMMARY_USES_INSECURE,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Warn at read when expiry is closer than this (seconds)
pub const EXPIRY_WARNING_WINDOW: i64 = 30 * 24 * 60 * 60;

/// Warn at create when the create window closes sooner than this (seconds)
pub const CREATE_WINDOW_WARNING_WINDOW: i64 = 24 * 60 * 60;

/// Uses value meaning "track if possible, never exhaust"
pub const UNLIMITED_TRACKED_USES: i32 = -1;

const REENCRYPT_HINT: &str = "re-encrypt and replace the ciphertext";

/// Protection parameters, serialized with the short header field names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryProtectionParameters {
    /// Create limit, epoch seconds; 0 = unlimited
    #[serde(rename = "cl", default)]
    pub create_limit: i64,
    /// Expiry, epoch seconds; 0 = unlimited
    #[serde(rename = "e", default)]
    pub expiry: i64,
    /// 0 = must not track, -1 = unlimited when tracking, >0 = limited
    #[serde(rename = "n", default)]
    pub num_uses: i32,
    #[serde(rename = "pc", default)]
    pub provider_constraints: BTreeSet<String>,
    #[serde(rename = "pl", default)]
    pub placement_constraints: BTreeSet<String>,
}

impl SecondaryProtectionParameters {
    pub fn limits_expiry(&self) -> bool {
        self.expiry > 0
    }

    pub fn limits_create(&self) -> bool {
        self.create_limit > 0
    }

    pub fn limits_uses(&self) -> bool {
        self.num_uses > 0
    }

    /// True when the uuid should be recorded in the tracking store
    pub fn wants_tracking(&self) -> bool {
        self.num_uses != 0
    }

    pub fn is_weakly_protected(&self) -> bool {
        !self.limits_expiry()
            && !self.limits_create()
            && !self.limits_uses()
            && self.provider_constraints.is_empty()
            && self.placement_constraints.is_empty()
    }

    /// `Key: value` lines for the informational armor headers
    pub fn armor_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if self.limits_create() {
            headers.push(("CreateLimit".to_string(), format_epoch(self.create_limit)));
        }
        if self.limits_expiry() {
            headers.push(("Expiry".to_string(), format_epoch(self.expiry)));
        }
        if self.num_uses != 0 {
            headers.push(("NumUses".to_string(), self.num_uses.to_string()));
        }
        if !self.provider_constraints.is_empty() {
            headers.push((
                "ProviderConstraints".to_string(),
                join(&self.provider_constraints),
            ));
        }
        if !self.placement_constraints.is_empty() {
            headers.push((
                "PlacementConstraints".to_string(),
                join(&self.placement_constraints),
            ));
        }
        headers
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn format_epoch(epoch: i64) -> String {
    match Utc.timestamp_opt(epoch, 0).single() {
        Some(t) => t.to_rfc3339(),
        None => epoch.to_string(),
    }
}

/// ExpiryExceeded: `e > 0 && now > e`
pub fn check_expiry_exceeded(
    params: &SecondaryProtectionParameters,
    now: DateTime<Utc>,
) -> Option<Diagnostic> {
    if params.limits_expiry() && now.timestamp() > params.expiry {
        Some(
            Diagnostic::error(
                SUMMARY_EXPIRED,
                format!(
                    "field e (expiry) is {}; the ciphertext can no longer be used",
                    format_epoch(params.expiry)
                ),
            )
            .with_suggestion(REENCRYPT_HINT),
        )
    } else {
        None
    }
}

/// ExpiryImminent: `e > 0 && e - now < 30 days`
pub fn check_expiry_imminent(
    params: &SecondaryProtectionParameters,
    now: DateTime<Utc>,
) -> Option<Diagnostic> {
    if params.limits_expiry() && params.expiry - now.timestamp() < EXPIRY_WARNING_WINDOW {
        Some(
            Diagnostic::warning(
                SUMMARY_EXPIRY_IMMINENT,
                format!(
                    "field e (expiry) is {}, less than 30 days away",
                    format_epoch(params.expiry)
                ),
            )
            .with_suggestion(REENCRYPT_HINT),
        )
    } else {
        None
    }
}

/// CreateWindowExceeded: `cl > 0 && now > cl`
pub fn check_create_window_exceeded(
    params: &SecondaryProtectionParameters,
    now: DateTime<Utc>,
) -> Option<Diagnostic> {
    if params.limits_create() && now.timestamp() > params.create_limit {
        Some(
            Diagnostic::error(
                SUMMARY_CREATE_WINDOW_CLOSED,
                format!(
                    "field cl (create limit) is {}; new objects can no longer be created from this ciphertext",
                    format_epoch(params.create_limit)
                ),
            )
            .with_suggestion(REENCRYPT_HINT),
        )
    } else {
        None
    }
}

/// CreateWindowImminent: `cl > 0 && cl - now < 24h`
pub fn check_create_window_imminent(
    params: &SecondaryProtectionParameters,
    now: DateTime<Utc>,
) -> Option<Diagnostic> {
    if params.limits_create()
        && params.create_limit - now.timestamp() < CREATE_WINDOW_WARNING_WINDOW
    {
        Some(Diagnostic::warning(
            SUMMARY_CREATE_WINDOW_IMMINENT,
            format!(
                "field cl (create limit) is {}, less than 24 hours away",
                format_epoch(params.create_limit)
            ),
        ))
    } else {
        None
    }
}

/// PlacementViolated: destination label not in a non-empty `pl`
pub fn check_placement(
    params: &SecondaryProtectionParameters,
    destination_label: &str,
) -> Option<Diagnostic> {
    if params.placement_constraints.is_empty()
        || params.placement_constraints.contains(destination_label)
    {
        return None;
    }
    Some(
        Diagnostic::error(
            SUMMARY_IMPLICIT_MOVE,
            format!(
                "field pl (placement constraints) does not allow {}; allowed: {}",
                destination_label,
                join(&params.placement_constraints)
            ),
        )
        .with_suggestion("create the object at one of the allowed destinations"),
    )
}

/// ProviderMismatch: the engine's label is not in a non-empty `pc`
pub fn check_provider(
    params: &SecondaryProtectionParameters,
    provider_label: Option<&str>,
    mode: ConstraintMode,
) -> Option<Diagnostic> {
    if params.provider_constraints.is_empty() {
        return None;
    }
    if let Some(label) = provider_label {
        if params.provider_constraints.contains(label) {
            return None;
        }
    }

    let detail = format!(
        "field pc (provider constraints) requires one of [{}]; this provider is labelled '{}'",
        join(&params.provider_constraints),
        provider_label.unwrap_or("")
    );
    let diagnostic = match mode {
        ConstraintMode::Strict => Diagnostic::error(SUMMARY_PROVIDER_CONSTRAINT, detail),
        ConstraintMode::ProviderLevel => Diagnostic::warning(SUMMARY_PROVIDER_CONSTRAINT, detail),
    };
    Some(diagnostic.with_suggestion("use a provider configured with a matching label"))
}

/// UsesInsecure: `n > 0` while tracking is disabled
pub fn check_uses_insecure(
    params: &SecondaryProtectionParameters,
    tracking_enabled: bool,
) -> Option<Diagnostic> {
    if params.limits_uses() && !tracking_enabled {
        Some(
            Diagnostic::error(
                SUMMARY_USES_INSECURE,
                format!(
                    "field n (num uses) is {} but object tracking is disabled",
                    params.num_uses
                ),
            )
            .with_suggestion("enable object tracking on the provider"),
        )
    } else {
        None
    }
}

/// UsesExhausted: `n > 0 && tracked >= n`
pub fn check_uses_exhausted(
    params: &SecondaryProtectionParameters,
    tracked_uses: u64,
) -> Option<Diagnostic> {
    if params.limits_uses() && tracked_uses >= params.num_uses as u64 {
        Some(
            Diagnostic::error(
                SUMMARY_USES_EXHAUSTED,
                format!(
                    "field n (num uses) allows {} uses; {} recorded",
                    params.num_uses, tracked_uses
                ),
            )
            .with_suggestion(REENCRYPT_HINT),
        )
    } else {
        None
    }
}

/// LastUseWarning: `n > 1` and this create consumed the final use
pub fn check_last_use(
    params: &SecondaryProtectionParameters,
    tracked_after_create: u64,
) -> Option<Diagnostic> {
    if params.num_uses > 1 && tracked_after_create == params.num_uses as u64 {
        Some(Diagnostic::warning(
            SUMMARY_LAST_USE,
            format!(
                "field n (num uses) allows {} uses and all are now consumed",
                params.num_uses
            ),
        ))
    } else {
        None
    }
}
