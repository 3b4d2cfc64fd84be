//! Resource lifecycle engine
//!
//! [`ConfidentialResource`] drives create/read/update/delete for one kind of
//! remote object. What the object is comes from a [`Specializer`]; whether
//! its content can change after creation comes from [`ReadUpdate`].
//!
//! Operations never fail with `Err`. They return a [`ResourceResponse`]
//! whose diagnostics say what happened; the first error diagnostic stops
//! the call.

use super::drift::is_drift_message;
use super::existence::{ReadResult, ResourceExistence};
use crate::coordinate::WrappingKeyCoordinate;
use crate::diagnostics::{
    Diagnostic, Diagnostics, SUMMARY_CONFIGURATION, SUMMARY_CREATE_FAILED,
    SUMMARY_DECRYPT_FAILED, SUMMARY_DELETE_FAILED, SUMMARY_MISSING_READ_ERROR,
    SUMMARY_TRACKING_FAILED, SUMMARY_UPDATE_FAILED,
};
use crate::factory::AzClientsFactory;
use crate::model::{ConfidentialDataHeader, ConfidentialObjectType};
use crate::policy::{
    check_create_window_exceeded, check_create_window_imminent, check_expiry_exceeded,
    check_expiry_imminent, check_last_use, check_uses_exhausted, check_uses_insecure,
};
use crate::ports::RsaDecrypter;
use crate::tracking::UseReservation;
use crate::ConfidentialError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use confidential_protocol::{dearmor_envelope, Envelope};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Armored envelope plus the key that unwraps it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfidentialMaterial {
    pub armored: String,
    pub wrapping_key: WrappingKeyCoordinate,
}

/// Knows how to talk to one kind of remote object
#[async_trait]
pub trait Specializer: Send + Sync {
    /// Local (desired or recorded) state
    type Model: Clone + Send + Sync;
    /// Decrypted confidential value
    type Data: Send + Sync;
    /// Remote object representation
    type Remote: Send + Sync;

    fn object_type(&self) -> ConfidentialObjectType;

    fn new_model(&self) -> Self::Model;

    fn convert_to_remote(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &Self::Model,
        data: &Self::Data,
    ) -> Result<Self::Remote, ConfidentialError>;

    /// New local state from what the remote side holds
    fn convert_to_local(&self, remote: &Self::Remote, plan: &Self::Model) -> Self::Model;

    fn confidential_material(&self, model: &Self::Model) -> ConfidentialMaterial;

    async fn decrypt(
        &self,
        envelope: &Envelope,
        decrypter: &dyn RsaDecrypter,
    ) -> Result<(ConfidentialDataHeader, Self::Data), ConfidentialError>;

    fn check_placement(
        &self,
        factory: &dyn AzClientsFactory,
        header: &ConfidentialDataHeader,
        plan: &Self::Model,
    ) -> Option<Diagnostic>;

    async fn do_create(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &Self::Model,
        data: &Self::Data,
    ) -> Result<Self::Remote, ConfidentialError>;

    /// Disable the remote object; objects are never hard-deleted
    async fn do_delete(
        &self,
        factory: &dyn AzClientsFactory,
        state: &Self::Model,
    ) -> Result<(), ConfidentialError>;
}

/// Read/update for objects whose content is fixed at creation
#[async_trait]
pub trait ImmutableRu<S: Specializer>: Send + Sync {
    async fn do_read(
        &self,
        factory: &dyn AzClientsFactory,
        state: &S::Model,
    ) -> ReadResult<S::Remote>;

    /// Update attributes only
    async fn do_update(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &S::Model,
    ) -> Result<S::Remote, ConfidentialError>;
}

/// Read/update for objects whose content may drift
#[async_trait]
pub trait MutableRu<S: Specializer>: Send + Sync {
    /// `data` is `None` when the state already holds a drift marker
    async fn do_read(
        &self,
        factory: &dyn AzClientsFactory,
        state: &S::Model,
        data: Option<&S::Data>,
    ) -> ReadResult<S::Remote>;

    async fn do_update(
        &self,
        factory: &dyn AzClientsFactory,
        plan: &S::Model,
        data: &S::Data,
    ) -> Result<S::Remote, ConfidentialError>;

    /// Replace the armored envelope in `state` with the drift marker
    fn set_drift_to_confidential_data(&self, state: &mut S::Model);
}

pub enum ReadUpdate<S: Specializer> {
    Immutable(Arc<dyn ImmutableRu<S>>),
    Mutable(Arc<dyn MutableRu<S>>),
}

impl<S: Specializer> Clone for ReadUpdate<S> {
    fn clone(&self) -> Self {
        match self {
            ReadUpdate::Immutable(ru) => ReadUpdate::Immutable(ru.clone()),
            ReadUpdate::Mutable(ru) => ReadUpdate::Mutable(ru.clone()),
        }
    }
}

/// New state to persist plus what happened on the way
///
/// `state` is `None` when nothing should be persisted: after a failed create
/// or a successful delete, or when a read found the object gone.
#[derive(Debug, Clone)]
pub struct ResourceResponse<M> {
    pub state: Option<M>,
    pub diagnostics: Diagnostics,
}

impl<M> ResourceResponse<M> {
    fn new(state: Option<M>, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct ConfidentialResource<S: Specializer> {
    specializer: Arc<S>,
    read_update: ReadUpdate<S>,
    factory: Arc<dyn AzClientsFactory>,
    clock: Clock,
}

/// Push `diagnostic`; true when it is an error and the call must stop
fn stops(diagnostics: &mut Diagnostics, diagnostic: Option<Diagnostic>) -> bool {
    match diagnostic {
        Some(d) => {
            let fatal = d.is_error();
            diagnostics.push(d);
            fatal
        }
        None => false,
    }
}

impl<S: Specializer + 'static> ConfidentialResource<S> {
    pub fn new(
        specializer: Arc<S>,
        read_update: ReadUpdate<S>,
        factory: Arc<dyn AzClientsFactory>,
    ) -> Self {
        Self {
            specializer,
            read_update,
            factory,
            clock: Arc::new(Utc::now),
        }
    }

    /// Evaluate time-based policy against a fixed clock
    #[must_use]
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn specializer(&self) -> &S {
        &self.specializer
    }

    pub fn new_model(&self) -> S::Model {
        self.specializer.new_model()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn try_open(
        &self,
        model: &S::Model,
    ) -> Result<(ConfidentialDataHeader, S::Data), ConfidentialError> {
        let material = self.specializer.confidential_material(model);
        let envelope = dearmor_envelope(&material.armored)?;
        let coordinate = self
            .factory
            .merge_wrapping_key_coordinate(&material.wrapping_key)?;
        let decrypter = self.factory.decrypter_for(&coordinate).await?;
        self.specializer.decrypt(&envelope, decrypter.as_ref()).await
    }

    /// Dearmor, resolve the decrypter and decrypt the model's material
    async fn open(
        &self,
        model: &S::Model,
    ) -> Result<(ConfidentialDataHeader, S::Data), Diagnostic> {
        self.try_open(model).await.map_err(|err| {
            let summary = match err {
                ConfidentialError::Config(_) => SUMMARY_CONFIGURATION,
                _ => SUMMARY_DECRYPT_FAILED,
            };
            warn!(error_code = err.error_code(), "cannot open confidential material");
            Diagnostic::from_error(summary, &err)
        })
    }

    /// Consume one use of a limited ciphertext ahead of the remote write
    ///
    /// Returns the count this call reserved, or `None` when the ciphertext
    /// has no use limit. A reserved use is never handed back, so a failed
    /// write leaves the count one higher than the objects created.
    async fn reserve_use(
        &self,
        header: &ConfidentialDataHeader,
    ) -> Result<Option<u64>, Diagnostic> {
        let protection = &header.protection;
        if !protection.limits_uses() {
            return Ok(None);
        }
        let limit = protection.num_uses as u64;
        match self.factory.reserve_object_use(&header.uuid, limit).await {
            Ok(UseReservation::Reserved(count)) => {
                info!(uuid = %header.uuid, uses = count, limit, "reserved object use");
                Ok(Some(count))
            }
            Ok(UseReservation::Exhausted(used)) => {
                warn!(uuid = %header.uuid, uses = used, limit, "ciphertext uses exhausted");
                check_uses_exhausted(protection, used).map_or(Ok(None), Err)
            }
            Err(err) => Err(Diagnostic::from_error(SUMMARY_TRACKING_FAILED, &err.into())),
        }
    }

    /// True when `plan` re-applies the envelope `prior` already deployed
    async fn redeploys(
        &self,
        prior: &S::Model,
        plan: &S::Model,
        header: &ConfidentialDataHeader,
    ) -> bool {
        let deployed = self.specializer.confidential_material(prior).armored;
        if is_drift_message(&deployed) {
            // deployed envelope unknown; a tracked uuid is taken as this one
            return matches!(self.factory.is_object_id_tracked(&header.uuid).await, Ok(true));
        }
        let planned = self.specializer.confidential_material(plan).armored;
        match (dearmor_envelope(&deployed), dearmor_envelope(&planned)) {
            (Ok(deployed), Ok(planned)) => deployed == planned,
            _ => false,
        }
    }

    pub async fn create(&self, plan: &S::Model) -> ResourceResponse<S::Model> {
        let mut diagnostics = Diagnostics::new();
        let now = self.now();
        let factory = self.factory.as_ref();

        let (header, data) = match self.open(plan).await {
            Ok(opened) => opened,
            Err(d) => return ResourceResponse::new(None, d.into()),
        };
        let protection = &header.protection;
        let tracking = factory.is_object_tracking_enabled();
        debug!(uuid = %header.uuid, object_type = %header.object_type, "creating object");

        let ordered = [
            check_expiry_exceeded(protection, now),
            check_create_window_exceeded(protection, now),
            check_create_window_imminent(protection, now),
            factory.provider_constraint_diagnostics(protection),
            self.specializer.check_placement(factory, &header, plan),
            check_uses_insecure(protection, tracking),
        ];
        for diagnostic in ordered {
            if stops(&mut diagnostics, diagnostic) {
                return ResourceResponse::new(None, diagnostics);
            }
        }

        // UsesExhausted is decided by the reservation itself
        let reserved = match self.reserve_use(&header).await {
            Ok(reserved) => reserved,
            Err(d) => {
                diagnostics.push(d);
                return ResourceResponse::new(None, diagnostics);
            }
        };

        let remote = match self.specializer.do_create(factory, plan, &data).await {
            Ok(remote) => remote,
            Err(err) => {
                if reserved.is_some() {
                    warn!(uuid = %header.uuid, "create failed; the reserved use stays consumed");
                }
                diagnostics.push(Diagnostic::from_error(SUMMARY_CREATE_FAILED, &err));
                return ResourceResponse::new(None, diagnostics);
            }
        };
        let state = self.specializer.convert_to_local(&remote, plan);

        if let Some(count) = reserved {
            if let Some(last_use) = check_last_use(protection, count) {
                diagnostics.push(last_use);
            }
        } else if tracking && protection.wants_tracking() {
            match factory.track_object_id(&header.uuid).await {
                Ok(count) => {
                    info!(uuid = %header.uuid, uses = count, "tracked object id");
                    if let Some(last_use) = check_last_use(protection, count) {
                        diagnostics.push(last_use);
                    }
                }
                Err(err) => {
                    // object exists; keep its state so it is not orphaned
                    diagnostics.push(Diagnostic::from_error(
                        SUMMARY_TRACKING_FAILED,
                        &err.into(),
                    ));
                }
            }
        }

        ResourceResponse::new(Some(state), diagnostics)
    }

    pub async fn read(&self, state: &S::Model) -> ResourceResponse<S::Model> {
        match &self.read_update {
            ReadUpdate::Immutable(ru) => {
                let result = ru.do_read(self.factory.as_ref(), state).await;
                self.apply_read(state, result, Diagnostics::new(), None)
            }
            ReadUpdate::Mutable(ru) => self.read_mutable(ru.as_ref(), state).await,
        }
    }

    async fn read_mutable(
        &self,
        ru: &dyn MutableRu<S>,
        state: &S::Model,
    ) -> ResourceResponse<S::Model> {
        let mut diagnostics = Diagnostics::new();
        let factory = self.factory.as_ref();
        let material = self.specializer.confidential_material(state);

        let data = if is_drift_message(&material.armored) {
            debug!("state holds a drift marker; skipping decryption");
            None
        } else {
            let (header, data) = match self.open(state).await {
                Ok(opened) => opened,
                Err(d) => {
                    diagnostics.push(d);
                    return ResourceResponse::new(Some(state.clone()), diagnostics);
                }
            };
            let now = self.now();
            let checks = [
                check_expiry_exceeded(&header.protection, now),
                check_expiry_imminent(&header.protection, now),
                self.specializer.check_placement(factory, &header, state),
            ];
            for diagnostic in checks {
                if stops(&mut diagnostics, diagnostic) {
                    return ResourceResponse::new(Some(state.clone()), diagnostics);
                }
            }
            Some(data)
        };

        let result = ru.do_read(factory, state, data.as_ref()).await;
        self.apply_read(state, result, diagnostics, Some(ru))
    }

    fn apply_read(
        &self,
        state: &S::Model,
        result: ReadResult<S::Remote>,
        mut diagnostics: Diagnostics,
        mutable: Option<&dyn MutableRu<S>>,
    ) -> ResourceResponse<S::Model> {
        let ReadResult {
            object,
            existence,
            diagnostics: read_diagnostics,
        } = result;
        diagnostics.extend(read_diagnostics);

        match (existence, object) {
            (ResourceExistence::NotFound, _) => {
                info!(object_type = %self.specializer.object_type(), "remote object is gone");
                ResourceResponse::new(None, diagnostics)
            }
            (ResourceExistence::Exists, Some(remote)) => {
                let local = self.specializer.convert_to_local(&remote, state);
                ResourceResponse::new(Some(local), diagnostics)
            }
            (ResourceExistence::ConfidentialDataDrift, Some(remote)) => {
                let mut local = self.specializer.convert_to_local(&remote, state);
                if let Some(ru) = mutable {
                    warn!(object_type = %self.specializer.object_type(), "confidential data drift");
                    ru.set_drift_to_confidential_data(&mut local);
                }
                ResourceResponse::new(Some(local), diagnostics)
            }
            (ResourceExistence::CheckError, _) => {
                if !diagnostics.has_error() {
                    diagnostics.add_error(
                        SUMMARY_MISSING_READ_ERROR,
                        "the object lookup failed without reporting a reason",
                    );
                }
                ResourceResponse::new(Some(state.clone()), diagnostics)
            }
            _ => ResourceResponse::new(Some(state.clone()), diagnostics),
        }
    }

    /// Returns `prior` as the state when the update fails
    pub async fn update(&self, prior: &S::Model, plan: &S::Model) -> ResourceResponse<S::Model> {
        let factory = self.factory.as_ref();
        let mut diagnostics = Diagnostics::new();

        let ru = match &self.read_update {
            ReadUpdate::Immutable(ru) => {
                return match ru.do_update(factory, plan).await {
                    Ok(remote) => ResourceResponse::new(
                        Some(self.specializer.convert_to_local(&remote, plan)),
                        diagnostics,
                    ),
                    Err(err) => {
                        diagnostics.push(Diagnostic::from_error(SUMMARY_UPDATE_FAILED, &err));
                        ResourceResponse::new(Some(prior.clone()), diagnostics)
                    }
                };
            }
            ReadUpdate::Mutable(ru) => ru,
        };

        let (header, data) = match self.open(plan).await {
            Ok(opened) => opened,
            Err(d) => return ResourceResponse::new(Some(prior.clone()), d.into()),
        };
        let protection = &header.protection;
        let tracking = factory.is_object_tracking_enabled();
        let checks = [
            check_expiry_exceeded(protection, self.now()),
            factory.provider_constraint_diagnostics(protection),
            self.specializer.check_placement(factory, &header, plan),
            check_uses_insecure(protection, tracking),
        ];
        for diagnostic in checks {
            if stops(&mut diagnostics, diagnostic) {
                return ResourceResponse::new(Some(prior.clone()), diagnostics);
            }
        }

        // New ciphertext consumes a use like a create; re-applying does not
        let reserved = if !protection.limits_uses() || self.redeploys(prior, plan, &header).await {
            None
        } else {
            match self.reserve_use(&header).await {
                Ok(reserved) => reserved,
                Err(d) => {
                    diagnostics.push(d);
                    return ResourceResponse::new(Some(prior.clone()), diagnostics);
                }
            }
        };

        let remote = match ru.do_update(factory, plan, &data).await {
            Ok(remote) => remote,
            Err(err) => {
                diagnostics.push(Diagnostic::from_error(SUMMARY_UPDATE_FAILED, &err));
                return ResourceResponse::new(Some(prior.clone()), diagnostics);
            }
        };
        let state = self.specializer.convert_to_local(&remote, plan);

        if let Some(count) = reserved {
            if let Some(last_use) = check_last_use(protection, count) {
                diagnostics.push(last_use);
            }
        } else if tracking && protection.wants_tracking() {
            let tracked = match factory.is_object_id_tracked(&header.uuid).await {
                Ok(true) => Ok(None),
                Ok(false) => factory.track_object_id(&header.uuid).await.map(Some),
                Err(err) => Err(err),
            };
            match tracked {
                Ok(Some(count)) => info!(uuid = %header.uuid, uses = count, "tracked object id"),
                Ok(None) => {}
                Err(err) => diagnostics.push(Diagnostic::from_error(
                    SUMMARY_TRACKING_FAILED,
                    &err.into(),
                )),
            }
        }

        ResourceResponse::new(Some(state), diagnostics)
    }

    pub async fn delete(&self, state: &S::Model) -> ResourceResponse<S::Model> {
        match self.specializer.do_delete(self.factory.as_ref(), state).await {
            Ok(()) => ResourceResponse::new(None, Diagnostics::new()),
            Err(err) => ResourceResponse::new(
                Some(state.clone()),
                Diagnostic::from_error(SUMMARY_DELETE_FAILED, &err).into(),
            ),
        }
    }
}
