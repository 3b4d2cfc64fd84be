//! Object tracking store
//!
//! A small durable map from envelope uuid to use count. Counts only ever
//! grow. `track` and `track_if_below` are each one atomic read-modify-write;
//! the engine gates limited-use creates on `track_if_below`, so concurrent
//! creates from the same envelope cannot both pass the limit check.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Object tracking is disabled")]
    Disabled,

    #[error("Invalid object id '{0}': expected a UUID")]
    InvalidId(String),

    #[error("Tracking store unavailable: {0}")]
    Unavailable(String),
}

impl TrackingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackingError::Unavailable(_))
    }
}

/// Outcome of [`ObjectTracker::track_if_below`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseReservation {
    /// One use recorded; holds the new count
    Reserved(u64),
    /// The limit was already reached; holds the recorded count
    Exhausted(u64),
}

#[async_trait]
pub trait ObjectTracker: Send + Sync {
    async fn is_tracked(&self, uuid: &str) -> Result<bool, TrackingError>;

    /// Record one more use and return the new count
    async fn track(&self, uuid: &str) -> Result<u64, TrackingError>;

    /// Recorded uses; 0 for an unknown uuid
    async fn uses(&self, uuid: &str) -> Result<u64, TrackingError>;

    /// Record one more use only while the count is below `limit`
    async fn track_if_below(
        &self,
        uuid: &str,
        limit: u64,
    ) -> Result<UseReservation, TrackingError>;
}

/// Process-local tracker
#[derive(Debug, Default)]
pub struct InMemoryObjectTracker {
    counts: Mutex<HashMap<String, u64>>,
}

impl InMemoryObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a count, e.g. when restoring from persisted state
    pub async fn seed(&self, uuid: &str, count: u64) -> Result<(), TrackingError> {
        let key = normalize(uuid)?;
        self.counts.lock().await.insert(key, count);
        Ok(())
    }
}

fn normalize(uuid: &str) -> Result<String, TrackingError> {
    uuid::Uuid::parse_str(uuid)
        .map(|u| u.hyphenated().to_string())
        .map_err(|_| TrackingError::InvalidId(uuid.to_string()))
}

#[async_trait]
impl ObjectTracker for InMemoryObjectTracker {
    async fn is_tracked(&self, uuid: &str) -> Result<bool, TrackingError> {
        let key = normalize(uuid)?;
        Ok(self.counts.lock().await.contains_key(&key))
    }

    async fn track(&self, uuid: &str) -> Result<u64, TrackingError> {
        let key = normalize(uuid)?;
        let mut counts = self.counts.lock().await;
        let count = counts.entry(key).or_insert(0);
        *count += 1;
        debug!(uuid = %uuid, uses = *count, "tracked object id");
        Ok(*count)
    }

    async fn uses(&self, uuid: &str) -> Result<u64, TrackingError> {
        let key = normalize(uuid)?;
        Ok(self.counts.lock().await.get(&key).copied().unwrap_or(0))
    }

    async fn track_if_below(
        &self,
        uuid: &str,
        limit: u64,
    ) -> Result<UseReservation, TrackingError> {
        let key = normalize(uuid)?;
        let mut counts = self.counts.lock().await;
        let recorded = counts.get(&key).copied().unwrap_or(0);
        if recorded >= limit {
            debug!(uuid = %uuid, uses = recorded, limit, "use limit reached");
            return Ok(UseReservation::Exhausted(recorded));
        }
        counts.insert(key, recorded + 1);
        debug!(uuid = %uuid, uses = recorded + 1, limit, "reserved object use");
        Ok(UseReservation::Reserved(recorded + 1))
    }
}
