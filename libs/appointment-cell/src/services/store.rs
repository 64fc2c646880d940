use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, NewAppointment};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert rejected by the store's own no-overlap constraint.
    #[error("slot conflicts with an existing active appointment")]
    SlotTaken,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Persistence for appointment records.
///
/// Every method re-reads current state; implementations must be safe under
/// concurrent callers. Listings are ordered by `scheduled_at` descending
/// unless stated otherwise.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Persists a new record and assigns its id. Must fail with
    /// `SlotTaken` when an active record sits inside the conflict window.
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn find_by_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Active records with `from < scheduled_at < to`, ascending.
    async fn find_active_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Appointment>, StoreError>;

    /// Sets `CANCELLED` and `cancelled_by_patient` in one write. `None` when
    /// the record no longer exists.
    async fn mark_cancelled_by_patient(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}
