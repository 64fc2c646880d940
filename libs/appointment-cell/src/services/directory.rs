use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::PatientProfile;
use crate::services::store::StoreError;

/// Read-only view onto the externally managed patient registry.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn find_patient(&self, id: Uuid) -> Result<Option<PatientProfile>, StoreError>;

    /// Batch lookup; unknown ids are simply absent from the map.
    async fn find_patients(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, PatientProfile>, StoreError>;
}
