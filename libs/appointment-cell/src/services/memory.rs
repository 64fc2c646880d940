use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, NewAppointment, PatientProfile};
use crate::services::conflict::within_conflict_window;
use crate::services::directory::PatientDirectory;
use crate::services::store::{AppointmentStore, StoreError};

/// Process-local store. The overlap constraint is checked inside the write
/// lock, so concurrent inserts for one slot cannot both succeed.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a record as-is, bypassing the overlap constraint. Used to set up
    /// historical or administratively-transitioned records.
    pub async fn seed(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }
}

fn newest_first(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|a| (Reverse(a.scheduled_at), a.id));
    appointments
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let overlaps = appointments
            .values()
            .any(|existing| existing.is_active() && within_conflict_window(existing.scheduled_at, appointment.scheduled_at));

        if appointment.status.is_active() && overlaps {
            return Err(StoreError::SlotTaken);
        }

        let record = appointment.into_appointment(Uuid::new_v4());
        appointments.insert(record.id, record.clone());
        debug!("Stored appointment {} at {}", record.id, record.scheduled_at);

        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_by_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let matching = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.patient_id == patient_id)
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();

        Ok(newest_first(matching))
    }

    async fn find_active_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut matching: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.is_active() && a.scheduled_at > from && a.scheduled_at < to)
            .cloned()
            .collect();

        matching.sort_by_key(|a| (a.scheduled_at, a.id));
        Ok(matching)
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, StoreError> {
        let all = self.appointments.read().await.values().cloned().collect();
        Ok(newest_first(all))
    }

    async fn mark_cancelled_by_patient(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let mut appointments = self.appointments.write().await;

        Ok(appointments.get_mut(&id).map(|appointment| {
            appointment.status = AppointmentStatus::Cancelled;
            appointment.cancelled_by_patient = true;
            appointment.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.appointments.write().await.remove(&id).is_some())
    }
}

/// Process-local patient directory, filled from a seed file or by tests.
#[derive(Default)]
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<Uuid, PatientProfile>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = PatientProfile>) -> Self {
        Self {
            patients: RwLock::new(profiles.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Reads a JSON array of `{ id, last_name, first_name }` objects.
    pub async fn from_seed_file(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading patient seed file {}", path.display()))?;
        let profiles: Vec<PatientProfile> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing patient seed file {}", path.display()))?;

        Ok(Self::from_profiles(profiles))
    }

    pub async fn len(&self) -> usize {
        self.patients.read().await.len()
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_patient(&self, id: Uuid) -> Result<Option<PatientProfile>, StoreError> {
        Ok(self.patients.read().await.get(&id).cloned())
    }

    async fn find_patients(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, PatientProfile>, StoreError> {
        let patients = self.patients.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| patients.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, hour, minute, 0).unwrap()
    }

    fn planned(patient_id: Uuid, scheduled_at: DateTime<Utc>) -> NewAppointment {
        NewAppointment::planned(patient_id, scheduled_at, "Consultation".into(), at(8, 0))
    }

    #[tokio::test]
    async fn insert_enforces_overlap_constraint() {
        let store = InMemoryAppointmentStore::new();
        let patient = Uuid::new_v4();

        store.insert(planned(patient, at(10, 0))).await.unwrap();

        assert!(matches!(store.insert(planned(patient, at(10, 59))).await, Err(StoreError::SlotTaken)));
        assert!(store.insert(planned(patient, at(11, 0))).await.is_ok());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn cancelled_records_free_their_slot() {
        let store = InMemoryAppointmentStore::new();
        let patient = Uuid::new_v4();

        let first = store.insert(planned(patient, at(10, 0))).await.unwrap();
        store.mark_cancelled_by_patient(first.id).await.unwrap();

        assert!(store.insert(planned(patient, at(10, 0))).await.is_ok());
    }

    #[tokio::test]
    async fn range_query_is_exclusive_and_active_only() {
        let store = InMemoryAppointmentStore::new();
        let patient = Uuid::new_v4();

        let inside = store.insert(planned(patient, at(10, 0))).await.unwrap();
        let mut edge = planned(patient, at(12, 0)).into_appointment(Uuid::new_v4());
        edge.status = AppointmentStatus::Confirmed;
        store.seed(edge).await;
        let mut done = planned(patient, at(11, 0)).into_appointment(Uuid::new_v4());
        done.status = AppointmentStatus::Completed;
        store.seed(done).await;

        let found = store.find_active_between(at(9, 0), at(12, 0)).await.unwrap();
        assert_eq!(found.iter().map(|a| a.id).collect::<Vec<_>>(), vec![inside.id]);

        let widened = store.find_active_between(at(9, 0), at(12, 0) + Duration::minutes(1)).await.unwrap();
        assert_eq!(widened.len(), 2);
    }

    #[tokio::test]
    async fn patient_listing_is_newest_first_and_filterable() {
        let store = InMemoryAppointmentStore::new();
        let patient = Uuid::new_v4();

        let early = store.insert(planned(patient, at(9, 0))).await.unwrap();
        let late = store.insert(planned(patient, at(15, 0))).await.unwrap();
        store.insert(planned(Uuid::new_v4(), at(12, 0))).await.unwrap();
        store.mark_cancelled_by_patient(early.id).await.unwrap();

        let all = store.find_by_patient(patient, None).await.unwrap();
        assert_eq!(all.iter().map(|a| a.id).collect::<Vec<_>>(), vec![late.id, early.id]);

        let cancelled = store.find_by_patient(patient, Some(AppointmentStatus::Cancelled)).await.unwrap();
        assert_eq!(cancelled.len(), 1);
        assert!(cancelled[0].cancelled_by_patient);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = InMemoryAppointmentStore::new();
        let record = store.insert(planned(Uuid::new_v4(), at(10, 0))).await.unwrap();

        assert!(store.delete(record.id).await.unwrap());
        assert!(!store.delete(record.id).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn directory_batch_lookup_skips_unknown_ids() {
        let known = PatientProfile { id: Uuid::new_v4(), last_name: "Martin".into(), first_name: "Pierre".into() };
        let directory = InMemoryPatientDirectory::from_profiles([known.clone()]);

        let found = directory.find_patients(&[known.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[&known.id], known);
    }
}
