// libs/appointment-cell/src/services/supabase.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_database::supabase::{ApiStatusError, SupabaseClient};

use crate::models::{Appointment, AppointmentStatus, NewAppointment, PatientProfile};
use crate::services::directory::PatientDirectory;
use crate::services::store::{AppointmentStore, StoreError};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const PATIENTS_PATH: &str = "/rest/v1/patients";

// SQLSTATE raised by the `appointments_no_overlap` constraint.
const EXCLUSION_VIOLATION: &str = "23P01";

fn classify(err: anyhow::Error) -> StoreError {
    if let Some(status) = err.downcast_ref::<ApiStatusError>() {
        if status.is_conflict() && status.postgres_code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return StoreError::SlotTaken;
        }
        return StoreError::Unavailable(status.to_string());
    }

    if err.downcast_ref::<serde_json::Error>().is_some() {
        return StoreError::Corrupt(err.to_string());
    }

    if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>() {
        if reqwest_err.is_decode() {
            return StoreError::Corrupt(reqwest_err.to_string());
        }
    }

    StoreError::Unavailable(err.to_string())
}

fn encode_time(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339()).into_owned()
}

/// Appointment rows in the `appointments` table behind PostgREST. The
/// no-overlap rule is an exclusion constraint on that table; its 409 is
/// surfaced as `SlotTaken`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        self.supabase
            .request::<T>(Method::GET, path, None, None)
            .await
            .map_err(classify)
    }

    async fn write_returning(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.supabase
            .request_with_headers::<Vec<Appointment>>(
                method,
                path,
                None,
                body,
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(&appointment).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let rows = self.write_returning(Method::POST, APPOINTMENTS_PATH, Some(body)).await?;

        rows.into_iter().next().ok_or_else(|| {
            error!("Insert returned no representation");
            StoreError::Corrupt("insert returned no rows".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let rows: Vec<Appointment> = self.fetch(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!(
            "{}?patient_id=eq.{}&order=scheduled_at.desc",
            APPOINTMENTS_PATH, patient_id
        );
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        self.fetch(&path).await
    }

    async fn find_active_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "{}?scheduled_at=gt.{}&scheduled_at=lt.{}&status=in.({},{})&order=scheduled_at.asc",
            APPOINTMENTS_PATH,
            encode_time(from),
            encode_time(to),
            AppointmentStatus::Planned,
            AppointmentStatus::Confirmed,
        );

        debug!("Fetching active appointments between {} and {}", from, to);
        self.fetch(&path).await
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?order=scheduled_at.desc", APPOINTMENTS_PATH);
        self.fetch(&path).await
    }

    async fn mark_cancelled_by_patient(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let body = json!({
            "status": AppointmentStatus::Cancelled,
            "cancelled_by_patient": true,
        });

        let rows = self.write_returning(Method::PATCH, &path, Some(body)).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, id);
        let rows = self.write_returning(Method::DELETE, &path, None).await?;
        Ok(!rows.is_empty())
    }
}

/// Patient registry read from the `patients` table.
pub struct SupabasePatientDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePatientDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn find_patient(&self, id: Uuid) -> Result<Option<PatientProfile>, StoreError> {
        let path = format!("{}?id=eq.{}&select=id,last_name,first_name", PATIENTS_PATH, id);

        let rows: Vec<PatientProfile> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(classify)?;

        Ok(rows.into_iter().next())
    }

    async fn find_patients(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, PatientProfile>, StoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let path = format!("{}?id=in.({})&select=id,last_name,first_name", PATIENTS_PATH, id_list);

        let rows: Vec<PatientProfile> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(classify)?;

        if rows.len() < ids.len() {
            warn!("Directory returned {} of {} requested patients", rows.len(), ids.len());
        }

        Ok(rows.into_iter().map(|p| (p.id, p)).collect())
    }
}
