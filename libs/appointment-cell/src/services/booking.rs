// libs/appointment-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::error::AppointmentError;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, BookAppointmentRequest, NewAppointment, PatientProfile,
    SlotAvailability, CANCELLATION_DEADLINE_MINUTES, MAX_REASON_LENGTH, VIEW_TIME_FORMAT,
};
use crate::services::clock::{Clock, SystemClock};
use crate::services::conflict::{conflict_window_bounds, ConflictDetectionService};
use crate::services::directory::PatientDirectory;
use crate::services::policy::{AccessPolicy, Operation};
use crate::services::store::AppointmentStore;
use crate::services::supabase::{SupabaseAppointmentStore, SupabasePatientDirectory};

/// Single predicate behind both the `can_patient_cancel` flag and cancel
/// enforcement. `minutes_until` is truncated toward zero.
pub fn cancellation_window_open(minutes_until: i64) -> bool {
    minutes_until >= CANCELLATION_DEADLINE_MINUTES
}

pub fn can_patient_cancel(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    appointment.status == AppointmentStatus::Planned && cancellation_window_open(appointment.minutes_until(now))
}

fn validate_range(at: DateTime<Utc>) -> Result<(), AppointmentError> {
    match conflict_window_bounds(at) {
        Some(_) => Ok(()),
        None => Err(AppointmentError::ScheduleOutOfRange),
    }
}

fn validate_reason(raw: &str) -> Result<String, AppointmentError> {
    let reason = raw.trim();
    if reason.is_empty() || reason.chars().count() > MAX_REASON_LENGTH {
        return Err(AppointmentError::InvalidReason);
    }
    Ok(reason.to_string())
}

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientDirectory>,
    clock: Arc<dyn Clock>,
    conflict_service: ConflictDetectionService,
    policy: AccessPolicy,
    // Serializes check-then-write sequences within this process.
    write_gate: Mutex<()>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>, patients: Arc<dyn PatientDirectory>, clock: Arc<dyn Clock>) -> Self {
        let conflict_service = ConflictDetectionService::new(Arc::clone(&store));

        Self {
            store,
            patients,
            clock,
            conflict_service,
            policy: AccessPolicy,
            write_gate: Mutex::new(()),
        }
    }

    pub fn with_supabase(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self::new(
            Arc::new(SupabaseAppointmentStore::new(Arc::clone(&supabase))),
            Arc::new(SupabasePatientDirectory::new(supabase)),
            Arc::new(SystemClock),
        )
    }

    // ==========================================================================
    // PATIENT OPERATIONS
    // ==========================================================================

    #[instrument(skip(self, caller, request), fields(caller = %caller.id))]
    pub async fn book_appointment(
        &self,
        caller: &User,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<AppointmentView, AppointmentError> {
        self.policy.authorize(caller, Operation::Book, Some(patient_id))?;

        let now = self.clock.now();
        let reason = validate_reason(&request.reason)?;
        if request.scheduled_at < now {
            warn!("Rejected booking in the past: {}", request.scheduled_at);
            return Err(AppointmentError::ScheduledInPast);
        }
        validate_range(request.scheduled_at)?;

        let patient = self
            .patients
            .find_patient(patient_id)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;

        let record = {
            let _gate = self.write_gate.lock().await;

            if self.conflict_service.is_slot_taken(request.scheduled_at).await? {
                warn!("Slot {} already taken", request.scheduled_at);
                return Err(AppointmentError::SlotTaken);
            }

            self.store
                .insert(NewAppointment::planned(patient_id, request.scheduled_at, reason, now))
                .await?
        };

        info!("Appointment {} booked for patient {} at {}", record.id, patient_id, record.scheduled_at);

        Ok(self.to_view(&record, Some(&patient), now))
    }

    pub async fn list_patient_appointments(
        &self,
        caller: &User,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.policy.authorize(caller, Operation::ListOwn, Some(patient_id))?;

        let appointments = self.store.find_by_patient(patient_id, status).await?;
        debug!("Found {} appointments for patient {}", appointments.len(), patient_id);

        self.to_views(appointments).await
    }

    /// Appointments in the next 48 hours; these can no longer be cancelled
    /// by the patient.
    pub async fn list_locked_appointments(
        &self,
        caller: &User,
        patient_id: Uuid,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.policy.authorize(caller, Operation::ListUpcomingLocked, Some(patient_id))?;

        let now = self.clock.now();
        let horizon = now
            .checked_add_signed(Duration::minutes(CANCELLATION_DEADLINE_MINUTES))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut locked: Vec<Appointment> = self
            .store
            .find_by_patient(patient_id, None)
            .await?
            .into_iter()
            .filter(|a| a.is_active() && a.scheduled_at > now && a.scheduled_at < horizon)
            .collect();
        locked.sort_by_key(|a| (a.scheduled_at, a.id));

        self.to_views(locked).await
    }

    #[instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn cancel_appointment(
        &self,
        caller: &User,
        patient_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppointmentError> {
        self.policy.authorize(caller, Operation::Cancel, Some(patient_id))?;

        let (updated, now) = {
            let _gate = self.write_gate.lock().await;

            let appointment = self
                .store
                .find_by_id(appointment_id)
                .await?
                .ok_or(AppointmentError::NotFound)?;

            if appointment.patient_id != patient_id {
                warn!("Patient {} tried to cancel appointment {} they do not own", patient_id, appointment_id);
                return Err(AppointmentError::NotOwner);
            }

            let now = self.clock.now();
            if !cancellation_window_open(appointment.minutes_until(now)) {
                warn!(
                    "Cancellation of {} refused: {} minutes before start",
                    appointment_id,
                    appointment.minutes_until(now)
                );
                return Err(AppointmentError::CancellationDeadlinePassed);
            }

            // Re-cancelling re-sets the same fields.
            if appointment.status != AppointmentStatus::Cancelled
                && !appointment.status.can_transition_to(AppointmentStatus::Cancelled)
            {
                return Err(AppointmentError::InvalidStatusTransition(appointment.status));
            }

            let updated = self
                .store
                .mark_cancelled_by_patient(appointment_id)
                .await?
                .ok_or(AppointmentError::NotFound)?;

            (updated, now)
        };

        info!("Appointment {} cancelled by patient {}", appointment_id, patient_id);

        let patient = self.patients.find_patient(patient_id).await?;
        Ok(self.to_view(&updated, patient.as_ref(), now))
    }

    pub async fn check_slot(&self, caller: &User, at: DateTime<Utc>) -> Result<SlotAvailability, AppointmentError> {
        self.policy.authorize(caller, Operation::CheckSlot, None)?;
        validate_range(at)?;

        let taken = self.conflict_service.is_slot_taken(at).await?;

        Ok(SlotAvailability {
            scheduled_at: at.format(VIEW_TIME_FORMAT).to_string(),
            taken,
        })
    }

    // ==========================================================================
    // ADMIN OPERATIONS
    // ==========================================================================

    pub async fn list_all_appointments(&self, caller: &User) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.policy.authorize(caller, Operation::ListAll, None)?;

        let appointments = self.store.list_all().await?;
        debug!("Admin {} listing {} appointments", caller.id, appointments.len());

        self.to_views(appointments).await
    }

    /// Deleting an unknown id succeeds without effect.
    #[instrument(skip(self, caller), fields(caller = %caller.id))]
    pub async fn delete_appointment(&self, caller: &User, appointment_id: Uuid) -> Result<(), AppointmentError> {
        self.policy.authorize(caller, Operation::AdminDelete, None)?;

        let removed = {
            let _gate = self.write_gate.lock().await;
            self.store.delete(appointment_id).await?
        };

        if removed {
            info!("Appointment {} deleted by admin {}", appointment_id, caller.id);
        } else {
            debug!("Delete of unknown appointment {} ignored", appointment_id);
        }

        Ok(())
    }

    // ==========================================================================
    // VIEWS
    // ==========================================================================

    fn to_view(&self, appointment: &Appointment, patient: Option<&PatientProfile>, now: DateTime<Utc>) -> AppointmentView {
        let (last_name, first_name, name) = match patient {
            Some(profile) => (profile.last_name.clone(), profile.first_name.clone(), profile.display_name()),
            None => {
                warn!("No patient profile for {} (appointment {})", appointment.patient_id, appointment.id);
                (String::new(), String::new(), String::new())
            }
        };

        AppointmentView {
            id: appointment.id,
            scheduled_at: appointment.scheduled_at.format(VIEW_TIME_FORMAT).to_string(),
            reason: appointment.reason.clone(),
            patient_last_name: last_name,
            patient_first_name: first_name,
            patient_name: name,
            status: appointment.status,
            can_patient_cancel: can_patient_cancel(appointment, now),
        }
    }

    async fn to_views(&self, appointments: Vec<Appointment>) -> Result<Vec<AppointmentView>, AppointmentError> {
        if appointments.is_empty() {
            return Ok(Vec::new());
        }

        let mut patient_ids: Vec<Uuid> = appointments.iter().map(|a| a.patient_id).collect();
        patient_ids.sort();
        patient_ids.dedup();

        let profiles: HashMap<Uuid, PatientProfile> = self.patients.find_patients(&patient_ids).await?;
        let now = self.clock.now();

        Ok(appointments
            .iter()
            .map(|a| self.to_view(a, profiles.get(&a.patient_id), now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_closes_below_forty_eight_hours() {
        assert!(cancellation_window_open(2881));
        assert!(cancellation_window_open(2880));
        assert!(!cancellation_window_open(2879));
        assert!(!cancellation_window_open(0));
        assert!(!cancellation_window_open(-30));
    }

    #[test]
    fn flag_requires_planned_status() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
        let mut appointment = NewAppointment::planned(Uuid::new_v4(), now + Duration::days(5), "Bilan".into(), now)
            .into_appointment(Uuid::new_v4());

        assert!(can_patient_cancel(&appointment, now));

        appointment.status = AppointmentStatus::Confirmed;
        assert!(!can_patient_cancel(&appointment, now));

        appointment.status = AppointmentStatus::Cancelled;
        assert!(!can_patient_cancel(&appointment, now));
    }

    #[test]
    fn reason_is_trimmed_and_bounded() {
        assert_eq!(validate_reason("  Suivi  ").unwrap(), "Suivi");
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"é".repeat(MAX_REASON_LENGTH)).is_ok());
        assert!(validate_reason(&"a".repeat(MAX_REASON_LENGTH + 1)).is_err());
    }
}
