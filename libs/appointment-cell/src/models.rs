// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ==============================================================================
// SCHEDULING CONSTANTS
// ==============================================================================

pub const DEFAULT_DURATION_MINUTES: i32 = 50;

/// Minimum spacing between two active appointments.
pub const CONFLICT_WINDOW_MINUTES: i64 = 60;

/// Minimum lead time for a patient to cancel their own appointment (48h).
pub const CANCELLATION_DEADLINE_MINUTES: i64 = 48 * 60;

pub const MAX_REASON_LENGTH: usize = 500;

/// Minute-precision format used in every view.
pub const VIEW_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub reason: String,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub cancelled_by_patient: bool,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whole minutes from `now` until the appointment, truncated toward zero.
    pub fn minutes_until(&self, now: DateTime<Utc>) -> i64 {
        (self.scheduled_at - now).num_minutes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Planned,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Active appointments occupy their slot in the calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Planned | AppointmentStatus::Confirmed)
    }

    /// Forward-only lifecycle: only `PLANNED` may move, and never back to itself.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (
                AppointmentStatus::Planned,
                AppointmentStatus::Confirmed | AppointmentStatus::Completed | AppointmentStatus::Cancelled
            )
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Planned => write!(f, "PLANNED"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub reason: String,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub cancelled_by_patient: bool,
    pub created_at: DateTime<Utc>,
}

impl NewAppointment {
    pub fn planned(patient_id: Uuid, scheduled_at: DateTime<Utc>, reason: String, created_at: DateTime<Utc>) -> Self {
        Self {
            patient_id,
            scheduled_at,
            reason,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            status: AppointmentStatus::Planned,
            cancelled_by_patient: false,
            created_at,
        }
    }

    pub fn into_appointment(self, id: Uuid) -> Appointment {
        Appointment {
            id,
            patient_id: self.patient_id,
            scheduled_at: self.scheduled_at,
            reason: self.reason,
            duration_minutes: self.duration_minutes,
            status: self.status,
            cancelled_by_patient: self.cancelled_by_patient,
            created_at: self.created_at,
        }
    }
}

/// Directory projection of a registered patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: Uuid,
    pub last_name: String,
    pub first_name: String,
}

impl PatientProfile {
    /// "Surname, Given"
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub scheduled_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotCheckQuery {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub at: DateTime<Utc>,
}

/// Read-only projection returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentView {
    pub id: Uuid,
    pub scheduled_at: String,
    pub reason: String,
    pub patient_last_name: String,
    pub patient_first_name: String,
    pub patient_name: String,
    pub status: AppointmentStatus,
    pub can_patient_cancel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub scheduled_at: String,
    pub taken: bool,
}

// ==============================================================================
// TIMESTAMP PARSING
// ==============================================================================

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Accepts RFC 3339, or a zone-less local timestamp which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{}' is not a valid timestamp", raw))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
