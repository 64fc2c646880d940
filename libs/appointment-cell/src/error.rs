// libs/appointment-cell/src/error.rs
use thiserror::Error;

use shared_models::auth::Role;
use shared_models::error::AppError;

use crate::models::{AppointmentStatus, MAX_REASON_LENGTH};
use crate::services::store::StoreError;

/// Coarse outcome classes; each maps to exactly one transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Storage,
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Reason is required and must be at most {} characters", MAX_REASON_LENGTH)]
    InvalidReason,

    #[error("Appointment must be scheduled in the present or the future")]
    ScheduledInPast,

    #[error("Appointment time is outside the supported range")]
    ScheduleOutOfRange,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment not found")]
    NotFound,

    #[error("This slot is already taken")]
    SlotTaken,

    #[error("Cancellation is only allowed up to 48h before the appointment")]
    CancellationDeadlinePassed,

    #[error("Appointment cannot be cancelled from status {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("You can only cancel your own appointments")]
    NotOwner,

    #[error("Operation requires the {required} role")]
    RoleMismatch { required: Role },

    #[error("Callers may only act on their own appointments")]
    SubjectMismatch,

    #[error("Appointment storage failure: {0}")]
    Storage(String),
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::InvalidReason
            | AppointmentError::ScheduledInPast
            | AppointmentError::ScheduleOutOfRange => ErrorKind::Validation,
            AppointmentError::PatientNotFound | AppointmentError::NotFound => ErrorKind::NotFound,
            AppointmentError::SlotTaken
            | AppointmentError::CancellationDeadlinePassed
            | AppointmentError::InvalidStatusTransition(_) => ErrorKind::Conflict,
            AppointmentError::NotOwner
            | AppointmentError::RoleMismatch { .. }
            | AppointmentError::SubjectMismatch => ErrorKind::Forbidden,
            AppointmentError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable tag for clients; never derived from the message text.
    pub fn reason(&self) -> &'static str {
        match self {
            AppointmentError::InvalidReason => "invalid_reason",
            AppointmentError::ScheduledInPast => "scheduled_in_past",
            AppointmentError::ScheduleOutOfRange => "scheduled_out_of_range",
            AppointmentError::PatientNotFound => "patient_not_found",
            AppointmentError::NotFound => "appointment_not_found",
            AppointmentError::SlotTaken => "slot_taken",
            AppointmentError::CancellationDeadlinePassed => "cancellation_deadline_passed",
            AppointmentError::InvalidStatusTransition(_) => "invalid_status_transition",
            AppointmentError::NotOwner => "not_owner",
            AppointmentError::RoleMismatch { .. } => "role_mismatch",
            AppointmentError::SubjectMismatch => "subject_mismatch",
            AppointmentError::Storage(_) => "storage_unavailable",
        }
    }
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotTaken => AppointmentError::SlotTaken,
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let reason = err.reason();
        let message = err.to_string();

        match err.kind() {
            ErrorKind::Validation => AppError::ValidationError { reason, message },
            ErrorKind::NotFound => AppError::NotFound { reason, message },
            ErrorKind::Conflict => AppError::Conflict { reason, message },
            ErrorKind::Forbidden => AppError::Forbidden { reason, message },
            ErrorKind::Storage => AppError::Database(message),
        }
    }
}
