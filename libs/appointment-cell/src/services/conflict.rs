use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, CONFLICT_WINDOW_MINUTES};
use crate::services::store::{AppointmentStore, StoreError};

/// True when two start times are strictly less than the conflict window
/// apart. Symmetric; exactly 60 minutes apart does not conflict.
pub fn within_conflict_window(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    let window = Duration::minutes(CONFLICT_WINDOW_MINUTES);
    let diff = a - b;
    diff < window && diff > -window
}

/// Query range for `candidate`, or `None` when the window does not fit in
/// the representable time range.
pub fn conflict_window_bounds(candidate: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let window = Duration::minutes(CONFLICT_WINDOW_MINUTES);
    Some((candidate.checked_sub_signed(window)?, candidate.checked_add_signed(window)?))
}

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Active appointments overlapping `candidate`. The store is asked only
    /// for the surrounding window; the precise test runs here.
    pub async fn conflicting_appointments(&self, candidate: DateTime<Utc>) -> Result<Vec<Appointment>, StoreError> {
        // Clamped at the ends of the time range; the precise test below still
        // decides.
        let (from, to) = conflict_window_bounds(candidate).unwrap_or((DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC));

        let nearby = self.store.find_active_between(from, to).await?;

        debug!("{} active appointments near {}", nearby.len(), candidate);

        let conflicting: Vec<Appointment> = nearby
            .into_iter()
            .filter(|existing| within_conflict_window(existing.scheduled_at, candidate))
            .collect();

        if !conflicting.is_empty() {
            warn!("Slot {} conflicts with {} active appointments", candidate, conflicting.len());
        }

        Ok(conflicting)
    }

    pub async fn is_slot_taken(&self, candidate: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(!self.conflicting_appointments(candidate).await?.is_empty())
    }
}
