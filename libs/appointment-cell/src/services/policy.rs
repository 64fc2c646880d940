use tracing::warn;
use uuid::Uuid;

use shared_models::auth::{Role, User};

use crate::error::AppointmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Book,
    ListOwn,
    Cancel,
    ListUpcomingLocked,
    CheckSlot,
    ListAll,
    AdminDelete,
}

impl Operation {
    pub fn required_role(&self) -> Role {
        match self {
            Operation::ListAll | Operation::AdminDelete => Role::Admin,
            _ => Role::Patient,
        }
    }

    /// Subject-scoped operations act on one patient's own records.
    pub fn is_subject_scoped(&self) -> bool {
        matches!(
            self,
            Operation::Book | Operation::ListOwn | Operation::Cancel | Operation::ListUpcomingLocked
        )
    }
}

/// Maps caller identity onto permitted operations. Runs before any lookup,
/// so a denied caller learns nothing about the records involved.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn authorize(&self, caller: &User, operation: Operation, subject: Option<Uuid>) -> Result<(), AppointmentError> {
        let required = operation.required_role();
        if !caller.role.at_least(required) {
            warn!("Caller {} ({}) denied {:?}: requires {}", caller.id, caller.role, operation, required);
            return Err(AppointmentError::RoleMismatch { required });
        }

        if operation.is_subject_scoped() && subject != Some(caller.id) {
            warn!("Caller {} denied {:?} on behalf of {:?}", caller.id, operation, subject);
            return Err(AppointmentError::SubjectMismatch);
        }

        Ok(())
    }
}
