use super::domain::{EnrollmentId, SeatLimit, TrainingId};
use super::store::StoreError;

/// Expected, user-facing outcomes of enrollment and catalog operations.
///
/// Everything except [`EnrollmentError::Store`] is a business decision; the HTTP layer maps each
/// variant to a stable status code. `Store` wraps failures of the backing store itself and is
/// surfaced to clients only as a generic internal error.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("training {0} not found")]
    TrainingNotFound(TrainingId),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("not authorized to {action}")]
    Forbidden { action: &'static str },
    #[error("already enrolled in training {training_id}")]
    AlreadyEnrolled { training_id: TrainingId },
    #[error("enrollment {enrollment_id} already cancelled")]
    AlreadyCancelled { enrollment_id: EnrollmentId },
    #[error("training is full: {available_seats} of {seat_limit} seats available")]
    Full {
        available_seats: u32,
        seat_limit: SeatLimit,
    },
    #[error("cannot set seat limit to {requested}: {active_count} active enrollments")]
    InvalidSeatLimit { requested: u32, active_count: u32 },
    #[error("invalid training {field}: {reason}")]
    InvalidTraining {
        field: &'static str,
        reason: &'static str,
    },
    #[error("concurrent update conflict persisted after {attempts} attempts")]
    Conflict { attempts: u32 },
    #[error(transparent)]
    Store(StoreError),
}

impl EnrollmentError {
    /// True for outcomes the caller can resolve by retrying the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, EnrollmentError::Conflict { .. })
    }
}

impl From<StoreError> for EnrollmentError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::TrainingNotFound(id) => Self::TrainingNotFound(id),
            StoreError::EnrollmentNotFound(id) => Self::EnrollmentNotFound(id),
            StoreError::Conflict => Self::Conflict { attempts: 1 },
            other @ StoreError::Unavailable(_) => Self::Store(other),
        }
    }
}
