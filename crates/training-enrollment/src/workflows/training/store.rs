use chrono::{DateTime, Utc};
use tracing::warn;

use super::capacity::CapacitySnapshot;
use super::domain::{
    EmployeeId, Enrollment, EnrollmentId, EnrollmentStatus, SeatLimit, Training, TrainingDraft,
    TrainingId,
};
use super::error::EnrollmentError;

/// Storage failures. `Conflict` signals a serialization failure and is always safe to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("training {0} not found")]
    TrainingNotFound(TrainingId),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("transaction conflicted with a concurrent writer")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a failed [`TrainingStore::transact`] call.
#[derive(Debug)]
pub enum TransactionError<E> {
    /// The unit of work returned an error; nothing was written.
    Aborted(E),
    /// The store could not run or commit the unit of work.
    Store(StoreError),
}

impl<E> From<StoreError> for TransactionError<E> {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Committed state of one training and every enrollment record that references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSnapshot {
    pub training: Training,
    pub enrollments: Vec<Enrollment>,
}

impl TrainingSnapshot {
    pub fn active_count(&self) -> u32 {
        count_active(self.enrollments.iter())
    }

    pub fn active_enrollments(&self) -> Vec<Enrollment> {
        self.enrollments
            .iter()
            .filter(|enrollment| enrollment.is_active())
            .cloned()
            .collect()
    }

    pub fn capacity(&self) -> CapacitySnapshot {
        CapacitySnapshot::new(self.training.seat_limit, self.active_count())
    }
}

pub(crate) fn count_active<'a>(enrollments: impl Iterator<Item = &'a Enrollment>) -> u32 {
    let active = enrollments.filter(|enrollment| enrollment.is_active()).count();
    u32::try_from(active).unwrap_or(u32::MAX)
}

/// Unit of work scoped to a single training. Reads observe every commit that happened before the
/// transaction began plus the transaction's own writes.
pub trait TrainingTransaction {
    fn training(&self) -> &Training;
    fn enrollment_for(&self, employee: &EmployeeId) -> Option<Enrollment>;
    fn enrollment(&self, id: &EnrollmentId) -> Option<Enrollment>;
    fn active_count(&self) -> u32;
    fn active_enrollments(&self) -> Vec<Enrollment>;
    /// Create the (employee, training) record or overwrite the existing one in place.
    fn upsert_enrollment(
        &mut self,
        employee: &EmployeeId,
        status: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Enrollment;
    fn set_enrollment_status(
        &mut self,
        id: &EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, StoreError>;
    fn set_seat_limit(&mut self, limit: SeatLimit);
    fn apply_details(&mut self, title: Option<String>, description: Option<String>);
}

/// Transactional store consumed by the admission and catalog services.
pub trait TrainingStore: Send + Sync {
    fn create_training(&self, draft: TrainingDraft) -> Result<Training, StoreError>;
    /// Remove a training together with all of its enrollment records.
    fn delete_training(&self, id: &TrainingId) -> Result<(), StoreError>;
    fn snapshot(&self, id: &TrainingId) -> Result<Option<TrainingSnapshot>, StoreError>;
    fn snapshots(&self) -> Result<Vec<TrainingSnapshot>, StoreError>;
    fn locate_enrollment(&self, id: &EnrollmentId) -> Result<Option<TrainingId>, StoreError>;
    /// Run `work` as one atomic unit, serialized against every other transaction on the same
    /// training. Writes are committed only when `work` returns `Ok`.
    fn transact<T, E, F>(&self, id: &TrainingId, work: F) -> Result<T, TransactionError<E>>
    where
        F: FnOnce(&mut dyn TrainingTransaction) -> Result<T, E>;
}

/// Bounded retry budget for serialization conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Drive `work` through [`TrainingStore::transact`], retrying conflicts within `policy`.
pub(crate) fn run_serialized<S, T, F>(
    store: &S,
    training_id: &TrainingId,
    policy: RetryPolicy,
    mut work: F,
) -> Result<T, EnrollmentError>
where
    S: TrainingStore,
    F: FnMut(&mut dyn TrainingTransaction) -> Result<T, EnrollmentError>,
{
    let mut attempt = 1;
    loop {
        match store.transact(training_id, &mut work) {
            Ok(value) => return Ok(value),
            Err(TransactionError::Aborted(err)) => return Err(err),
            Err(TransactionError::Store(StoreError::Conflict))
                if attempt < policy.max_attempts() =>
            {
                warn!(%training_id, attempt, "transaction conflict, retrying");
                attempt += 1;
            }
            Err(TransactionError::Store(StoreError::Conflict)) => {
                warn!(%training_id, attempts = attempt, "transaction conflict retries exhausted");
                return Err(EnrollmentError::Conflict { attempts: attempt });
            }
            Err(TransactionError::Store(other)) => return Err(other.into()),
        }
    }
}
