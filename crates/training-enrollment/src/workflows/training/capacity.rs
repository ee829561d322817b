//! Seat accounting derived from active enrollment records.
//!
//! Figures are always computed from the records visible to one transaction or one committed
//! snapshot; nothing here is cached between calls.

use serde::Serialize;

use super::domain::{Enrollment, SeatLimit, Training};
use super::error::EnrollmentError;
use super::store::{TrainingSnapshot, TrainingTransaction};

/// Seat limit paired with the active enrollment count observed alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacitySnapshot {
    pub seat_limit: SeatLimit,
    pub active_count: u32,
}

impl CapacitySnapshot {
    pub const fn new(seat_limit: SeatLimit, active_count: u32) -> Self {
        Self {
            seat_limit,
            active_count,
        }
    }

    pub fn within(tx: &dyn TrainingTransaction) -> Self {
        Self::new(tx.training().seat_limit, tx.active_count())
    }

    pub fn available_seats(&self) -> u32 {
        self.seat_limit.get().saturating_sub(self.active_count)
    }

    pub fn is_full(&self) -> bool {
        self.active_count >= self.seat_limit.get()
    }

    /// Rejection carried back to the requester when no seat is left.
    pub fn full_error(&self) -> EnrollmentError {
        EnrollmentError::Full {
            available_seats: self.available_seats(),
            seat_limit: self.seat_limit,
        }
    }
}

/// Validate a requested seat limit against the active count it must accommodate.
///
/// A zero limit is rejected as invalid input before the active count is considered.
pub fn check_seat_limit(requested: u32, active_count: u32) -> Result<SeatLimit, EnrollmentError> {
    let limit = SeatLimit::new(requested).ok_or(EnrollmentError::InvalidTraining {
        field: "seatLimit",
        reason: "must be at least 1",
    })?;
    if requested < active_count {
        return Err(EnrollmentError::InvalidSeatLimit {
            requested,
            active_count,
        });
    }
    Ok(limit)
}

/// Training annotated with its derived capacity figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingView {
    #[serde(flatten)]
    pub training: Training,
    pub enrolled_count: u32,
    pub available_seats: u32,
    pub is_full: bool,
}

impl TrainingView {
    pub fn new(training: Training, capacity: CapacitySnapshot) -> Self {
        Self {
            training,
            enrolled_count: capacity.active_count,
            available_seats: capacity.available_seats(),
            is_full: capacity.is_full(),
        }
    }

    pub fn within(tx: &dyn TrainingTransaction) -> Self {
        Self::new(tx.training().clone(), CapacitySnapshot::within(tx))
    }
}

impl From<&TrainingSnapshot> for TrainingView {
    fn from(snapshot: &TrainingSnapshot) -> Self {
        Self::new(snapshot.training.clone(), snapshot.capacity())
    }
}

/// An employee's enrollment with the capacity of the training it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentView {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub training: TrainingView,
}

/// A trainer's training with its active roster, newest enrollment first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    #[serde(flatten)]
    pub training: TrainingView,
    pub enrollments: Vec<Enrollment>,
}

impl From<&TrainingSnapshot> for RosterView {
    fn from(snapshot: &TrainingSnapshot) -> Self {
        let mut enrollments = snapshot.active_enrollments();
        newest_first(&mut enrollments);
        Self {
            training: TrainingView::from(snapshot),
            enrollments,
        }
    }
}

pub(crate) fn newest_first(enrollments: &mut [Enrollment]) {
    enrollments.sort_by(|a, b| {
        b.enrolled_at
            .cmp(&a.enrolled_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
