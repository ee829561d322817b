use std::sync::Arc;

use tracing::{info, warn};

use super::capacity::{newest_first, CapacitySnapshot, EnrollmentView, TrainingView};
use super::clock::Clock;
use super::domain::{
    EmployeeId, Enrollment, EnrollmentId, EnrollmentStatus, TrainerId, TrainingId,
};
use super::error::EnrollmentError;
use super::store::{run_serialized, RetryPolicy, TrainingStore};

/// How an admitted request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionKind {
    /// First enrollment for the (employee, training) pair.
    Fresh,
    /// A cancelled record was reactivated.
    Readmitted,
}

/// Successful admission with the training's capacity as observed right after the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub enrollment: Enrollment,
    pub kind: AdmissionKind,
    pub training: TrainingView,
}

impl Admission {
    pub fn view(&self) -> EnrollmentView {
        EnrollmentView {
            enrollment: self.enrollment.clone(),
            training: self.training.clone(),
        }
    }
}

/// Admission control for employee enrollment requests.
///
/// Every decision that reads the active count and then writes runs inside one
/// [`TrainingStore::transact`] unit for the training, so concurrent requests for the last seat
/// cannot both observe it as free.
pub struct AdmissionService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S> Clone for AdmissionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            retry: self.retry,
        }
    }
}

impl<S> AdmissionService<S>
where
    S: TrainingStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    pub fn request_enrollment(
        &self,
        employee_id: &EmployeeId,
        training_id: &TrainingId,
    ) -> Result<Admission, EnrollmentError> {
        let result = run_serialized(self.store.as_ref(), training_id, self.retry, |tx| {
            let kind = match tx.enrollment_for(employee_id) {
                Some(existing) if existing.is_active() => {
                    return Err(EnrollmentError::AlreadyEnrolled {
                        training_id: training_id.clone(),
                    });
                }
                Some(_) => AdmissionKind::Readmitted,
                None => AdmissionKind::Fresh,
            };

            let capacity = CapacitySnapshot::within(tx);
            if capacity.is_full() {
                return Err(capacity.full_error());
            }

            let enrollment =
                tx.upsert_enrollment(employee_id, EnrollmentStatus::Active, self.clock.now());
            Ok(Admission {
                enrollment,
                kind,
                training: TrainingView::within(tx),
            })
        });

        match &result {
            Ok(admission) => info!(
                %employee_id,
                %training_id,
                enrollment_id = %admission.enrollment.id,
                kind = ?admission.kind,
                available_seats = admission.training.available_seats,
                "enrollment admitted"
            ),
            Err(EnrollmentError::Full { seat_limit, .. }) => warn!(
                %employee_id,
                %training_id,
                %seat_limit,
                "enrollment rejected: training full"
            ),
            Err(_) => {}
        }
        result
    }

    pub fn cancel_enrollment(
        &self,
        employee_id: &EmployeeId,
        enrollment_id: &EnrollmentId,
    ) -> Result<Enrollment, EnrollmentError> {
        let training_id = self
            .store
            .locate_enrollment(enrollment_id)?
            .ok_or_else(|| EnrollmentError::EnrollmentNotFound(enrollment_id.clone()))?;

        let result = run_serialized(self.store.as_ref(), &training_id, self.retry, |tx| {
            let enrollment = tx
                .enrollment(enrollment_id)
                .ok_or_else(|| EnrollmentError::EnrollmentNotFound(enrollment_id.clone()))?;
            if &enrollment.employee_id != employee_id {
                return Err(EnrollmentError::Forbidden {
                    action: "cancel this enrollment",
                });
            }
            if !enrollment.is_active() {
                return Err(EnrollmentError::AlreadyCancelled {
                    enrollment_id: enrollment_id.clone(),
                });
            }
            Ok(tx.set_enrollment_status(enrollment_id, EnrollmentStatus::Cancelled)?)
        });

        // The training may have been deleted between the index lookup and the transaction.
        let cancelled = result.map_err(|err| match err {
            EnrollmentError::TrainingNotFound(_) => {
                EnrollmentError::EnrollmentNotFound(enrollment_id.clone())
            }
            other => other,
        })?;

        info!(%employee_id, %training_id, %enrollment_id, "enrollment cancelled");
        Ok(cancelled)
    }

    /// Active enrollments of one employee, newest first, each with its training's capacity.
    pub fn list_active_enrollments_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Vec<EnrollmentView>, EnrollmentError> {
        let mut views = Vec::new();
        for snapshot in self.store.snapshots()? {
            let Some(enrollment) = snapshot
                .enrollments
                .iter()
                .find(|enrollment| &enrollment.employee_id == employee_id && enrollment.is_active())
            else {
                continue;
            };
            views.push(EnrollmentView {
                enrollment: enrollment.clone(),
                training: TrainingView::from(&snapshot),
            });
        }

        views.sort_by(|a, b| {
            b.enrollment
                .enrolled_at
                .cmp(&a.enrollment.enrolled_at)
                .then_with(|| a.enrollment.id.cmp(&b.enrollment.id))
        });
        Ok(views)
    }

    /// Active roster of a training, visible only to the trainer who owns it.
    pub fn list_active_enrollments_for_training(
        &self,
        training_id: &TrainingId,
        trainer_id: &TrainerId,
    ) -> Result<Vec<EnrollmentView>, EnrollmentError> {
        let snapshot = self
            .store
            .snapshot(training_id)?
            .ok_or_else(|| EnrollmentError::TrainingNotFound(training_id.clone()))?;
        if !snapshot.training.is_owned_by(trainer_id) {
            return Err(EnrollmentError::Forbidden {
                action: "view these enrollments",
            });
        }

        let training = TrainingView::from(&snapshot);
        let mut active = snapshot.active_enrollments();
        newest_first(&mut active);
        Ok(active
            .into_iter()
            .map(|enrollment| EnrollmentView {
                enrollment,
                training: training.clone(),
            })
            .collect())
    }
}
