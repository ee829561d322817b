use std::sync::Arc;

use tracing::{debug, info};

use super::capacity::{check_seat_limit, CapacitySnapshot, RosterView, TrainingView};
use super::clock::Clock;
use super::domain::{
    NewTraining, SeatLimit, TrainerId, Training, TrainingChanges, TrainingDraft, TrainingId,
};
use super::error::EnrollmentError;
use super::store::{run_serialized, RetryPolicy, TrainingStore};

/// Trainer-facing management of published trainings.
pub struct TrainingCatalog<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S> Clone for TrainingCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            retry: self.retry,
        }
    }
}

impl<S> TrainingCatalog<S>
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

    pub fn create_training(
        &self,
        trainer_id: &TrainerId,
        request: NewTraining,
    ) -> Result<TrainingView, EnrollmentError> {
        let title = required_text("title", request.title)?;
        let description = required_text("description", request.description)?;
        let seat_limit = SeatLimit::new(request.seat_limit).ok_or(EnrollmentError::InvalidTraining {
            field: "seatLimit",
            reason: "must be at least 1",
        })?;

        let training = self.store.create_training(TrainingDraft {
            title,
            description,
            seat_limit,
            trainer_id: trainer_id.clone(),
            created_at: self.clock.now(),
        })?;

        info!(%trainer_id, training_id = %training.id, %seat_limit, "training published");
        Ok(TrainingView::new(
            training,
            CapacitySnapshot::new(seat_limit, 0),
        ))
    }

    /// Every training with its capacity figures, most recently published first.
    pub fn list_trainings(&self) -> Result<Vec<TrainingView>, EnrollmentError> {
        let mut views: Vec<TrainingView> = self
            .store
            .snapshots()?
            .iter()
            .map(TrainingView::from)
            .collect();
        views.sort_by(|a, b| newest_training_first(&a.training, &b.training));
        Ok(views)
    }

    pub fn get_training(&self, training_id: &TrainingId) -> Result<TrainingView, EnrollmentError> {
        self.store
            .snapshot(training_id)?
            .map(|snapshot| TrainingView::from(&snapshot))
            .ok_or_else(|| EnrollmentError::TrainingNotFound(training_id.clone()))
    }

    /// Trainings owned by `trainer_id`, each with its active roster.
    pub fn list_trainer_trainings(
        &self,
        trainer_id: &TrainerId,
    ) -> Result<Vec<RosterView>, EnrollmentError> {
        let mut rosters: Vec<RosterView> = self
            .store
            .snapshots()?
            .iter()
            .filter(|snapshot| snapshot.training.is_owned_by(trainer_id))
            .map(RosterView::from)
            .collect();
        rosters.sort_by(|a, b| newest_training_first(&a.training.training, &b.training.training));
        Ok(rosters)
    }

    /// Current number of active enrollments, read through the training's serialized scope.
    pub fn active_count(&self, training_id: &TrainingId) -> Result<u32, EnrollmentError> {
        run_serialized(self.store.as_ref(), training_id, self.retry, |tx| {
            Ok(tx.active_count())
        })
    }

    pub fn try_set_seat_limit(
        &self,
        training_id: &TrainingId,
        new_limit: u32,
    ) -> Result<TrainingView, EnrollmentError> {
        let view = run_serialized(self.store.as_ref(), training_id, self.retry, |tx| {
            let limit = check_seat_limit(new_limit, tx.active_count())?;
            tx.set_seat_limit(limit);
            Ok(TrainingView::within(tx))
        })?;

        info!(%training_id, seat_limit = new_limit, "seat limit updated");
        Ok(view)
    }

    pub fn update_training(
        &self,
        trainer_id: &TrainerId,
        training_id: &TrainingId,
        changes: TrainingChanges,
    ) -> Result<TrainingView, EnrollmentError> {
        if changes.is_empty() {
            debug!(%training_id, "training update carries no changes");
        }
        let title = changes
            .title
            .map(|title| required_text("title", title))
            .transpose()?;
        let description = changes
            .description
            .map(|description| required_text("description", description))
            .transpose()?;

        let view = run_serialized(self.store.as_ref(), training_id, self.retry, |tx| {
            if !tx.training().is_owned_by(trainer_id) {
                return Err(EnrollmentError::Forbidden {
                    action: "update this training",
                });
            }
            if let Some(requested) = changes.seat_limit {
                let limit = check_seat_limit(requested, tx.active_count())?;
                tx.set_seat_limit(limit);
            }
            tx.apply_details(title.clone(), description.clone());
            Ok(TrainingView::within(tx))
        })?;

        info!(%trainer_id, %training_id, "training updated");
        Ok(view)
    }

    pub fn delete_training(
        &self,
        trainer_id: &TrainerId,
        training_id: &TrainingId,
    ) -> Result<(), EnrollmentError> {
        let snapshot = self
            .store
            .snapshot(training_id)?
            .ok_or_else(|| EnrollmentError::TrainingNotFound(training_id.clone()))?;
        if !snapshot.training.is_owned_by(trainer_id) {
            return Err(EnrollmentError::Forbidden {
                action: "delete this training",
            });
        }

        self.store.delete_training(training_id)?;
        info!(
            %trainer_id,
            %training_id,
            dropped_enrollments = snapshot.enrollments.len(),
            "training deleted"
        );
        Ok(())
    }
}

fn required_text(field: &'static str, value: String) -> Result<String, EnrollmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EnrollmentError::InvalidTraining {
            field,
            reason: "is required",
        });
    }
    Ok(trimmed.to_string())
}

fn newest_training_first(a: &Training, b: &Training) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}
