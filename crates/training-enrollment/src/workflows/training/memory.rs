//! In-process [`TrainingStore`] used by the service binary, the demo, and the test suites.
//!
//! Each training lives in its own shard behind a `Mutex`; a transaction holds that lock from its
//! first read to its commit, so read-count-then-write sequences on one training are serialized
//! while different trainings proceed in parallel. Writes are staged on a copy of the shard and
//! swapped in only when the unit of work succeeds.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};

use super::domain::{
    EmployeeId, Enrollment, EnrollmentId, EnrollmentStatus, SeatLimit, Training, TrainingDraft,
    TrainingId,
};
use super::store::{
    count_active, StoreError, TrainingSnapshot, TrainingStore, TrainingTransaction,
    TransactionError,
};

#[derive(Debug, Clone)]
struct TrainingShard {
    training: Training,
    enrollments: BTreeMap<EmployeeId, Enrollment>,
    retired: bool,
}

impl TrainingShard {
    fn snapshot(&self) -> TrainingSnapshot {
        TrainingSnapshot {
            training: self.training.clone(),
            enrollments: self.enrollments.values().cloned().collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTrainingStore {
    shards: RwLock<HashMap<TrainingId, Arc<Mutex<TrainingShard>>>>,
    enrollment_index: RwLock<HashMap<EnrollmentId, TrainingId>>,
    training_sequence: AtomicU64,
    enrollment_sequence: AtomicU64,
}

impl InMemoryTrainingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, id: &TrainingId) -> Result<Option<Arc<Mutex<TrainingShard>>>, StoreError> {
        let shards = self
            .shards
            .read()
            .map_err(|_| poisoned("training directory"))?;
        Ok(shards.get(id).cloned())
    }

    fn all_shards(&self) -> Result<Vec<Arc<Mutex<TrainingShard>>>, StoreError> {
        let shards = self
            .shards
            .read()
            .map_err(|_| poisoned("training directory"))?;
        Ok(shards.values().cloned().collect())
    }

    fn index_enrollments(
        &self,
        training_id: &TrainingId,
        created: Vec<EnrollmentId>,
    ) -> Result<(), StoreError> {
        if created.is_empty() {
            return Ok(());
        }
        let mut index = self
            .enrollment_index
            .write()
            .map_err(|_| poisoned("enrollment index"))?;
        for id in created {
            index.insert(id, training_id.clone());
        }
        Ok(())
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} lock poisoned"))
}

fn lock_shard(shard: &Mutex<TrainingShard>) -> Result<MutexGuard<'_, TrainingShard>, StoreError> {
    shard.lock().map_err(|_| poisoned("training shard"))
}

impl TrainingStore for InMemoryTrainingStore {
    fn create_training(&self, draft: TrainingDraft) -> Result<Training, StoreError> {
        let sequence = self.training_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let training = Training {
            id: TrainingId(format!("trn-{sequence:06}")),
            title: draft.title,
            description: draft.description,
            seat_limit: draft.seat_limit,
            trainer_id: draft.trainer_id,
            created_at: draft.created_at,
        };

        let shard = TrainingShard {
            training: training.clone(),
            enrollments: BTreeMap::new(),
            retired: false,
        };
        let mut shards = self
            .shards
            .write()
            .map_err(|_| poisoned("training directory"))?;
        shards.insert(training.id.clone(), Arc::new(Mutex::new(shard)));
        Ok(training)
    }

    fn delete_training(&self, id: &TrainingId) -> Result<(), StoreError> {
        let removed = self
            .shards
            .write()
            .map_err(|_| poisoned("training directory"))?
            .remove(id)
            .ok_or_else(|| StoreError::TrainingNotFound(id.clone()))?;

        let mut shard = lock_shard(&removed)?;
        shard.retired = true;
        let mut index = self
            .enrollment_index
            .write()
            .map_err(|_| poisoned("enrollment index"))?;
        for enrollment in shard.enrollments.values() {
            index.remove(&enrollment.id);
        }
        shard.enrollments.clear();
        Ok(())
    }

    fn snapshot(&self, id: &TrainingId) -> Result<Option<TrainingSnapshot>, StoreError> {
        let Some(shard) = self.shard(id)? else {
            return Ok(None);
        };
        let shard = lock_shard(&shard)?;
        Ok((!shard.retired).then(|| shard.snapshot()))
    }

    fn snapshots(&self) -> Result<Vec<TrainingSnapshot>, StoreError> {
        let mut snapshots = Vec::new();
        for shard in self.all_shards()? {
            let shard = lock_shard(&shard)?;
            if !shard.retired {
                snapshots.push(shard.snapshot());
            }
        }
        Ok(snapshots)
    }

    fn locate_enrollment(&self, id: &EnrollmentId) -> Result<Option<TrainingId>, StoreError> {
        let index = self
            .enrollment_index
            .read()
            .map_err(|_| poisoned("enrollment index"))?;
        Ok(index.get(id).cloned())
    }

    fn transact<T, E, F>(&self, id: &TrainingId, work: F) -> Result<T, TransactionError<E>>
    where
        F: FnOnce(&mut dyn TrainingTransaction) -> Result<T, E>,
    {
        let shard = self
            .shard(id)?
            .ok_or_else(|| StoreError::TrainingNotFound(id.clone()))?;
        let mut committed = lock_shard(&shard)?;
        if committed.retired {
            return Err(StoreError::TrainingNotFound(id.clone()).into());
        }

        let mut staged = StagedTransaction {
            shard: committed.clone(),
            created: Vec::new(),
            sequence: &self.enrollment_sequence,
        };
        let value = work(&mut staged).map_err(TransactionError::Aborted)?;

        let StagedTransaction { shard, created, .. } = staged;
        self.index_enrollments(id, created)?;
        *committed = shard;
        Ok(value)
    }
}

struct StagedTransaction<'a> {
    shard: TrainingShard,
    created: Vec<EnrollmentId>,
    sequence: &'a AtomicU64,
}

impl TrainingTransaction for StagedTransaction<'_> {
    fn training(&self) -> &Training {
        &self.shard.training
    }

    fn enrollment_for(&self, employee: &EmployeeId) -> Option<Enrollment> {
        self.shard.enrollments.get(employee).cloned()
    }

    fn enrollment(&self, id: &EnrollmentId) -> Option<Enrollment> {
        self.shard
            .enrollments
            .values()
            .find(|enrollment| &enrollment.id == id)
            .cloned()
    }

    fn active_count(&self) -> u32 {
        count_active(self.shard.enrollments.values())
    }

    fn active_enrollments(&self) -> Vec<Enrollment> {
        self.shard
            .enrollments
            .values()
            .filter(|enrollment| enrollment.is_active())
            .cloned()
            .collect()
    }

    fn upsert_enrollment(
        &mut self,
        employee: &EmployeeId,
        status: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Enrollment {
        if let Some(existing) = self.shard.enrollments.get_mut(employee) {
            existing.status = status;
            existing.enrolled_at = at;
            return existing.clone();
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let enrollment = Enrollment {
            id: EnrollmentId(format!("enr-{sequence:06}")),
            employee_id: employee.clone(),
            training_id: self.shard.training.id.clone(),
            status,
            enrolled_at: at,
        };
        self.created.push(enrollment.id.clone());
        self.shard
            .enrollments
            .insert(employee.clone(), enrollment.clone());
        enrollment
    }

    fn set_enrollment_status(
        &mut self,
        id: &EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, StoreError> {
        let enrollment = self
            .shard
            .enrollments
            .values_mut()
            .find(|enrollment| &enrollment.id == id)
            .ok_or_else(|| StoreError::EnrollmentNotFound(id.clone()))?;
        enrollment.status = status;
        Ok(enrollment.clone())
    }

    fn set_seat_limit(&mut self, limit: SeatLimit) {
        self.shard.training.seat_limit = limit;
    }

    fn apply_details(&mut self, title: Option<String>, description: Option<String>) {
        if let Some(title) = title {
            self.shard.training.title = title;
        }
        if let Some(description) = description {
            self.shard.training.description = description;
        }
    }
}
