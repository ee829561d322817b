use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::training::domain::TrainingDraft;
use crate::workflows::training::store::{
    StoreError, TrainingSnapshot, TrainingStore, TrainingTransaction, TransactionError,
};
use crate::workflows::training::{
    AdmissionService, Clock, EmployeeId, EnrollmentId, InMemoryTrainingStore, NewTraining,
    RetryPolicy, Training, TrainerId, TrainingCatalog, TrainingId, TrainingServices,
    TrainingView,
};

/// Clock advancing one second per reading so successive writes get distinct timestamps.
#[derive(Debug)]
pub(super) struct SteppingClock {
    base: DateTime<Utc>,
    ticks: AtomicI64,
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self {
            base: Utc.with_ymd_and_hms(2025, 4, 7, 8, 30, 0).unwrap(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.base + Duration::seconds(tick)
    }
}

pub(super) fn trainer() -> TrainerId {
    TrainerId::new("trainer-ada")
}

pub(super) fn other_trainer() -> TrainerId {
    TrainerId::new("trainer-grace")
}

pub(super) fn employee(n: usize) -> EmployeeId {
    EmployeeId(format!("emp-{n:03}"))
}

pub(super) fn new_training(seats: u32) -> NewTraining {
    NewTraining {
        title: "Confined space entry".to_string(),
        description: "Permit-required confined space awareness".to_string(),
        seat_limit: seats,
    }
}

pub(super) fn clock() -> Arc<dyn Clock> {
    Arc::new(SteppingClock::default())
}

pub(super) fn build_services() -> (
    AdmissionService<InMemoryTrainingStore>,
    TrainingCatalog<InMemoryTrainingStore>,
    Arc<InMemoryTrainingStore>,
) {
    let store = Arc::new(InMemoryTrainingStore::new());
    let clock = clock();
    let admission = AdmissionService::new(store.clone(), clock.clone(), RetryPolicy::default());
    let catalog = TrainingCatalog::new(store.clone(), clock, RetryPolicy::default());
    (admission, catalog, store)
}

pub(super) fn build_router_services() -> Arc<TrainingServices<InMemoryTrainingStore>> {
    Arc::new(TrainingServices::new(
        Arc::new(InMemoryTrainingStore::new()),
        clock(),
        RetryPolicy::default(),
    ))
}

pub(super) fn publish<S>(catalog: &TrainingCatalog<S>, seats: u32) -> TrainingView
where
    S: TrainingStore + 'static,
{
    catalog
        .create_training(&trainer(), new_training(seats))
        .expect("training published")
}

/// Store wrapper that reports a serialization conflict for the first `conflicts` transactions.
pub(super) struct FlakyStore {
    inner: InMemoryTrainingStore,
    conflicts_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl FlakyStore {
    pub(super) fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryTrainingStore::new(),
            conflicts_remaining: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
        }
    }

    pub(super) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(super) fn reset_attempts(&self, conflicts: u32) {
        self.attempts.store(0, Ordering::SeqCst);
        self.conflicts_remaining.store(conflicts, Ordering::SeqCst);
    }
}

impl TrainingStore for FlakyStore {
    fn create_training(&self, draft: TrainingDraft) -> Result<Training, StoreError> {
        self.inner.create_training(draft)
    }

    fn delete_training(&self, id: &TrainingId) -> Result<(), StoreError> {
        self.inner.delete_training(id)
    }

    fn snapshot(&self, id: &TrainingId) -> Result<Option<TrainingSnapshot>, StoreError> {
        self.inner.snapshot(id)
    }

    fn snapshots(&self) -> Result<Vec<TrainingSnapshot>, StoreError> {
        self.inner.snapshots()
    }

    fn locate_enrollment(&self, id: &EnrollmentId) -> Result<Option<TrainingId>, StoreError> {
        self.inner.locate_enrollment(id)
    }

    fn transact<T, E, F>(&self, id: &TrainingId, work: F) -> Result<T, TransactionError<E>>
    where
        F: FnOnce(&mut dyn TrainingTransaction) -> Result<T, E>,
    {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let conflicted = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(StoreError::Conflict.into());
        }
        self.inner.transact(id, work)
    }
}

/// Store whose backend is permanently offline.
pub(super) struct UnavailableStore;

fn offline() -> StoreError {
    StoreError::Unavailable("database offline".to_string())
}

impl TrainingStore for UnavailableStore {
    fn create_training(&self, _draft: TrainingDraft) -> Result<Training, StoreError> {
        Err(offline())
    }

    fn delete_training(&self, _id: &TrainingId) -> Result<(), StoreError> {
        Err(offline())
    }

    fn snapshot(&self, _id: &TrainingId) -> Result<Option<TrainingSnapshot>, StoreError> {
        Err(offline())
    }

    fn snapshots(&self) -> Result<Vec<TrainingSnapshot>, StoreError> {
        Err(offline())
    }

    fn locate_enrollment(&self, _id: &EnrollmentId) -> Result<Option<TrainingId>, StoreError> {
        Err(offline())
    }

    fn transact<T, E, F>(&self, _id: &TrainingId, _work: F) -> Result<T, TransactionError<E>>
    where
        F: FnOnce(&mut dyn TrainingTransaction) -> Result<T, E>,
    {
        Err(offline().into())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
