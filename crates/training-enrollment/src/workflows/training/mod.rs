//! Training catalog and seat-capacity enforced enrollment.
//!
//! [`AdmissionService`] decides whether an employee is admitted to a training, re-admitted after a
//! cancellation, or rejected because the training is full. The invariant it protects is that the
//! number of active enrollments of a training never exceeds its seat limit, including when many
//! requests race for the last seat. [`TrainingCatalog`] manages the trainings themselves and
//! guards seat-limit reductions with the same rule.

pub mod admission;
pub mod capacity;
pub mod catalog;
pub mod clock;
pub mod domain;
pub mod error;
pub mod memory;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use admission::{Admission, AdmissionKind, AdmissionService};
pub use capacity::{check_seat_limit, CapacitySnapshot, EnrollmentView, RosterView, TrainingView};
pub use catalog::TrainingCatalog;
pub use clock::{Clock, SystemClock};
pub use domain::{
    EmployeeId, Enrollment, EnrollmentId, EnrollmentStatus, NewTraining, SeatLimit, TrainerId,
    Training, TrainingChanges, TrainingDraft, TrainingId,
};
pub use error::EnrollmentError;
pub use memory::InMemoryTrainingStore;
pub use router::{training_router, Actor, TrainingServices, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
pub use store::{
    RetryPolicy, StoreError, TrainingSnapshot, TrainingStore, TrainingTransaction,
    TransactionError,
};
