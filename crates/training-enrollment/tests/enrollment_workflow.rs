use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, TimeZone, Utc};
use training_enrollment::workflows::training::{
    AdmissionKind, Clock, EmployeeId, EnrollmentError, EnrollmentStatus, InMemoryTrainingStore,
    NewTraining, RetryPolicy, TrainerId, TrainingChanges, TrainingServices, TrainingStore,
};

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn services() -> (
    TrainingServices<InMemoryTrainingStore>,
    Arc<InMemoryTrainingStore>,
) {
    let store = Arc::new(InMemoryTrainingStore::new());
    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2025, 5, 12, 9, 0, 0)
            .single()
            .expect("valid timestamp"),
    ));
    (
        TrainingServices::new(store.clone(), clock, RetryPolicy::default()),
        store,
    )
}

fn lockout_tagout() -> NewTraining {
    NewTraining {
        title: "Lockout/tagout".to_string(),
        description: "Energy isolation for maintenance crews".to_string(),
        seat_limit: 2,
    }
}

#[test]
fn seat_lifecycle_from_publication_to_reassignment() {
    let (services, store) = services();
    let trainer = TrainerId::new("trainer-lin");
    let training = services
        .catalog
        .create_training(&trainer, lockout_tagout())
        .expect("training published");
    let id = training.training.id.clone();
    assert_eq!(training.available_seats, 2);

    let first = services
        .admission
        .request_enrollment(&EmployeeId::new("emp-100"), &id)
        .expect("first seat");
    services
        .admission
        .request_enrollment(&EmployeeId::new("emp-101"), &id)
        .expect("second seat");

    match services
        .admission
        .request_enrollment(&EmployeeId::new("emp-102"), &id)
    {
        Err(EnrollmentError::Full {
            available_seats: 0,
            seat_limit,
        }) => assert_eq!(seat_limit.get(), 2),
        other => panic!("expected the training to be full, got {other:?}"),
    }

    let cancelled = services
        .admission
        .cancel_enrollment(&EmployeeId::new("emp-100"), &first.enrollment.id)
        .expect("cancelled");
    assert_eq!(cancelled.status, EnrollmentStatus::Cancelled);

    let reassigned = services
        .admission
        .request_enrollment(&EmployeeId::new("emp-102"), &id)
        .expect("freed seat reassigned");
    assert_eq!(reassigned.kind, AdmissionKind::Fresh);
    assert!(reassigned.training.is_full);

    let roster = services
        .admission
        .list_active_enrollments_for_training(&id, &trainer)
        .expect("roster");
    let mut employees: Vec<&str> = roster
        .iter()
        .map(|view| view.enrollment.employee_id.as_str())
        .collect();
    employees.sort_unstable();
    assert_eq!(employees, vec!["emp-101", "emp-102"]);

    let snapshot = store.snapshot(&id).expect("store").expect("present");
    assert_eq!(snapshot.enrollments.len(), 3);
    assert_eq!(snapshot.active_count(), 2);
}

#[test]
fn concurrent_admissions_and_limit_changes_respect_capacity() {
    let (services, _) = services();
    let trainer = TrainerId::new("trainer-lin");
    let training = services
        .catalog
        .create_training(
            &trainer,
            NewTraining {
                seat_limit: 6,
                ..lockout_tagout()
            },
        )
        .expect("training published");
    let id = training.training.id.clone();
    let barrier = Barrier::new(21);

    let limit_change = thread::scope(|scope| {
        for n in 0..20 {
            let barrier = &barrier;
            let services = &services;
            let id = &id;
            scope.spawn(move || {
                barrier.wait();
                let _ = services
                    .admission
                    .request_enrollment(&EmployeeId(format!("emp-{n:03}")), id);
            });
        }
        let shrink = scope.spawn(|| {
            barrier.wait();
            services.catalog.update_training(
                &trainer,
                &id,
                TrainingChanges {
                    seat_limit: Some(3),
                    ..TrainingChanges::default()
                },
            )
        });
        shrink.join().expect("limit change thread")
    });

    let view = services.catalog.get_training(&id).expect("training");
    assert!(view.enrolled_count <= view.training.seat_limit.get());
    match limit_change {
        Ok(_) => assert_eq!(view.training.seat_limit.get(), 3),
        Err(EnrollmentError::InvalidSeatLimit { active_count, .. }) => {
            assert!(active_count > 3);
            assert_eq!(view.training.seat_limit.get(), 6);
        }
        Err(other) => panic!("unexpected limit change failure: {other:?}"),
    }
}

#[test]
fn deleting_a_training_removes_it_from_every_listing() {
    let (services, _) = services();
    let trainer = TrainerId::new("trainer-lin");
    let employee = EmployeeId::new("emp-200");
    let training = services
        .catalog
        .create_training(&trainer, lockout_tagout())
        .expect("training published");
    services
        .admission
        .request_enrollment(&employee, &training.training.id)
        .expect("admitted");

    services
        .catalog
        .delete_training(&trainer, &training.training.id)
        .expect("deleted");

    assert!(services.catalog.list_trainings().expect("listing").is_empty());
    assert!(services
        .catalog
        .list_trainer_trainings(&trainer)
        .expect("listing")
        .is_empty());
    assert!(services
        .admission
        .list_active_enrollments_for_employee(&employee)
        .expect("listing")
        .is_empty());
}
