use super::common::*;
use crate::workflows::training::{
    EnrollmentError, NewTraining, SeatLimit, TrainingChanges, TrainingId, TrainingStore,
};

#[test]
fn seat_limit_cannot_drop_below_active_enrollments() {
    let (admission, catalog, _) = build_services();
    let training = publish(&catalog, 2);
    let id = &training.training.id;
    admission.request_enrollment(&employee(1), id).expect("admitted");
    admission.request_enrollment(&employee(2), id).expect("admitted");

    assert!(matches!(
        catalog.try_set_seat_limit(id, 1),
        Err(EnrollmentError::InvalidSeatLimit {
            requested: 1,
            active_count: 2
        })
    ));
    assert_eq!(
        catalog.get_training(id).expect("training").training.seat_limit,
        SeatLimit::new(2).expect("positive")
    );

    let raised = catalog.try_set_seat_limit(id, 3).expect("raised");
    assert_eq!(raised.training.seat_limit.get(), 3);
    assert_eq!(raised.available_seats, 1);
    admission
        .request_enrollment(&employee(3), id)
        .expect("new limit applies immediately");
}

#[test]
fn seat_limit_may_shrink_to_exactly_the_active_count() {
    let (admission, catalog, _) = build_services();
    let training = publish(&catalog, 5);
    let id = &training.training.id;
    admission.request_enrollment(&employee(1), id).expect("admitted");
    admission.request_enrollment(&employee(2), id).expect("admitted");

    let shrunk = catalog.try_set_seat_limit(id, 2).expect("shrunk");
    assert!(shrunk.is_full);
    assert!(matches!(
        admission.request_enrollment(&employee(3), id),
        Err(EnrollmentError::Full { .. })
    ));
    assert!(matches!(
        catalog.try_set_seat_limit(&TrainingId::new("trn-404"), 9),
        Err(EnrollmentError::TrainingNotFound(_))
    ));
}

#[test]
fn create_validates_required_fields() {
    let (_, catalog, _) = build_services();

    let blank_title = NewTraining {
        title: "   ".to_string(),
        ..new_training(3)
    };
    assert!(matches!(
        catalog.create_training(&trainer(), blank_title),
        Err(EnrollmentError::InvalidTraining { field: "title", .. })
    ));
    assert!(matches!(
        catalog.create_training(&trainer(), new_training(0)),
        Err(EnrollmentError::InvalidTraining {
            field: "seatLimit",
            ..
        })
    ));

    let created = catalog
        .create_training(
            &trainer(),
            NewTraining {
                title: "  Ladder safety ".to_string(),
                ..new_training(4)
            },
        )
        .expect("published");
    assert_eq!(created.training.title, "Ladder safety");
    assert_eq!(created.training.trainer_id, trainer());
    assert_eq!(created.available_seats, 4);
    assert_eq!(created.enrolled_count, 0);
}

#[test]
fn update_is_reserved_for_the_owner() {
    let (admission, catalog, _) = build_services();
    let training = publish(&catalog, 2);
    let id = &training.training.id;
    admission.request_enrollment(&employee(1), id).expect("admitted");

    let changes = TrainingChanges {
        title: Some("Renamed".to_string()),
        ..TrainingChanges::default()
    };
    assert!(matches!(
        catalog.update_training(&other_trainer(), id, changes.clone()),
        Err(EnrollmentError::Forbidden { .. })
    ));

    let updated = catalog
        .update_training(&trainer(), id, changes)
        .expect("owner updates");
    assert_eq!(updated.training.title, "Renamed");
    assert_eq!(updated.training.description, training.training.description);
    assert_eq!(updated.enrolled_count, 1);
}

#[test]
fn update_rejects_seat_reduction_and_keeps_other_fields() {
    let (admission, catalog, _) = build_services();
    let training = publish(&catalog, 3);
    let id = &training.training.id;
    admission.request_enrollment(&employee(1), id).expect("admitted");
    admission.request_enrollment(&employee(2), id).expect("admitted");

    let changes = TrainingChanges {
        title: Some("Should not apply".to_string()),
        seat_limit: Some(1),
        ..TrainingChanges::default()
    };
    assert!(matches!(
        catalog.update_training(&trainer(), id, changes),
        Err(EnrollmentError::InvalidSeatLimit { .. })
    ));
    let unchanged = catalog.get_training(id).expect("training");
    assert_eq!(unchanged.training.title, training.training.title);
    assert_eq!(unchanged.training.seat_limit.get(), 3);

    let blank = TrainingChanges {
        description: Some(String::new()),
        ..TrainingChanges::default()
    };
    assert!(matches!(
        catalog.update_training(&trainer(), id, blank),
        Err(EnrollmentError::InvalidTraining {
            field: "description",
            ..
        })
    ));
}

#[test]
fn delete_cascades_to_enrollments() {
    let (admission, catalog, store) = build_services();
    let training = publish(&catalog, 2);
    let id = &training.training.id;
    let admitted = admission
        .request_enrollment(&employee(1), id)
        .expect("admitted");

    assert!(matches!(
        catalog.delete_training(&other_trainer(), id),
        Err(EnrollmentError::Forbidden { .. })
    ));
    catalog.delete_training(&trainer(), id).expect("deleted");

    assert!(store.snapshot(id).unwrap().is_none());
    assert!(matches!(
        catalog.get_training(id),
        Err(EnrollmentError::TrainingNotFound(_))
    ));
    assert!(matches!(
        admission.cancel_enrollment(&employee(1), &admitted.enrollment.id),
        Err(EnrollmentError::EnrollmentNotFound(_))
    ));
    assert!(admission
        .list_active_enrollments_for_employee(&employee(1))
        .expect("listing")
        .is_empty());
}

#[test]
fn listings_count_only_active_enrollments() {
    let (admission, catalog, _) = build_services();
    let older = publish(&catalog, 2);
    let newer = catalog
        .create_training(&other_trainer(), new_training(1))
        .expect("published");

    let admitted = admission
        .request_enrollment(&employee(1), &older.training.id)
        .expect("admitted");
    admission
        .cancel_enrollment(&employee(1), &admitted.enrollment.id)
        .expect("cancelled");
    admission
        .request_enrollment(&employee(2), &older.training.id)
        .expect("admitted");

    let all = catalog.list_trainings().expect("listing");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].training.id, newer.training.id);
    assert_eq!(all[1].enrolled_count, 1);
    assert_eq!(all[1].available_seats, 1);
    assert!(!all[1].is_full);

    let mine = catalog
        .list_trainer_trainings(&trainer())
        .expect("trainer listing");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].training.training.id, older.training.id);
    assert_eq!(mine[0].enrollments.len(), 1);
    assert_eq!(mine[0].enrollments[0].employee_id, employee(2));
}

#[test]
fn active_count_reflects_admissions_immediately() {
    let (admission, catalog, _) = build_services();
    let training = publish(&catalog, 10);
    let id = &training.training.id;

    for n in 0..4 {
        admission.request_enrollment(&employee(n), id).expect("admitted");
        assert_eq!(catalog.active_count(id).expect("count"), n as u32 + 1);
    }
}
