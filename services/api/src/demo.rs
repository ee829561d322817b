use clap::Args;
use std::sync::{Arc, Barrier};
use std::thread;
use tracing::error;
use training_enrollment::error::AppError;
use training_enrollment::workflows::training::{
    Admission, AdmissionKind, EmployeeId, EnrollmentError, InMemoryTrainingStore, NewTraining,
    RetryPolicy, SystemClock, TrainerId, TrainingServices,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Seats offered by the demo training
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) seat_limit: u32,
    /// Employees requesting a seat at the same instant
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=512))]
    pub(crate) employees: u32,
}

/// Tally of one admission race.
#[derive(Debug, Default)]
pub(crate) struct RaceOutcome {
    pub(crate) admitted: Vec<Admission>,
    pub(crate) rejected_full: usize,
    pub(crate) failed: Vec<EnrollmentError>,
}

pub(crate) fn race_for_seats(seat_limit: u32, employees: u32) -> Result<RaceOutcome, AppError> {
    let services = TrainingServices::new(
        Arc::new(InMemoryTrainingStore::new()),
        Arc::new(SystemClock),
        RetryPolicy::default(),
    );
    let trainer = TrainerId::new("demo-trainer");
    let training = services.catalog.create_training(
        &trainer,
        NewTraining {
            title: "Fire warden certification".to_string(),
            description: "Evacuation procedures and extinguisher handling".to_string(),
            seat_limit,
        },
    )?;
    let training_id = training.training.id;

    let barrier = Barrier::new(employees as usize);
    let results: Vec<Result<Admission, EnrollmentError>> = thread::scope(|scope| {
        let handles: Vec<_> = (1..=employees)
            .map(|n| {
                let barrier = &barrier;
                let admission = &services.admission;
                let training_id = &training_id;
                scope.spawn(move || {
                    barrier.wait();
                    admission.request_enrollment(&EmployeeId(format!("emp-{n:03}")), training_id)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    let mut outcome = RaceOutcome::default();
    for result in results {
        match result {
            Ok(admission) => outcome.admitted.push(admission),
            Err(EnrollmentError::Full { .. }) => outcome.rejected_full += 1,
            Err(err) => outcome.failed.push(err),
        }
    }
    outcome
        .admitted
        .sort_by(|a, b| a.enrollment.employee_id.cmp(&b.enrollment.employee_id));

    let active = services.catalog.active_count(&training_id)?;
    if active as usize != outcome.admitted.len() {
        error!(
            active,
            admitted = outcome.admitted.len(),
            "demo race left an inconsistent roster"
        );
    }

    Ok(outcome)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        seat_limit,
        employees,
    } = args;

    println!("Training enrollment demo");
    println!(
        "- {} employees request one of {} seats at the same instant",
        employees, seat_limit
    );

    let outcome = race_for_seats(seat_limit, employees)?;

    println!("Admitted ({}):", outcome.admitted.len());
    for admission in &outcome.admitted {
        let kind = match admission.kind {
            AdmissionKind::Fresh => "new",
            AdmissionKind::Readmitted => "returning",
        };
        println!(
            "  - {} -> {} [{}, {}]",
            admission.enrollment.employee_id,
            admission.enrollment.id,
            admission.enrollment.status.label(),
            kind
        );
    }
    println!("Rejected as full: {}", outcome.rejected_full);
    for err in &outcome.failed {
        println!("  Unexpected failure: {}", err);
    }

    let expected = seat_limit.min(employees) as usize;
    if outcome.admitted.len() == expected && outcome.failed.is_empty() {
        println!("Seat limit held: {} of {} seats filled", expected, seat_limit);
    } else {
        println!(
            "Seat limit check failed: {} admitted, expected {}",
            outcome.admitted.len(),
            expected
        );
    }

    Ok(())
}
