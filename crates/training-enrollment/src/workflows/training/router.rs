use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::admission::AdmissionService;
use super::catalog::TrainingCatalog;
use super::clock::Clock;
use super::domain::{
    EmployeeId, EnrollmentId, NewTraining, TrainerId, TrainingChanges, TrainingId,
};
use super::error::EnrollmentError;
use super::store::{RetryPolicy, TrainingStore};

/// Header carrying the authenticated user id, set by the upstream authentication gateway.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the authenticated user's role (`EMPLOYEE` or `TRAINER`).
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Services shared by every route, built over one store.
pub struct TrainingServices<S> {
    pub admission: AdmissionService<S>,
    pub catalog: TrainingCatalog<S>,
}

impl<S> TrainingServices<S>
where
    S: TrainingStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            admission: AdmissionService::new(Arc::clone(&store), Arc::clone(&clock), retry),
            catalog: TrainingCatalog::new(store, clock, retry),
        }
    }
}

/// Authenticated caller as asserted by the gateway headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Employee(EmployeeId),
    Trainer(TrainerId),
}

impl Actor {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let id = headers
            .get(ACTOR_ID_HEADER)?
            .to_str()
            .ok()?
            .trim()
            .to_string();
        if id.is_empty() {
            return None;
        }

        let role = headers.get(ACTOR_ROLE_HEADER)?.to_str().ok()?;
        match role.trim().to_ascii_uppercase().as_str() {
            "EMPLOYEE" => Some(Actor::Employee(EmployeeId(id))),
            "TRAINER" => Some(Actor::Trainer(TrainerId(id))),
            _ => None,
        }
    }
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

#[async_trait]
impl<St> FromRequestParts<St> for Actor
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        Actor::from_headers(&parts.headers)
            .ok_or_else(|| message(StatusCode::UNAUTHORIZED, "Authentication required"))
    }
}

/// Caller that must hold the employee role.
#[derive(Debug, Clone)]
pub struct AsEmployee(pub EmployeeId);

#[async_trait]
impl<St> FromRequestParts<St> for AsEmployee
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        match Actor::from_request_parts(parts, state).await? {
            Actor::Employee(id) => Ok(AsEmployee(id)),
            Actor::Trainer(_) => Err(message(StatusCode::FORBIDDEN, "Employee role required")),
        }
    }
}

/// Caller that must hold the trainer role.
#[derive(Debug, Clone)]
pub struct AsTrainer(pub TrainerId);

#[async_trait]
impl<St> FromRequestParts<St> for AsTrainer
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        match Actor::from_request_parts(parts, state).await? {
            Actor::Trainer(id) => Ok(AsTrainer(id)),
            Actor::Employee(_) => Err(message(StatusCode::FORBIDDEN, "Trainer role required")),
        }
    }
}

/// Map a service outcome onto a stable client-facing status and body.
///
/// Transient outcomes carry a `Retry-After` hint so clients can resubmit the same request.
pub fn error_response(err: EnrollmentError) -> Response {
    let transient = err.is_transient();
    let mut response = match err {
        EnrollmentError::TrainingNotFound(_) => message(StatusCode::NOT_FOUND, "Training not found"),
        EnrollmentError::EnrollmentNotFound(_) => {
            message(StatusCode::NOT_FOUND, "Enrollment not found")
        }
        EnrollmentError::Forbidden { action } => message(
            StatusCode::FORBIDDEN,
            &format!("Not authorized to {action}"),
        ),
        EnrollmentError::AlreadyEnrolled { .. } => {
            message(StatusCode::BAD_REQUEST, "Already enrolled in this training")
        }
        EnrollmentError::AlreadyCancelled { .. } => {
            message(StatusCode::BAD_REQUEST, "Enrollment already cancelled")
        }
        EnrollmentError::Full {
            available_seats,
            seat_limit,
        } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Training is full. No seats available.",
                "availableSeats": available_seats,
                "seatLimit": seat_limit.get(),
            })),
        )
            .into_response(),
        EnrollmentError::InvalidSeatLimit { active_count, .. } => message(
            StatusCode::BAD_REQUEST,
            &format!("Cannot reduce seat limit below current enrollments ({active_count})"),
        ),
        EnrollmentError::InvalidTraining { field, reason } => {
            message(StatusCode::BAD_REQUEST, &format!("{field} {reason}"))
        }
        EnrollmentError::Conflict { .. } => message(
            StatusCode::CONFLICT,
            "Too many concurrent requests for this training, please retry",
        ),
        EnrollmentError::Store(err) => {
            error!(error = %err, "enrollment store failure");
            message(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    };
    if transient {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    }
    response
}

/// Router exposing the training catalog and enrollment endpoints.
pub fn training_router<S>(services: Arc<TrainingServices<S>>) -> Router
where
    S: TrainingStore + 'static,
{
    Router::new()
        .route(
            "/api/trainings",
            get(list_trainings_handler::<S>).post(create_training_handler::<S>),
        )
        .route(
            "/api/trainings/trainer/my-trainings",
            get(trainer_trainings_handler::<S>),
        )
        .route(
            "/api/trainings/:training_id",
            get(get_training_handler::<S>)
                .put(update_training_handler::<S>)
                .delete(delete_training_handler::<S>),
        )
        .route("/api/enrollments", post(enroll_handler::<S>))
        .route(
            "/api/enrollments/my-enrollments",
            get(my_enrollments_handler::<S>),
        )
        .route(
            "/api/enrollments/:enrollment_id",
            axum::routing::delete(cancel_handler::<S>),
        )
        .route(
            "/api/enrollments/training/:training_id",
            get(training_enrollments_handler::<S>),
        )
        .with_state(services)
}

type Services<S> = State<Arc<TrainingServices<S>>>;

pub(crate) async fn list_trainings_handler<S>(
    State(services): Services<S>,
    _actor: Actor,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services.catalog.list_trainings() {
        Ok(trainings) => (StatusCode::OK, Json(json!({ "trainings": trainings }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_training_handler<S>(
    State(services): Services<S>,
    _actor: Actor,
    Path(training_id): Path<String>,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services.catalog.get_training(&TrainingId(training_id)) {
        Ok(training) => (StatusCode::OK, Json(json!({ "training": training }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_training_handler<S>(
    State(services): Services<S>,
    AsTrainer(trainer_id): AsTrainer,
    Json(request): Json<NewTraining>,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services.catalog.create_training(&trainer_id, request) {
        Ok(training) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Training created successfully",
                "training": training,
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn trainer_trainings_handler<S>(
    State(services): Services<S>,
    AsTrainer(trainer_id): AsTrainer,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services.catalog.list_trainer_trainings(&trainer_id) {
        Ok(trainings) => (StatusCode::OK, Json(json!({ "trainings": trainings }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_training_handler<S>(
    State(services): Services<S>,
    AsTrainer(trainer_id): AsTrainer,
    Path(training_id): Path<String>,
    Json(changes): Json<TrainingChanges>,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services
        .catalog
        .update_training(&trainer_id, &TrainingId(training_id), changes)
    {
        Ok(training) => (
            StatusCode::OK,
            Json(json!({
                "message": "Training updated successfully",
                "training": training,
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_training_handler<S>(
    State(services): Services<S>,
    AsTrainer(trainer_id): AsTrainer,
    Path(training_id): Path<String>,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services
        .catalog
        .delete_training(&trainer_id, &TrainingId(training_id))
    {
        Ok(()) => message(StatusCode::OK, "Training deleted successfully"),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnrollRequest {
    pub(crate) training_id: String,
}

pub(crate) async fn enroll_handler<S>(
    State(services): Services<S>,
    AsEmployee(employee_id): AsEmployee,
    Json(request): Json<EnrollRequest>,
) -> Response
where
    S: TrainingStore + 'static,
{
    let training_id = TrainingId(request.training_id);
    match services
        .admission
        .request_enrollment(&employee_id, &training_id)
    {
        Ok(admission) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Enrolled successfully",
                "enrollment": admission.view(),
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn my_enrollments_handler<S>(
    State(services): Services<S>,
    AsEmployee(employee_id): AsEmployee,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services
        .admission
        .list_active_enrollments_for_employee(&employee_id)
    {
        Ok(enrollments) => {
            (StatusCode::OK, Json(json!({ "enrollments": enrollments }))).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_handler<S>(
    State(services): Services<S>,
    AsEmployee(employee_id): AsEmployee,
    Path(enrollment_id): Path<String>,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services
        .admission
        .cancel_enrollment(&employee_id, &EnrollmentId(enrollment_id))
    {
        Ok(enrollment) => (
            StatusCode::OK,
            Json(json!({
                "message": "Enrollment cancelled successfully",
                "enrollment": enrollment,
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn training_enrollments_handler<S>(
    State(services): Services<S>,
    AsTrainer(trainer_id): AsTrainer,
    Path(training_id): Path<String>,
) -> Response
where
    S: TrainingStore + 'static,
{
    match services
        .admission
        .list_active_enrollments_for_training(&TrainingId(training_id), &trainer_id)
    {
        Ok(enrollments) => {
            (StatusCode::OK, Json(json!({ "enrollments": enrollments }))).into_response()
        }
        Err(err) => error_response(err),
    }
}
