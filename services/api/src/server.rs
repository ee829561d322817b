use crate::cli::ServeArgs;
use crate::infra::{apply_seed, read_seed_file, AppState};
use crate::routes::with_training_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;
use training_enrollment::config::AppConfig;
use training_enrollment::error::AppError;
use training_enrollment::telemetry;
use training_enrollment::workflows::training::{
    InMemoryTrainingStore, SystemClock, TrainingServices,
};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryTrainingStore::new());
    let services = Arc::new(TrainingServices::new(
        store,
        Arc::new(SystemClock),
        config.enrollment.retry_policy(),
    ));

    if let Some(path) = args.seed.take() {
        let seed = read_seed_file(&path)?;
        let published = apply_seed(&services.catalog, seed)?;
        info!(path = %path.display(), trainings = published.len(), "seed trainings published");
    }

    let app = with_training_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_attempts = config.enrollment.max_attempts,
        "training enrollment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
