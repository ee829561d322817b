use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use training_enrollment::error::AppError;
use training_enrollment::workflows::training::{
    NewTraining, TrainerId, TrainingCatalog, TrainingStore, TrainingView,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// One training published at startup from a seed file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SeedTraining {
    pub(crate) trainer_id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) seat_limit: u32,
}

pub(crate) fn parse_seed(raw: &str) -> Result<Vec<SeedTraining>, AppError> {
    Ok(serde_json::from_str(raw)?)
}

pub(crate) fn read_seed_file(path: &Path) -> Result<Vec<SeedTraining>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    parse_seed(&raw)
}

/// Publish every seeded training through the catalog so the usual validation applies.
pub(crate) fn apply_seed<S>(
    catalog: &TrainingCatalog<S>,
    seed: Vec<SeedTraining>,
) -> Result<Vec<TrainingView>, AppError>
where
    S: TrainingStore + 'static,
{
    seed.into_iter()
        .map(|entry| {
            let trainer = TrainerId::new(entry.trainer_id);
            let training = NewTraining {
                title: entry.title,
                description: entry.description,
                seat_limit: entry.seat_limit,
            };
            catalog
                .create_training(&trainer, training)
                .map_err(AppError::from)
        })
        .collect()
}
