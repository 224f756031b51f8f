//! Tracked training pipeline.
//!
//! Order of operations:
//! 1. resolve the experiment on the tracking server
//! 2. best-effort read of the dataset provenance URL
//! 3. compute the run identifier
//! 4. open a scoped run, log GPU inventory and provenance, delegate training
//! 5. the run is closed whatever the outcome

use crate::config::TrainConfig;
use crate::dataset::read_provenance;
use crate::error::YoloTrackError;
use crate::gpu::GpuProbe;
use crate::tracking::{RunHandle, Tracker, scoped_run};
use crate::training::{RunIdentifier, Trainer, TrackingContext, TrainingJob};
use tracing::{info, warn};

/// Run parameter carrying the dataset's source URL.
pub const DATASET_URL_PARAM: &str = "dataset_url";

/// External collaborators of the training pipeline.
pub struct TrainCollaborators<'a> {
    pub tracker: &'a dyn Tracker,
    pub gpu: &'a dyn GpuProbe,
    pub trainer: &'a dyn Trainer,
}

/// What a completed training run was recorded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainOutcome {
    pub run: RunHandle,
    pub output_name: String,
}

pub async fn run(
    config: &TrainConfig,
    collaborators: TrainCollaborators<'_>,
) -> Result<TrainOutcome, YoloTrackError> {
    run_as(
        config,
        collaborators,
        RunIdentifier::now(&config.model_name, config.epochs),
    )
    .await
}

/// Same as [`run`] with a caller-supplied run identifier.
pub async fn run_as(
    config: &TrainConfig,
    collaborators: TrainCollaborators<'_>,
    identifier: RunIdentifier,
) -> Result<TrainOutcome, YoloTrackError> {
    let TrainCollaborators {
        tracker,
        gpu,
        trainer,
    } = collaborators;

    let experiment_id = tracker.resolve_experiment(&config.experiment_name).await?;
    info!(
        tracking_uri = tracker.tracking_uri(),
        experiment = config.experiment_name.as_str(),
        experiment_id = experiment_id.as_str(),
        "Using experiment"
    );

    let provenance = read_provenance(&config.data_config);
    if let Some(warning) = &provenance.warning {
        warn!("{warning}");
    }

    let run_name = identifier.run_name();
    let output_name = identifier.output_name();

    scoped_run(tracker, &experiment_id, &run_name, |run| async move {
        let inventory = gpu.inventory().await?;
        info!(gpu_count = inventory.count(), "Captured accelerator inventory");

        let mut params = inventory.params();
        if let Some(url) = provenance.url {
            params.push((DATASET_URL_PARAM.to_string(), url));
        }
        for (key, value) in &params {
            tracker.log_param(&run, key, value).await?;
        }

        let job = TrainingJob {
            data_config: config.data_config.clone(),
            model_name: config.model_name.clone(),
            epochs: config.epochs,
            img_size: config.img_size,
            batch_size: config.batch_size,
            output_name: output_name.clone(),
            tracking: TrackingContext {
                tracking_uri: tracker.tracking_uri().to_string(),
                experiment_name: config.experiment_name.clone(),
                run_id: run.run_id.clone(),
            },
        };
        trainer.train(&job).await?;

        Ok::<_, YoloTrackError>(TrainOutcome { run, output_name })
    })
    .await
}
