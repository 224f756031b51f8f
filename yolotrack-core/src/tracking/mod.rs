//! Experiment tracking collaborator and the scoped tracked-run lifecycle.

pub mod mlflow;

use crate::error::TrackingError;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{info, warn};

pub use mlflow::MlflowClient;

/// An open run on the tracking server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    pub experiment_id: String,
    pub run_name: String,
}

/// Terminal state a run is closed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// Experiment tracking server.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// URI of the tracking server, handed to the trainer so its own
    /// auto-logging reports to the same place.
    fn tracking_uri(&self) -> &str;

    /// Look up an experiment by name, creating it when absent. Returns the
    /// experiment id.
    async fn resolve_experiment(&self, name: &str) -> Result<String, TrackingError>;

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<RunHandle, TrackingError>;

    async fn log_param(&self, run: &RunHandle, key: &str, value: &str)
    -> Result<(), TrackingError>;

    async fn end_run(&self, run: &RunHandle, status: RunStatus) -> Result<(), TrackingError>;
}

/// Run `body` inside a tracked run.
///
/// The run is created before `body` starts and closed exactly once after it
/// ends: `FINISHED` when the body returns `Ok`, `FAILED` when it returns
/// `Err` or panics. A panic is resumed after the run is closed. A failure to
/// close the run is only reported when the body itself succeeded; otherwise
/// the body's error wins and the close failure is logged.
pub async fn scoped_run<T, E, F, Fut>(
    tracker: &dyn Tracker,
    experiment_id: &str,
    run_name: &str,
    body: F,
) -> Result<T, E>
where
    F: FnOnce(RunHandle) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<TrackingError>,
{
    let run = tracker.create_run(experiment_id, run_name).await?;
    info!(run_id = run.run_id.as_str(), run_name, "Started tracked run");

    let outcome = AssertUnwindSafe(body(run.clone())).catch_unwind().await;

    let status = match &outcome {
        Ok(Ok(_)) => RunStatus::Finished,
        _ => RunStatus::Failed,
    };
    let closed = tracker.end_run(&run, status).await;
    info!(
        run_id = run.run_id.as_str(),
        status = status.as_str(),
        "Closed tracked run"
    );

    match outcome {
        Ok(Ok(value)) => {
            closed?;
            Ok(value)
        }
        Ok(Err(err)) => {
            if let Err(close_err) = closed {
                warn!(run_id = run.run_id.as_str(), error = %close_err, "Failed to close run");
            }
            Err(err)
        }
        Err(panic) => {
            if let Err(close_err) = closed {
                warn!(run_id = run.run_id.as_str(), error = %close_err, "Failed to close run");
            }
            std::panic::resume_unwind(panic)
        }
    }
}
