//! Ultralytics YOLO trainer, driven through the `yolo` command-line entry
//! point.
//!
//! The child process receives the tracking destination, experiment name and
//! open run id through its own environment, so the library's MLflow
//! callback attaches to the run this process opened. The parent environment
//! is never modified.

use super::{Trainer, TrainingJob};
use crate::config::env_vars;
use crate::error::TrainingError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub struct UltralyticsTrainer {
    program: PathBuf,
}

impl UltralyticsTrainer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `detect train key=value ...` arguments for a job. `batch=` is only
    /// passed when a batch size was configured.
    pub fn args(job: &TrainingJob) -> Vec<String> {
        let mut args = vec![
            "detect".to_string(),
            "train".to_string(),
            format!("data={}", job.data_config.display()),
            format!("model={}", job.model_name),
            format!("epochs={}", job.epochs),
            format!("imgsz={}", job.img_size),
        ];
        if let Some(batch) = job.batch_size {
            args.push(format!("batch={batch}"));
        }
        args.push(format!("name={}", job.output_name));
        args
    }

    /// Environment for the child process.
    pub fn envs(job: &TrainingJob) -> Vec<(&'static str, String)> {
        vec![
            (
                env_vars::MLFLOW_TRACKING_URI,
                job.tracking.tracking_uri.clone(),
            ),
            (
                env_vars::MLFLOW_EXPERIMENT_NAME,
                job.tracking.experiment_name.clone(),
            ),
            (env_vars::MLFLOW_RUN_ID, job.tracking.run_id.clone()),
        ]
    }
}

impl Default for UltralyticsTrainer {
    fn default() -> Self {
        Self::new("yolo")
    }
}

#[async_trait]
impl Trainer for UltralyticsTrainer {
    async fn train(&self, job: &TrainingJob) -> Result<(), TrainingError> {
        let args = Self::args(job);
        info!(
            program = %self.program.display(),
            model = job.model_name.as_str(),
            epochs = job.epochs,
            "Starting YOLO training"
        );
        debug!(?args, "Trainer arguments");

        let status = Command::new(&self.program)
            .args(&args)
            .envs(Self::envs(job))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| TrainingError::Spawn {
                program: self.program.display().to_string(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(TrainingError::Failed {
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
