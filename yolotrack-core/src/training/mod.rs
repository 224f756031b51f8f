//! Training delegation: run naming, job description, trainer backends.

pub mod ultralytics;

use crate::error::TrainingError;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub use ultralytics::UltralyticsTrainer;

/// Label for one training invocation: model, epoch count and start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentifier {
    model_name: String,
    epochs: u32,
    started_at: DateTime<Local>,
}

impl RunIdentifier {
    pub fn new(model_name: &str, epochs: u32, started_at: DateTime<Local>) -> Self {
        Self {
            model_name: model_name.to_string(),
            epochs,
            started_at,
        }
    }

    /// Identifier stamped with the current local time.
    pub fn now(model_name: &str, epochs: u32) -> Self {
        Self::new(model_name, epochs, Local::now())
    }

    /// `yolo11l.pt-e100-20250301-142530`
    pub fn run_name(&self) -> String {
        format!(
            "{}-{}",
            self.output_name(),
            self.started_at.format("%Y%m%d-%H%M%S")
        )
    }

    /// Name of the trainer's output directory: `yolo11l.pt-e100`.
    pub fn output_name(&self) -> String {
        format!("{}-e{}", self.model_name, self.epochs)
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }
}

impl fmt::Display for RunIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.run_name())
    }
}

/// Where the trainer's own auto-logging should report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingContext {
    pub tracking_uri: String,
    pub experiment_name: String,
    pub run_id: String,
}

/// Everything the trainer needs for one fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJob {
    pub data_config: PathBuf,
    pub model_name: String,
    pub epochs: u32,
    pub img_size: u32,
    pub batch_size: Option<u32>,
    pub output_name: String,
    pub tracking: TrackingContext,
}

/// Object-detection training backend. `train` blocks until the fit ends.
#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(&self, job: &TrainingJob) -> Result<(), TrainingError>;
}
