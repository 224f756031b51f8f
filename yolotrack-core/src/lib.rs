//! # yolotrack-core
//!
//! Workflow glue for two one-shot pipelines:
//!
//! - **download**: resolve Roboflow settings, fetch one dataset version in
//!   one export format, unpack it locally.
//! - **train**: resolve MLflow and training settings, open a tracked run,
//!   record accelerator inventory and dataset provenance, then hand the fit
//!   to Ultralytics.
//!
//! Every external service sits behind a trait ([`DatasetHost`],
//! [`Tracker`], [`Trainer`], [`GpuProbe`]) so the pipelines can be driven
//! with in-process fakes.

pub mod config;
pub mod dataset;
pub mod error;
pub mod gpu;
pub mod pipeline;
pub mod tracking;
pub mod training;

pub use config::{
    Defaults, DownloadArgs, DownloadConfig, EnvSource, ProcessEnv, TrainArgs, TrainConfig,
    load_defaults,
};
pub use dataset::{DatasetHost, DatasetLocation, RoboflowClient};
pub use error::{
    ConfigError, DatasetError, GpuError, TrackingError, TrainingError, YoloTrackError,
};
pub use gpu::{GpuInventory, GpuProbe, NvidiaSmiProbe};
pub use tracking::{MlflowClient, RunHandle, RunStatus, Tracker, scoped_run};
pub use training::{RunIdentifier, Trainer, TrainingJob, UltralyticsTrainer};
