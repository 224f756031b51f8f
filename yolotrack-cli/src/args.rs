//! Command-line definitions for both binaries.
//!
//! Long flags keep underscores (`--api_key`, `--version_number`). Every
//! pipeline option is optional on the command line: an absent flag falls
//! through to the environment and then to the defaults.

use clap::{Args, Parser};
use std::path::PathBuf;
use yolotrack_core::{DownloadArgs, TrainArgs};

/// Flags shared by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// TOML defaults file (default: .yolotrack/config.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Download one Roboflow dataset version in one export format.
#[derive(Parser)]
#[command(name = "download-data", version, about, long_about = None)]
pub struct DownloadCli {
    /// Roboflow API key [env: ROBOFLOW_API_KEY]
    #[arg(long = "api_key")]
    pub api_key: Option<String>,

    /// Roboflow workspace [env: ROBOFLOW_WORKSPACE]
    #[arg(long)]
    pub workspace: Option<String>,

    /// Roboflow project [env: ROBOFLOW_PROJECT]
    #[arg(long)]
    pub project: Option<String>,

    /// Dataset version [env: ROBOFLOW_VERSION_NUMBER]
    #[arg(long = "version_number")]
    pub version_number: Option<u32>,

    /// Export format, e.g. yolov8 or coco [env: ROBOFLOW_DOWNLOAD_FORMAT]
    #[arg(long = "download_format")]
    pub download_format: Option<String>,

    /// Parent directory for the dataset folder [env: ROBOFLOW_DOWNLOAD_LOCATION]
    #[arg(long)]
    pub location: Option<PathBuf>,

    /// Re-download even if the dataset folder exists [env: ROBOFLOW_DOWNLOAD_OVERWRITE]
    #[arg(long)]
    pub overwrite: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl DownloadCli {
    pub fn pipeline_args(&self) -> DownloadArgs {
        DownloadArgs {
            api_key: self.api_key.clone(),
            workspace: self.workspace.clone(),
            project: self.project.clone(),
            version_number: self.version_number,
            download_format: self.download_format.clone(),
            location: self.location.clone(),
            overwrite: self.overwrite.then_some(true),
        }
    }
}

/// Train a YOLO detector with the run recorded in MLflow.
#[derive(Parser, Debug)]
#[command(name = "train-yolo", version, about, long_about = None)]
pub struct TrainCli {
    /// MLflow tracking server [env: MLFLOW_TRACKING_URI]
    #[arg(long = "tracking_uri")]
    pub tracking_uri: Option<String>,

    /// MLflow experiment [env: MLFLOW_EXPERIMENT_NAME]
    #[arg(long = "experiment_name")]
    pub experiment_name: Option<String>,

    /// Dataset descriptor (data.yaml)
    #[arg(long = "data_config")]
    pub data_config: Option<PathBuf>,

    /// Model weights or architecture, e.g. yolo11l.pt
    #[arg(long = "model_name")]
    pub model_name: Option<String>,

    /// Training epochs
    #[arg(long)]
    pub epochs: Option<u32>,

    /// Input image size
    #[arg(long = "img_size")]
    pub img_size: Option<u32>,

    /// Batch size (trainer default when omitted)
    #[arg(long = "batch_size")]
    pub batch_size: Option<u32>,

    /// Trainer executable [env: YOLOTRACK_TRAINER_BIN]
    #[arg(long = "trainer_bin")]
    pub trainer_bin: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl TrainCli {
    pub fn pipeline_args(&self) -> TrainArgs {
        TrainArgs {
            tracking_uri: self.tracking_uri.clone(),
            experiment_name: self.experiment_name.clone(),
            data_config: self.data_config.clone(),
            model_name: self.model_name.clone(),
            epochs: self.epochs,
            img_size: self.img_size,
            batch_size: self.batch_size,
            trainer_bin: self.trainer_bin.clone(),
        }
    }
}
