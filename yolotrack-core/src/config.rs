//! Configuration resolution for the download and training pipelines.
//!
//! Every option is resolved from three tiers, first defined value wins:
//! explicit command-line argument -> environment variable -> default.
//!
//! The default tier itself is layered with `figment`: built-in defaults,
//! optionally overridden by a TOML defaults file (`--config <path>` or
//! `.yolotrack/config.toml` in the workspace). A defaults file never outranks
//! the environment or the command line.

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable names consumed by the pipelines.
pub mod env_vars {
    pub const ROBOFLOW_API_KEY: &str = "ROBOFLOW_API_KEY";
    pub const ROBOFLOW_WORKSPACE: &str = "ROBOFLOW_WORKSPACE";
    pub const ROBOFLOW_PROJECT: &str = "ROBOFLOW_PROJECT";
    pub const ROBOFLOW_VERSION_NUMBER: &str = "ROBOFLOW_VERSION_NUMBER";
    pub const ROBOFLOW_DOWNLOAD_FORMAT: &str = "ROBOFLOW_DOWNLOAD_FORMAT";
    pub const ROBOFLOW_DOWNLOAD_LOCATION: &str = "ROBOFLOW_DOWNLOAD_LOCATION";
    pub const ROBOFLOW_DOWNLOAD_OVERWRITE: &str = "ROBOFLOW_DOWNLOAD_OVERWRITE";
    pub const MLFLOW_TRACKING_URI: &str = "MLFLOW_TRACKING_URI";
    pub const MLFLOW_EXPERIMENT_NAME: &str = "MLFLOW_EXPERIMENT_NAME";
    pub const MLFLOW_RUN_ID: &str = "MLFLOW_RUN_ID";
    pub const YOLOTRACK_TRAINER_BIN: &str = "YOLOTRACK_TRAINER_BIN";
}

/// Read-only view of environment variables.
///
/// The pipelines never read `std::env` directly so resolution can be
/// exercised against a plain map.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Which tier supplied a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Argument,
    Environment,
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Argument => write!(f, "argument"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// Three-tier option resolver.
pub struct Resolver<'a> {
    env: &'a dyn EnvSource,
}

impl<'a> Resolver<'a> {
    pub fn new(env: &'a dyn EnvSource) -> Self {
        Self { env }
    }

    /// Resolve an option that always has a value.
    pub fn resolve<T: FromStr>(
        &self,
        option: &'static str,
        arg: Option<T>,
        env_key: Option<&'static str>,
        default: T,
    ) -> Result<T, ConfigError> {
        Ok(self
            .pick(option, arg, env_key)?
            .unwrap_or_else(|| {
                debug!(option, source = %ValueSource::Default, "Resolved option");
                default
            }))
    }

    /// Resolve an option whose default may be unset.
    pub fn resolve_optional<T: FromStr>(
        &self,
        option: &'static str,
        arg: Option<T>,
        env_key: Option<&'static str>,
        default: Option<T>,
    ) -> Result<Option<T>, ConfigError> {
        Ok(self.pick(option, arg, env_key)?.or(default))
    }

    /// Resolve a credential. There is no default tier: a missing or blank
    /// value fails resolution.
    pub fn require(
        &self,
        option: &'static str,
        arg: Option<String>,
        env_key: &'static str,
    ) -> Result<String, ConfigError> {
        let arg = arg.filter(|v| !v.trim().is_empty());
        self.pick(option, arg, Some(env_key))?
            .ok_or(ConfigError::MissingCredential {
                option,
                env_var: env_key,
            })
    }

    fn pick<T: FromStr>(
        &self,
        option: &'static str,
        arg: Option<T>,
        env_key: Option<&'static str>,
    ) -> Result<Option<T>, ConfigError> {
        if let Some(value) = arg {
            debug!(option, source = %ValueSource::Argument, "Resolved option");
            return Ok(Some(value));
        }

        let Some(key) = env_key else {
            return Ok(None);
        };
        let Some(raw) = self.env.var(key).filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };

        let value = raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue {
                option,
                origin: key.to_string(),
                value: raw.clone(),
            })?;
        debug!(option, source = %ValueSource::Environment, env = key, "Resolved option");
        Ok(Some(value))
    }
}

/// Built-in defaults for both pipelines, optionally overridden from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub download: DownloadDefaults,
    pub train: TrainDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadDefaults {
    pub workspace: String,
    pub project: String,
    pub version_number: u32,
    pub download_format: String,
    /// Parent directory the dataset folder is created in.
    pub location: PathBuf,
    /// Re-download even when the dataset folder already exists.
    pub overwrite: bool,
}

impl Default for DownloadDefaults {
    fn default() -> Self {
        Self {
            workspace: "cody-brownstein".to_string(),
            project: "monster-jam-detection".to_string(),
            version_number: 9,
            download_format: "yolov8".to_string(),
            location: PathBuf::from("datasets"),
            overwrite: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainDefaults {
    pub tracking_uri: String,
    pub experiment_name: String,
    pub data_config: PathBuf,
    pub model_name: String,
    pub epochs: u32,
    pub img_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    pub trainer_bin: PathBuf,
}

impl Default for TrainDefaults {
    fn default() -> Self {
        Self {
            tracking_uri: "http://127.0.0.1:5000".to_string(),
            experiment_name: "Monster Jam Detection".to_string(),
            data_config: PathBuf::from("datasets/Monster-Jam-Detection-9/data.yaml"),
            model_name: "yolo11l.pt".to_string(),
            epochs: 100,
            img_size: 640,
            batch_size: None,
            trainer_bin: PathBuf::from("yolo"),
        }
    }
}

/// Load the default tier.
///
/// Priority (highest to lowest):
/// 1. Explicit defaults file, if given (must exist)
/// 2. Workspace defaults file (`.yolotrack/config.toml`), if present
/// 3. Built-in defaults
pub fn load_defaults(
    explicit: Option<&Path>,
    workspace: Option<&Path>,
) -> Result<Defaults, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Defaults::default()));

    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::DefaultsFileNotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            if let Some(ws) = workspace {
                let ws_config = ws.join(".yolotrack").join("config.toml");
                if ws_config.exists() {
                    debug!(path = %ws_config.display(), "Loading workspace defaults");
                    figment = figment.merge(Toml::file(&ws_config));
                }
            }
        }
    }

    figment.extract().map_err(|e| ConfigError::from(Box::new(e)))
}

/// Command-line values for the download pipeline. `None` means "not passed".
#[derive(Debug, Clone, Default)]
pub struct DownloadArgs {
    pub api_key: Option<String>,
    pub workspace: Option<String>,
    pub project: Option<String>,
    pub version_number: Option<u32>,
    pub download_format: Option<String>,
    pub location: Option<PathBuf>,
    pub overwrite: Option<bool>,
}

/// Resolved configuration for one download run.
#[derive(Clone, PartialEq)]
pub struct DownloadConfig {
    pub api_key: String,
    pub workspace: String,
    pub project: String,
    pub version_number: u32,
    pub download_format: String,
    pub location: PathBuf,
    pub overwrite: bool,
}

impl fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("api_key", &"[REDACTED]")
            .field("workspace", &self.workspace)
            .field("project", &self.project)
            .field("version_number", &self.version_number)
            .field("download_format", &self.download_format)
            .field("location", &self.location)
            .field("overwrite", &self.overwrite)
            .finish()
    }
}

impl DownloadConfig {
    /// Resolve the download configuration. Fails before anything else when
    /// no API key is available.
    pub fn resolve(
        args: DownloadArgs,
        env: &dyn EnvSource,
        defaults: &DownloadDefaults,
    ) -> Result<Self, ConfigError> {
        use env_vars::*;
        let r = Resolver::new(env);

        let api_key = r.require("api_key", args.api_key, ROBOFLOW_API_KEY)?;
        Ok(Self {
            api_key,
            workspace: r.resolve(
                "workspace",
                args.workspace,
                Some(ROBOFLOW_WORKSPACE),
                defaults.workspace.clone(),
            )?,
            project: r.resolve(
                "project",
                args.project,
                Some(ROBOFLOW_PROJECT),
                defaults.project.clone(),
            )?,
            version_number: r.resolve(
                "version_number",
                args.version_number,
                Some(ROBOFLOW_VERSION_NUMBER),
                defaults.version_number,
            )?,
            download_format: r.resolve(
                "download_format",
                args.download_format,
                Some(ROBOFLOW_DOWNLOAD_FORMAT),
                defaults.download_format.clone(),
            )?,
            location: r.resolve(
                "location",
                args.location,
                Some(ROBOFLOW_DOWNLOAD_LOCATION),
                defaults.location.clone(),
            )?,
            overwrite: r.resolve(
                "overwrite",
                args.overwrite,
                Some(ROBOFLOW_DOWNLOAD_OVERWRITE),
                defaults.overwrite,
            )?,
        })
    }
}

/// Command-line values for the training pipeline.
#[derive(Debug, Clone, Default)]
pub struct TrainArgs {
    pub tracking_uri: Option<String>,
    pub experiment_name: Option<String>,
    pub data_config: Option<PathBuf>,
    pub model_name: Option<String>,
    pub epochs: Option<u32>,
    pub img_size: Option<u32>,
    pub batch_size: Option<u32>,
    pub trainer_bin: Option<PathBuf>,
}

/// Resolved configuration for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub tracking_uri: String,
    pub experiment_name: String,
    pub data_config: PathBuf,
    pub model_name: String,
    pub epochs: u32,
    pub img_size: u32,
    pub batch_size: Option<u32>,
    pub trainer_bin: PathBuf,
}

impl TrainConfig {
    pub fn resolve(
        args: TrainArgs,
        env: &dyn EnvSource,
        defaults: &TrainDefaults,
    ) -> Result<Self, ConfigError> {
        use env_vars::*;
        let r = Resolver::new(env);

        Ok(Self {
            tracking_uri: r.resolve(
                "tracking_uri",
                args.tracking_uri,
                Some(MLFLOW_TRACKING_URI),
                defaults.tracking_uri.clone(),
            )?,
            experiment_name: r.resolve(
                "experiment_name",
                args.experiment_name,
                Some(MLFLOW_EXPERIMENT_NAME),
                defaults.experiment_name.clone(),
            )?,
            data_config: r.resolve(
                "data_config",
                args.data_config,
                None,
                defaults.data_config.clone(),
            )?,
            model_name: r.resolve(
                "model_name",
                args.model_name,
                None,
                defaults.model_name.clone(),
            )?,
            epochs: r.resolve("epochs", args.epochs, None, defaults.epochs)?,
            img_size: r.resolve("img_size", args.img_size, None, defaults.img_size)?,
            batch_size: r.resolve_optional(
                "batch_size",
                args.batch_size,
                None,
                defaults.batch_size,
            )?,
            trainer_bin: r.resolve(
                "trainer_bin",
                args.trainer_bin,
                Some(YOLOTRACK_TRAINER_BIN),
                defaults.trainer_bin.clone(),
            )?,
        })
    }
}
