//! Error types for the yolotrack core library.
//!
//! Uses `thiserror` for public API error types, one enum per collaborator
//! (configuration, dataset host, tracking server, trainer, GPU probe).

use std::path::PathBuf;

/// Top-level error type for the yolotrack pipelines.
#[derive(Debug, thiserror::Error)]
pub enum YoloTrackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    #[error("GPU inspection error: {0}")]
    Gpu(#[from] GpuError),
}

/// Errors raised while resolving run configuration.
///
/// Always raised before any collaborator is contacted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required credential '{option}': pass --{option} or set {env_var}")]
    MissingCredential {
        option: &'static str,
        env_var: &'static str,
    },

    #[error("Invalid value for '{option}' from {origin}: '{value}'")]
    InvalidValue {
        option: &'static str,
        origin: String,
        value: String,
    },

    #[error("Defaults file not found: {}", .path.display())]
    DefaultsFileNotFound { path: PathBuf },

    #[error("Failed to load defaults: {0}")]
    Defaults(#[from] Box<figment::Error>),
}

/// Errors from the dataset hosting service.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Authentication with the dataset host failed: {message}")]
    AuthFailed { message: String },

    #[error("Not found on the dataset host: {resource}")]
    NotFound { resource: String },

    #[error("No export available in format '{format}': {message}")]
    UnsupportedFormat { format: String, message: String },

    #[error("Dataset host request failed: {message}")]
    Request { message: String },

    #[error("Dataset host response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Failed to extract dataset archive: {message}")]
    Archive { message: String },

    #[error("Failed to update dataset descriptor {}: {message}", .path.display())]
    Descriptor { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the experiment tracking server.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Invalid tracking URI '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    #[error("Tracking request failed: {message}")]
    Request { message: String },

    #[error("Tracking server returned HTTP {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Tracking response parse error: {message}")]
    ResponseParse { message: String },
}

/// Errors from the delegated training process.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("Failed to launch trainer '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("Trainer exited unsuccessfully ({status})")]
    Failed { status: String },
}

/// Errors from accelerator inspection.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("Unexpected accelerator query output '{line}': {message}")]
    Parse { line: String, message: String },
}

/// Errors from reading the dataset descriptor for provenance.
///
/// Never propagated out of a pipeline; downgraded to a warning.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("{0}")]
    Read(#[from] std::io::Error),

    #[error("{0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("missing field '{field}'")]
    MissingField { field: &'static str },
}
