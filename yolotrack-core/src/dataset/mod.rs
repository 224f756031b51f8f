//! Dataset hosting collaborator and dataset descriptor helpers.

pub mod descriptor;
pub mod roboflow;

use crate::config::DownloadConfig;
use crate::error::DatasetError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use descriptor::{ProvenanceLookup, read_provenance};
pub use roboflow::RoboflowClient;

/// Where a dataset was materialized on local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLocation {
    pub path: PathBuf,
    /// Display name of the hosted project.
    pub name: String,
    pub version: u32,
    pub format: String,
}

/// A dataset hosting service that can materialize one project version
/// locally in a requested export format.
#[async_trait]
pub trait DatasetHost: Send + Sync {
    async fn download(&self, config: &DownloadConfig) -> Result<DatasetLocation, DatasetError>;
}
