//! Dataset download pipeline.

use crate::config::{DownloadArgs, DownloadConfig, DownloadDefaults, EnvSource};
use crate::dataset::{DatasetHost, DatasetLocation};
use crate::error::YoloTrackError;
use tracing::info;

/// Resolve configuration, then materialize the dataset. Resolution failures
/// return before the host is contacted.
pub async fn fetch(
    args: DownloadArgs,
    env: &dyn EnvSource,
    defaults: &DownloadDefaults,
    host: &dyn DatasetHost,
) -> Result<DatasetLocation, YoloTrackError> {
    let config = DownloadConfig::resolve(args, env, defaults)?;
    run(&config, host).await
}

/// Materialize the dataset described by an already resolved config.
/// One attempt, no retry.
pub async fn run(
    config: &DownloadConfig,
    host: &dyn DatasetHost,
) -> Result<DatasetLocation, YoloTrackError> {
    info!(
        workspace = config.workspace.as_str(),
        project = config.project.as_str(),
        version = config.version_number,
        format = config.download_format.as_str(),
        "Fetching dataset"
    );
    let location = host.download(config).await?;
    info!(path = %location.path.display(), "Dataset materialized");
    Ok(location)
}
