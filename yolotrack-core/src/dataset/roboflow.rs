//! Roboflow dataset host client.
//!
//! Talks to the public REST API: authenticate the key, resolve the project,
//! ask for the export link of one version in one format, then download and
//! unpack the export archive.

use super::descriptor::rewrite_split_paths;
use super::{DatasetHost, DatasetLocation};
use crate::config::DownloadConfig;
use crate::error::DatasetError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default Roboflow API endpoint.
pub const ROBOFLOW_API_URL: &str = "https://api.roboflow.com";

/// Wait between checks on an export that is still being generated.
const EXPORT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Roboflow REST client.
pub struct RoboflowClient {
    client: reqwest::Client,
    api_url: String,
    export_poll_interval: Duration,
}

impl RoboflowClient {
    pub fn new() -> Self {
        Self::with_api_url(ROBOFLOW_API_URL)
    }

    /// Point the client at a different API endpoint.
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            export_poll_interval: EXPORT_POLL_INTERVAL,
        }
    }

    pub fn with_export_poll_interval(mut self, interval: Duration) -> Self {
        self.export_poll_interval = interval;
        self
    }

    async fn get_json(&self, path: &str, api_key: &str) -> Result<Value, DatasetError> {
        let (_, body) = self.get_json_with_status(path, api_key).await?;
        Ok(body)
    }

    /// GET `path` and parse a 2xx JSON body. Non-2xx statuses become errors.
    async fn get_json_with_status(
        &self,
        path: &str,
        api_key: &str,
    ) -> Result<(StatusCode, Value), DatasetError> {
        let url = format!("{}/{}", self.api_url, path.trim_start_matches('/'));
        debug!(url = url.as_str(), "Sending dataset host request");

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key)])
            .send()
            .await
            .map_err(|e| DatasetError::Request {
                message: format!("Request to {url} failed: {}", e.without_url()),
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| DatasetError::Request {
            message: format!("Failed to read response body: {}", e.without_url()),
        })?;

        if !status.is_success() {
            return Err(map_http_error(status.as_u16(), path, &body_text));
        }

        let body = serde_json::from_str(&body_text).map_err(|e| DatasetError::ResponseParse {
            message: format!("Invalid JSON from {path}: {e}"),
        })?;
        Ok((status, body))
    }

    /// Confirm the API key is accepted.
    async fn authenticate(&self, api_key: &str) -> Result<(), DatasetError> {
        let body = self.get_json("/", api_key).await?;
        if let Some(workspace) = body.get("workspace").and_then(Value::as_str) {
            debug!(workspace, "Authenticated with dataset host");
        }
        Ok(())
    }

    async fn project_name(
        &self,
        workspace: &str,
        project: &str,
        api_key: &str,
    ) -> Result<String, DatasetError> {
        let body = self
            .get_json(&format!("{workspace}/{project}"), api_key)
            .await?;
        parse_project_name(&body)
    }

    async fn export_link(&self, config: &DownloadConfig) -> Result<String, DatasetError> {
        let path = format!(
            "{}/{}/{}/{}",
            config.workspace, config.project, config.version_number, config.download_format
        );
        loop {
            let (status, body) = self.get_json_with_status(&path, &config.api_key).await?;
            match export_state(status, &body, &config.download_format)? {
                ExportState::Ready(link) => return Ok(link),
                ExportState::Pending(progress) => {
                    info!(
                        format = config.download_format.as_str(),
                        percent = progress.map(|p| (p * 100.0).round()),
                        "Export is being generated, waiting"
                    );
                    tokio::time::sleep(self.export_poll_interval).await;
                }
            }
        }
    }

    async fn fetch_archive(&self, link: &str) -> Result<Vec<u8>, DatasetError> {
        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|e| DatasetError::Request {
                message: format!("Export download failed: {}", e.without_url()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DatasetError::Request {
                message: format!("HTTP {status} downloading export archive"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| DatasetError::Request {
            message: format!("Export download interrupted: {}", e.without_url()),
        })?;
        Ok(bytes.to_vec())
    }
}

impl Default for RoboflowClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetHost for RoboflowClient {
    async fn download(&self, config: &DownloadConfig) -> Result<DatasetLocation, DatasetError> {
        self.authenticate(&config.api_key).await?;

        let name = self
            .project_name(&config.workspace, &config.project, &config.api_key)
            .await?;
        let folder = dataset_folder(&config.location, &name, config.version_number);
        let location = DatasetLocation {
            path: folder.clone(),
            name,
            version: config.version_number,
            format: config.download_format.clone(),
        };
        if folder.exists() && !config.overwrite {
            info!(
                folder = %folder.display(),
                "Dataset folder already exists, skipping download"
            );
            return Ok(location);
        }

        let link = self.export_link(config).await?;
        info!(
            project = location.name.as_str(),
            version = config.version_number,
            format = config.download_format.as_str(),
            folder = %folder.display(),
            "Downloading dataset export"
        );

        let archive = self.fetch_archive(&link).await?;
        extract_archive(&archive, &folder)?;

        let descriptor = folder.join("data.yaml");
        if config.download_format.starts_with("yolov") && descriptor.exists() {
            let absolute = std::path::absolute(&folder)?;
            rewrite_split_paths(&descriptor, &absolute)?;
        }

        Ok(location)
    }
}

fn map_http_error(status: u16, path: &str, body: &str) -> DatasetError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| error_message(&v))
        .unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        401 | 403 => DatasetError::AuthFailed { message },
        404 => DatasetError::NotFound {
            resource: format!("{path} ({message})"),
        },
        _ => DatasetError::Request {
            message: format!("HTTP {status} from {path}: {message}"),
        },
    }
}

/// Roboflow reports errors either as `{"error": "..."}` or
/// `{"error": {"message": "..."}}`.
fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(Value::as_str))
        .map(str::to_string)
}

/// Progress of an export request.
#[derive(Debug, Clone, PartialEq)]
enum ExportState {
    Ready(String),
    /// Still being generated, with the reported fraction done if any.
    Pending(Option<f64>),
}

/// Classify an export response. A 202 without a link is pending; an error
/// body, or a 200 without a link, means the format is not available.
fn export_state(
    status: StatusCode,
    body: &Value,
    format: &str,
) -> Result<ExportState, DatasetError> {
    if status == StatusCode::ACCEPTED && error_message(body).is_none() {
        if let Ok(link) = parse_export_link(body, format) {
            return Ok(ExportState::Ready(link));
        }
        return Ok(ExportState::Pending(
            body.get("progress").and_then(Value::as_f64),
        ));
    }
    parse_export_link(body, format).map(ExportState::Ready)
}

/// Extract the display name from a `/{workspace}/{project}` response.
pub fn parse_project_name(body: &Value) -> Result<String, DatasetError> {
    body.get("project")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DatasetError::ResponseParse {
            message: "Missing 'project.name' in project response".to_string(),
        })
}

/// Extract the archive link from a `/{workspace}/{project}/{version}/{format}`
/// response.
pub fn parse_export_link(body: &Value, format: &str) -> Result<String, DatasetError> {
    body.get("export")
        .and_then(|e| e.get("link"))
        .and_then(Value::as_str)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DatasetError::UnsupportedFormat {
            format: format.to_string(),
            message: error_message(body)
                .unwrap_or_else(|| "response has no export link".to_string()),
        })
}

/// Folder a dataset version is unpacked into: `{location}/{Name-With-Dashes}-{version}`.
pub fn dataset_folder(location: &Path, project_name: &str, version: u32) -> PathBuf {
    location.join(format!("{}-{}", project_name.replace(' ', "-"), version))
}

fn extract_archive(bytes: &[u8], target: &Path) -> Result<(), DatasetError> {
    std::fs::create_dir_all(target)?;
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| DatasetError::Archive {
            message: e.to_string(),
        })?;
    debug!(entries = archive.len(), target = %target.display(), "Extracting export archive");
    archive.extract(target).map_err(|e| DatasetError::Archive {
        message: e.to_string(),
    })
}
