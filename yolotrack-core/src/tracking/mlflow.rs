//! MLflow tracking client over the REST API (`/api/2.0/mlflow`).

use super::{RunHandle, RunStatus, Tracker};
use crate::error::TrackingError;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_PREFIX: &str = "api/2.0/mlflow";

/// Error code MLflow returns for unknown experiments and runs.
const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";

/// MLflow tracking server client.
pub struct MlflowClient {
    client: reqwest::Client,
    tracking_uri: String,
}

impl MlflowClient {
    /// Create a client for an `http://` or `https://` tracking server.
    pub fn new(tracking_uri: &str) -> Result<Self, TrackingError> {
        let parsed = Url::parse(tracking_uri).map_err(|e| TrackingError::InvalidUri {
            uri: tracking_uri.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TrackingError::InvalidUri {
                uri: tracking_uri.to_string(),
                message: format!(
                    "unsupported scheme '{}', expected http or https",
                    parsed.scheme()
                ),
            });
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Ok(Self {
            client,
            tracking_uri: tracking_uri.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{API_PREFIX}/{method}", self.tracking_uri)
    }

    async fn get(&self, method: &str, query: &[(&str, &str)]) -> Result<Value, TrackingError> {
        let request = self.client.get(self.endpoint(method)).query(query);
        self.send(method, request).await
    }

    async fn post(&self, method: &str, body: Value) -> Result<Value, TrackingError> {
        let request = self.client.post(self.endpoint(method)).json(&body);
        self.send(method, request).await
    }

    async fn send(&self, method: &str, request: RequestBuilder) -> Result<Value, TrackingError> {
        debug!(method, "Sending MLflow request");

        let response = request.send().await.map_err(|e| TrackingError::Request {
            message: format!("MLflow {method} failed: {e}"),
        })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|e| TrackingError::Request {
            message: format!("Failed to read MLflow {method} response: {e}"),
        })?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body_text));
        }

        if body_text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&body_text).map_err(|e| TrackingError::ResponseParse {
            message: format!("Invalid JSON in MLflow {method} response: {e}"),
        })
    }
}

#[async_trait]
impl Tracker for MlflowClient {
    fn tracking_uri(&self) -> &str {
        &self.tracking_uri
    }

    async fn resolve_experiment(&self, name: &str) -> Result<String, TrackingError> {
        match self
            .get("experiments/get-by-name", &[("experiment_name", name)])
            .await
        {
            Ok(body) => parse_experiment_id(&body),
            Err(TrackingError::Api { status, code, .. })
                if status == 404 || code == RESOURCE_DOES_NOT_EXIST =>
            {
                debug!(experiment = name, "Experiment not found, creating it");
                let body = self
                    .post("experiments/create", json!({ "name": name }))
                    .await?;
                body.get("experiment_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| TrackingError::ResponseParse {
                        message: "Missing 'experiment_id' in create response".to_string(),
                    })
            }
            Err(e) => Err(e),
        }
    }

    async fn create_run(
        &self,
        experiment_id: &str,
        run_name: &str,
    ) -> Result<RunHandle, TrackingError> {
        let body = self
            .post(
                "runs/create",
                json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": chrono::Utc::now().timestamp_millis(),
                    "tags": [{ "key": "mlflow.runName", "value": run_name }],
                }),
            )
            .await?;
        let run_id = parse_run_id(&body)?;
        Ok(RunHandle {
            run_id,
            experiment_id: experiment_id.to_string(),
            run_name: run_name.to_string(),
        })
    }

    async fn log_param(
        &self,
        run: &RunHandle,
        key: &str,
        value: &str,
    ) -> Result<(), TrackingError> {
        self.post(
            "runs/log-parameter",
            json!({ "run_id": run.run_id, "key": key, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn end_run(&self, run: &RunHandle, status: RunStatus) -> Result<(), TrackingError> {
        self.post(
            "runs/update",
            json!({
                "run_id": run.run_id,
                "status": status.as_str(),
                "end_time": chrono::Utc::now().timestamp_millis(),
            }),
        )
        .await?;
        Ok(())
    }
}

/// Map a non-2xx MLflow response. Error bodies look like
/// `{"error_code": "RESOURCE_DOES_NOT_EXIST", "message": "..."}`.
fn api_error(status: u16, body: &str) -> TrackingError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    TrackingError::Api {
        status,
        code: field("error_code").unwrap_or_else(|| "UNKNOWN".to_string()),
        message: field("message").unwrap_or_else(|| body.trim().to_string()),
    }
}

/// Extract `experiment.experiment_id` from a get-by-name response.
pub fn parse_experiment_id(body: &Value) -> Result<String, TrackingError> {
    body.get("experiment")
        .and_then(|e| e.get("experiment_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TrackingError::ResponseParse {
            message: "Missing 'experiment.experiment_id' in response".to_string(),
        })
}

/// Extract `run.info.run_id` from a runs/create response.
pub fn parse_run_id(body: &Value) -> Result<String, TrackingError> {
    body.get("run")
        .and_then(|r| r.get("info"))
        .and_then(|i| i.get("run_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| TrackingError::ResponseParse {
            message: "Missing 'run.info.run_id' in response".to_string(),
        })
}
