//! Job trigger backed by an automation orchestrator's OData API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use stepwise_core::{CoreError, JobOutcome, JobTrigger};
use tracing::{debug, info};

const START_JOBS_PATH: &str = "/odata/Jobs/UiPath.Server.Configuration.OData.StartJobs";
const RELEASES_PATH: &str = "/odata/Releases";

/// How the client obtains a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorAuth {
    /// A fixed token from configuration
    Static {
        /// Bearer token
        token: String,
    },
    /// OAuth2 refresh-token grant, one exchange per trigger
    RefreshToken {
        /// Token endpoint
        auth_url: String,
        /// OAuth2 client id
        client_id: String,
        /// Long-lived refresh token
        refresh_token: String,
    },
}

/// Orchestrator connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// When true no request is made and every trigger reports `mocked`
    #[serde(default = "default_mock")]
    pub mock: bool,

    /// Base URL of the orchestrator
    #[serde(default)]
    pub orchestrator_url: String,

    /// Authentication; required unless `mock`
    #[serde(default)]
    pub auth: Option<OrchestratorAuth>,

    /// Known release keys by job name; others are looked up
    #[serde(default)]
    pub release_keys: HashMap<String, String>,

    /// Robots to run on
    #[serde(default)]
    pub robot_ids: Vec<i64>,

    /// Start strategy
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Machine to run on
    #[serde(default)]
    pub machine: Option<String>,

    /// Account to run as
    #[serde(default)]
    pub run_as_user: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_mock() -> bool {
    true
}

fn default_strategy() -> String {
    "ModernJobs".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mock: default_mock(),
            orchestrator_url: String::new(),
            auth: None,
            release_keys: HashMap::new(),
            robot_ids: Vec::new(),
            strategy: default_strategy(),
            machine: None,
            run_as_user: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Starts orchestrator jobs, or pretends to in mock mode
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    config: OrchestratorConfig,
    client: Client,
}

fn transport_error(what: &str, err: reqwest::Error) -> CoreError {
    CoreError::ExternalDependencyError(format!("{} failed: {}", what, err))
}

async fn read_body(response: reqwest::Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

impl OrchestratorClient {
    /// Create a client for `config`
    pub fn new(config: OrchestratorConfig) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CoreError::ConfigurationError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Client that never leaves the process
    pub fn mocked() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            client: Client::new(),
        }
    }

    /// Settings in use
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn base_url(&self) -> Result<&str, CoreError> {
        let url = self.config.orchestrator_url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(CoreError::ConfigurationError(
                "orchestrator_url is required when mock mode is off".to_string(),
            ));
        }
        Ok(url)
    }

    async fn access_token(&self) -> Result<String, CoreError> {
        match &self.config.auth {
            Some(OrchestratorAuth::Static { token }) => Ok(token.clone()),
            Some(OrchestratorAuth::RefreshToken {
                auth_url,
                client_id,
                refresh_token,
            }) => {
                let response = self
                    .client
                    .post(auth_url)
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("client_id", client_id.as_str()),
                        ("refresh_token", refresh_token.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| transport_error("token request", e))?;

                let (status, body) = read_body(response).await;
                if status != StatusCode::OK {
                    return Err(CoreError::ExternalDependencyError(format!(
                        "token request rejected: {} {}",
                        status, body
                    )));
                }

                let parsed: Value = serde_json::from_str(&body)?;
                parsed
                    .get("access_token")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        CoreError::ExternalDependencyError("token response has no access_token".to_string())
                    })
            }
            None => Err(CoreError::ConfigurationError(
                "orchestrator auth is required when mock mode is off".to_string(),
            )),
        }
    }

    async fn release_key(&self, base_url: &str, job_name: &str, token: &str) -> Result<String, CoreError> {
        if let Some(key) = self.config.release_keys.get(job_name) {
            return Ok(key.clone());
        }

        let filter = format!("Name eq '{}'", job_name.replace('\'', "''"));
        let response = self
            .client
            .get(format!("{}{}", base_url, RELEASES_PATH))
            .query(&[("$filter", filter)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("release lookup", e))?;

        let (status, body) = read_body(response).await;
        if status != StatusCode::OK {
            return Err(CoreError::ExternalDependencyError(format!(
                "release lookup rejected: {} {}",
                status, body
            )));
        }

        let parsed: Value = serde_json::from_str(&body)?;
        parsed
            .pointer("/value/0/Key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CoreError::ExternalDependencyError(format!("job '{}' not found", job_name)))
    }

    fn start_info(&self, release_key: &str, parameters: &Map<String, Value>) -> Result<Value, CoreError> {
        let mut start_info = json!({
            "ReleaseKey": release_key,
            "Strategy": self.config.strategy,
            "InputArguments": serde_json::to_string(parameters)?,
        });
        if !self.config.robot_ids.is_empty() {
            start_info["RobotIds"] = json!(self.config.robot_ids);
        }
        if let Some(machine) = &self.config.machine {
            start_info["MachineLogicalName"] = json!(machine);
        }
        if let Some(user) = &self.config.run_as_user {
            start_info["RunAsUser"] = json!(user);
        }
        Ok(json!({ "startInfo": start_info }))
    }
}

#[async_trait]
impl JobTrigger for OrchestratorClient {
    async fn trigger(&self, job_name: &str, parameters: &Map<String, Value>) -> Result<JobOutcome, CoreError> {
        if self.config.mock {
            info!(job = job_name, parameters = %serde_json::Value::Object(parameters.clone()), "mock orchestrator, job not started");
            return Ok(JobOutcome::mocked());
        }

        let base_url = self.base_url()?;
        let token = self.access_token().await?;
        let release_key = self.release_key(base_url, job_name, &token).await?;
        debug!(job = job_name, release_key = %release_key, "starting job");

        let response = self
            .client
            .post(format!("{}{}", base_url, START_JOBS_PATH))
            .bearer_auth(&token)
            .json(&self.start_info(&release_key, parameters)?)
            .send()
            .await
            .map_err(|e| transport_error("start jobs request", e))?;

        let (status, body) = read_body(response).await;
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(CoreError::ExternalDependencyError(format!(
                "job '{}' could not be started: {} {}",
                job_name, status, body
            )));
        }

        let detail: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let job_id = detail.pointer("/value/0/Id").and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        info!(job = job_name, job_id = ?job_id, "job started");

        let mut outcome = JobOutcome::started(job_id);
        if !detail.is_null() {
            outcome.detail = Some(detail);
        }
        Ok(outcome)
    }
}
