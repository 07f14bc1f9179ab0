//! Prefect REST API client implementation.
//!
//! This module provides the HTTP client for reading and upserting flows and
//! deployments on a Prefect server or Prefect Cloud workspace.

use reqwest::{header, Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{ConfigError, ControlPlaneError, FlowdeployError, Result};

use super::record::{DeploymentName, DeploymentPush, RemoteDeployment};
use super::settings::{API_URL_VAR, ApiSettings};
use super::types::{DeploymentResponse, FlowCreate, FlowResponse, IdResponse};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on a server-requested retry delay.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Prefect API client.
#[derive(Debug, Clone)]
pub struct PrefectClient {
    /// HTTP client.
    client: Client,
    /// API base URL.
    base_url: Url,
    /// API key.
    api_key: Option<String>,
}

impl PrefectClient {
    /// Creates a new Prefect API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        Self::with_timeout(settings, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn with_timeout(settings: &ApiSettings, timeout_secs: u64) -> Result<Self> {
        let base_url = Url::parse(&settings.api_url)
            .map_err(|e| invalid_url(&settings.api_url, &e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid_url(&settings.api_url, "not a base URL"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ControlPlaneError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    /// Reads a deployment by its flow and deployment name.
    ///
    /// Returns `None` if the deployment does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails for any reason other than a 404.
    pub async fn read_deployment_by_name(
        &self,
        name: &DeploymentName,
    ) -> Result<Option<RemoteDeployment>> {
        let url = self.endpoint(&["deployments", "name", &name.flow, &name.deployment]);
        let response: Option<DeploymentResponse> = self.execute(Method::GET, url, None).await?;

        debug!(
            "Deployment {name} {}",
            if response.is_some() { "found" } else { "not found" }
        );
        Ok(response.map(RemoteDeployment::from))
    }

    /// Creates the flow if needed and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn ensure_flow(&self, name: &str) -> Result<Uuid> {
        let url = self.endpoint(&["flows", ""]);
        let body = to_body(&FlowCreate {
            name: name.to_string(),
        })?;
        let flow: FlowResponse = self.execute_required(Method::POST, url, Some(body)).await?;

        debug!("Flow '{}' has id {}", flow.name, flow.id);
        Ok(flow.id)
    }

    /// Creates or updates a deployment and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn upsert_deployment(&self, flow_id: Uuid, push: &DeploymentPush) -> Result<Uuid> {
        let url = self.endpoint(&["deployments", ""]);
        let body = to_body(&push.to_create(flow_id))?;
        let created: IdResponse = self.execute_required(Method::POST, url, Some(body)).await?;

        debug!("Deployment '{}' has id {}", push.spec.name, created.id);
        Ok(created.id)
    }

    /// Builds an endpoint URL below the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Executes a request that must return a body.
    async fn execute_required<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let path = url.path().to_string();
        self.execute(method, url, body).await?.ok_or_else(|| {
            ControlPlaneError::api_error(StatusCode::NOT_FOUND.as_u16(), format!("{path} not found"))
                .into()
        })
    }

    /// Executes a request; a 404 yields `None`.
    ///
    /// Only GET requests are retried. Writes are attempted once so a failed
    /// push is never replayed.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Option<T>> {
        let attempts = if method == Method::GET { MAX_RETRIES } else { 1 };
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {attempts}");
                tokio::time::sleep(retry_delay(attempt, last_error.as_ref())).await;
            }

            match self.execute_once::<T>(method.clone(), url.clone(), body.as_ref()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.is_retryable() && attempt + 1 < attempts {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FlowdeployError::ControlPlane(ControlPlaneError::NetworkError {
                message: String::from("Max retries exceeded"),
            })
        }))
    }

    /// Executes a single request.
    async fn execute_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<T>> {
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ControlPlaneError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(ControlPlaneError::RateLimited {
                retry_after_secs: retry_after,
            }
            .into());
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = if self.api_key.is_some() {
                "Invalid API key"
            } else {
                "No API key configured"
            };
            return Err(ControlPlaneError::AuthenticationFailed {
                message: String::from(message),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlPlaneError::api_error(status.as_u16(), body).into());
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| {
                ControlPlaneError::invalid_response(format!("Failed to parse response: {e}")).into()
            })
    }
}

/// Delay before a retry: linear backoff, or the server's hint capped at
/// [`MAX_RETRY_AFTER_SECS`] when that is longer.
fn retry_delay(attempt: u32, last_error: Option<&FlowdeployError>) -> Duration {
    let backoff = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
    let hinted = last_error
        .and_then(FlowdeployError::retry_delay_secs)
        .map_or(Duration::ZERO, |secs| {
            Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS))
        });
    backoff.max(hinted)
}

fn invalid_url(url: &str, reason: &str) -> FlowdeployError {
    ConfigError::validation(format!("Invalid API URL '{url}': {reason}"), API_URL_VAR).into()
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| FlowdeployError::internal(format!("Failed to serialize request: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentSpec, Schedule, ScheduleRule, ValueMap};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PrefectClient {
        PrefectClient::new(&ApiSettings::new(
            format!("{}/api", server.uri()),
            Some(String::from("pnu_test")),
        ))
        .unwrap()
    }

    fn deployment_body() -> serde_json::Value {
        json!({
            "id": "6f6c2d6e-5d2e-4f55-9c8b-8f1d7d1f3a10",
            "flow_id": "0b7c4a8e-1a32-4f0a-9a4e-2c9d2a7e9b11",
            "name": "nightly",
            "version": "1.0.0",
            "parameters": {"dir": "/data"},
            "schedules": [{"active": true, "schedule": {"cron": "0 2 * * *", "timezone": null, "day_or": true}}],
            "tags": ["etl"],
            "entrypoint": "flows/etl/flow.py:main"
        })
    }

    #[tokio::test]
    async fn test_read_deployment_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/deployments/name/etl/nightly"))
            .and(header_eq("authorization", "Bearer pnu_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(deployment_body()))
            .mount(&server)
            .await;

        let record = client(&server)
            .read_deployment_by_name(&DeploymentName::new("etl", "nightly"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.name, "nightly");
        assert_eq!(record.tags, vec![String::from("etl")]);
        assert_eq!(record.schedules.len(), 1);
    }

    #[tokio::test]
    async fn test_read_deployment_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Deployment not found"})))
            .mount(&server)
            .await;

        let record = client(&server)
            .read_deployment_by_name(&DeploymentName::new("etl", "absent"))
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server)
            .read_deployment_by_name(&DeploymentName::new("etl", "nightly"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowdeployError::ControlPlane(ControlPlaneError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .read_deployment_by_name(&DeploymentName::new("etl", "nightly"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowdeployError::ControlPlane(ControlPlaneError::ApiRequestFailed { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_read_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/deployments/name/etl/nightly"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/deployments/name/etl/nightly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(deployment_body()))
            .expect(1)
            .mount(&server)
            .await;

        let record = client(&server)
            .read_deployment_by_name(&DeploymentName::new("etl", "nightly"))
            .await
            .unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn test_rate_limited_write_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/flows/"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).ensure_flow("etl").await.unwrap_err();
        assert!(matches!(
            err,
            FlowdeployError::ControlPlane(ControlPlaneError::RateLimited {
                retry_after_secs: 1
            })
        ));
    }

    #[test]
    fn test_retry_delay_honors_capped_hint() {
        let short = FlowdeployError::ControlPlane(ControlPlaneError::RateLimited {
            retry_after_secs: 5,
        });
        let long = FlowdeployError::ControlPlane(ControlPlaneError::RateLimited {
            retry_after_secs: 600,
        });

        assert_eq!(retry_delay(1, None), Duration::from_secs(1));
        assert_eq!(retry_delay(2, None), Duration::from_secs(2));
        assert_eq!(retry_delay(1, Some(&short)), Duration::from_secs(5));
        assert_eq!(
            retry_delay(1, Some(&long)),
            Duration::from_secs(MAX_RETRY_AFTER_SECS)
        );
    }

    #[tokio::test]
    async fn test_ensure_flow_and_upsert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/flows/"))
            .and(body_partial_json(json!({"name": "etl"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "0b7c4a8e-1a32-4f0a-9a4e-2c9d2a7e9b11",
                "name": "etl"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/deployments/"))
            .and(body_partial_json(json!({
                "name": "nightly",
                "flow_id": "0b7c4a8e-1a32-4f0a-9a4e-2c9d2a7e9b11",
                "work_pool_name": "pool",
                "entrypoint": "flows/etl/flow.py:main",
                "tags": ["etl"],
                "schedules": [{"active": true, "schedule": {"cron": "0 2 * * *"}}]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "6f6c2d6e-5d2e-4f55-9c8b-8f1d7d1f3a10"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let flow_id = client.ensure_flow("etl").await.unwrap();

        let spec = DeploymentSpec {
            name: String::from("nightly"),
            version: String::from("1.0.0"),
            work_queue_name: String::from("default"),
            job_variables: None,
            parameters: ValueMap::new(),
            description: None,
            description_file: None,
            schedules: vec![Schedule::active(ScheduleRule::cron("0 2 * * *", None))],
            tags: vec![String::from("etl")],
        };
        let push = DeploymentPush::new(spec, "flows/etl/flow.py:main", "pool");
        let id = client.upsert_deployment(flow_id, &push).await.unwrap();
        assert_eq!(id.to_string(), "6f6c2d6e-5d2e-4f55-9c8b-8f1d7d1f3a10");
    }

    #[test]
    fn test_endpoint_encodes_names() {
        let client =
            PrefectClient::new(&ApiSettings::new("http://127.0.0.1:4200/api/", None)).unwrap();
        let url = client.endpoint(&["deployments", "name", "my flow", "nightly"]);
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:4200/api/deployments/name/my%20flow/nightly"
        );
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        assert!(matches!(
            PrefectClient::new(&ApiSettings::new("not a url", None)),
            Err(FlowdeployError::Config(_))
        ));
    }
}
