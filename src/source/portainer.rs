//! Snapshot source backed by the Portainer HTTP API.
//!
//! Endpoints are listed with `GET /endpoints`, then the containers of every
//! endpoint are fetched concurrently through the Docker proxy at
//! `GET /endpoints/{id}/docker/containers/json?all=1`.  An endpoint whose
//! containers cannot be fetched is reported as unavailable rather than
//! empty.

use async_trait::async_trait;
use bollard::models::ContainerSummary;
use futures_util::future::join_all;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{summaries_to_observations, RetryPolicy, SnapshotSource};
use crate::error::FetchError;
use crate::types::{ContainerObservation, Observation};

const API_KEY_HEADER: &str = "X-API-Key";

/// Minimal HTTP surface the source needs, so tests can fake the API.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

pub struct ReqwestTransport {
    client: Client,
    api_key: String,
}

impl ReqwestTransport {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// One entry of `GET /endpoints`.  Portainer ids are numeric.
#[derive(Debug, Clone, Deserialize)]
struct EndpointInfo {
    #[serde(rename = "Id", default)]
    id: Option<i64>,
    #[serde(rename = "Name", default)]
    name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    id: String,
    name: String,
}

impl From<EndpointInfo> for Endpoint {
    fn from(info: EndpointInfo) -> Self {
        let id = info
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let name = info.name.unwrap_or_else(|| format!("endpoint-{}", id));
        Self { id, name }
    }
}

pub struct PortainerSource<T> {
    transport: T,
    api_url: String,
    policy: RetryPolicy,
}

impl PortainerSource<ReqwestTransport> {
    /// Builds a source talking to `api_url` over an existing client.
    pub fn with_client(client: Client, api_url: &str, api_key: &str, policy: RetryPolicy) -> Self {
        Self::new(ReqwestTransport::new(client, api_key), api_url, policy)
    }
}

impl<T: HttpTransport> PortainerSource<T> {
    pub fn new(transport: T, api_url: &str, policy: RetryPolicy) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    /// Fetches a JSON array under the retry policy.  A body that is not an
    /// array counts as a failed attempt.
    async fn fetch_list(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        let transport = &self.transport;
        self.policy
            .run(url, move || async move {
                let body = transport.get_json(url).await?;
                serde_json::from_value(body).map_err(|e| FetchError::Decode {
                    url: url.to_string(),
                    reason: format!("expected a JSON array: {}", e),
                })
            })
            .await
    }

    async fn fetch_endpoint(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Vec<ContainerObservation>, FetchError> {
        let url = format!(
            "{}/endpoints/{}/docker/containers/json?all=1",
            self.api_url, endpoint.id
        );
        let summaries: Vec<ContainerSummary> = self
            .fetch_list(&url)
            .await?
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!("Skipping malformed container on {}: {}", endpoint.name, e);
                    None
                }
            })
            .collect();
        Ok(summaries_to_observations(&endpoint.name, &summaries))
    }
}

#[async_trait]
impl<T: HttpTransport> SnapshotSource for PortainerSource<T> {
    async fn observe(&self) -> Result<Observation, FetchError> {
        let url = format!("{}/endpoints", self.api_url);
        let endpoints: Vec<Endpoint> = self
            .fetch_list(&url)
            .await?
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<EndpointInfo>(entry) {
                Ok(info) => Some(info.into()),
                Err(e) => {
                    warn!("Skipping malformed endpoint entry: {}", e);
                    None
                }
            })
            .collect();
        debug!("Portainer reported {} endpoints", endpoints.len());

        let fetches: Vec<_> = endpoints.iter().map(|ep| self.fetch_endpoint(ep)).collect();
        let results = join_all(fetches).await;

        let mut observation = Observation::default();
        for (endpoint, result) in endpoints.into_iter().zip(results) {
            match result {
                Ok(containers) => {
                    observation.unavailable.remove(&endpoint.name);
                    observation.containers.insert(endpoint.name, containers);
                }
                Err(e) => {
                    warn!("Endpoint {} unavailable this cycle: {}", endpoint.name, e);
                    if !observation.containers.contains_key(&endpoint.name) {
                        observation.unavailable.insert(endpoint.name);
                    }
                }
            }
        }

        info!(
            "Fetched {} containers from {} endpoints ({} unavailable)",
            observation.container_count(),
            observation.containers.len(),
            observation.unavailable.len()
        );
        Ok(observation)
    }
}
