use super::{summaries_to_observations, SnapshotSource};
use crate::error::FetchError;
use crate::types::{ContainerObservation, Observation};
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::Docker;
use log::{error, info};

/// Watches the local Docker daemon and reports its containers as a single
/// endpoint.
pub struct DockerSource {
    docker: Docker,
    endpoint: String,
}

impl DockerSource {
    /// Uses the local daemon socket, or `DOCKER_HOST` when set.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, FetchError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::with_client(docker, endpoint))
    }

    pub fn with_client(docker: Docker, endpoint: impl Into<String>) -> Self {
        Self {
            docker,
            endpoint: endpoint.into(),
        }
    }

    async fn list(&self) -> Result<Vec<ContainerObservation>, FetchError> {
        let opts = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await?;
        Ok(summaries_to_observations(&self.endpoint, &containers))
    }
}

#[async_trait]
impl SnapshotSource for DockerSource {
    async fn observe(&self) -> Result<Observation, FetchError> {
        let mut observation = Observation::default();
        match self.list().await {
            Ok(containers) => {
                info!(
                    "Docker daemon reports {} containers on {}",
                    containers.len(),
                    self.endpoint
                );
                observation
                    .containers
                    .insert(self.endpoint.clone(), containers);
            }
            Err(e) => {
                error!("Failed to list containers on {}: {}", self.endpoint, e);
                observation.unavailable.insert(self.endpoint.clone());
            }
        }
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::API_DEFAULT_VERSION;

    #[tokio::test]
    async fn test_unreachable_daemon_marks_endpoint_unavailable() {
        let docker =
            Docker::connect_with_socket("/nonexistent/docker.sock", 1, API_DEFAULT_VERSION)
                .unwrap();
        let source = DockerSource::with_client(docker, "local");

        let first = source.observe().await.unwrap();
        let second = source.observe().await.unwrap();

        assert!(first.is_empty());
        assert!(first.unavailable.contains("local"));
        assert_eq!(first, second);
    }
}
