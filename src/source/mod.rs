use crate::error::FetchError;
use crate::types::{ContainerObservation, Observation};
use async_trait::async_trait;
use bollard::models::ContainerSummary;
use log::warn;

pub mod docker;
pub mod portainer;
pub mod retry;

pub use docker::DockerSource;
pub use portainer::PortainerSource;
pub use retry::RetryPolicy;

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the containers currently known on every endpoint.
    /// Endpoints that could not be read are reported in `unavailable`.
    async fn observe(&self) -> Result<Observation, FetchError>;
}

#[async_trait]
impl<S: SnapshotSource + ?Sized> SnapshotSource for Box<S> {
    async fn observe(&self) -> Result<Observation, FetchError> {
        (**self).observe().await
    }
}

/// Normalizes Docker API container summaries for one endpoint.  Entries
/// without an id are dropped.
pub(crate) fn summaries_to_observations(
    endpoint: &str,
    containers: &[ContainerSummary],
) -> Vec<ContainerObservation> {
    containers
        .iter()
        .filter_map(|c| {
            let name = c.names.as_ref().and_then(|n| n.first()).map(String::as_str);
            let obs = ContainerObservation::from_raw(
                endpoint,
                c.id.as_deref(),
                name,
                c.state.as_deref(),
            );
            if obs.is_none() {
                warn!("Skipping container without an id on {}", endpoint);
            }
            obs
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: Option<&str>, name: Option<&str>, state: Option<&str>) -> ContainerSummary {
        ContainerSummary {
            id: id.map(str::to_string),
            names: name.map(|n| vec![n.to_string()]),
            state: state.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_summaries_are_normalized() {
        let containers = vec![
            summary(Some("aaaaaaaaaaaaaaaaaaaa"), Some("/proxy"), Some("running")),
            summary(Some("bbbbbbbbbbbbbbbbbbbb"), None, Some("exited")),
            summary(None, Some("/orphan"), Some("running")),
        ];

        let observations = summaries_to_observations("local", &containers);

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].name, "proxy");
        assert_eq!(observations[0].id, "aaaaaaaaaaaa");
        assert_eq!(observations[1].name, "bbbbbbbbbbbb");
        assert_eq!(observations[1].endpoint, "local");
    }
}
