//! Data structures shared by the sources, the reconciler and the store.
//!
//! Container identifiers are the short 12-character form reported by the
//! Docker API.  They change every time a container is recreated, so the
//! logical `name` is what ties a replacement back to its predecessor.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Length of the short container id kept in snapshots and messages.
pub const SHORT_ID_LEN: usize = 12;

/// Status recorded when the API does not report one.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Endpoint label used for persisted records that predate the `endpoint` field.
pub const UNKNOWN_ENDPOINT: &str = "unknown";

/// Status every container is expected to be in.
pub const RUNNING: &str = "running";

/// A single container as seen on one endpoint during the current poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerObservation {
    pub id: String,
    pub name: String,
    pub status: String,
    pub endpoint: String,
}

impl ContainerObservation {
    /// Builds an observation from raw API fields.
    ///
    /// The id is shortened, the leading `/` of the name is stripped and the
    /// status is lowercased.  A missing name falls back to the short id and a
    /// missing status becomes [`UNKNOWN_STATUS`].  Returns `None` when there is
    /// no usable id, since the container could not be keyed.
    pub fn from_raw(
        endpoint: &str,
        id: Option<&str>,
        name: Option<&str>,
        status: Option<&str>,
    ) -> Option<Self> {
        let id = short_id(id?.trim());
        if id.is_empty() {
            return None;
        }
        let name = name
            .map(|n| n.trim_start_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());
        Some(Self {
            id,
            name,
            status: normalize_status(status),
            endpoint: endpoint.to_string(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == RUNNING
    }

    pub fn to_record(&self) -> ContainerRecord {
        ContainerRecord {
            name: self.name.clone(),
            status: self.status.clone(),
            endpoint: Some(self.endpoint.clone()),
        }
    }
}

fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

fn normalize_status(status: Option<&str>) -> String {
    match status.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => UNKNOWN_STATUS.to_string(),
    }
}

/// Last known state of one container, as persisted between polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

fn unknown_status() -> String {
    UNKNOWN_STATUS.to_string()
}

impl ContainerRecord {
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(UNKNOWN_ENDPOINT)
    }
}

/// Flattened container state keyed by short id, in the order the containers
/// were listed.  The order survives a round trip through the store.
pub type Snapshot = IndexMap<String, ContainerRecord>;

/// Freshly fetched containers, grouped by the endpoint they were seen on, in
/// the order the source listed them.
pub type GroupedObservations = IndexMap<String, Vec<ContainerObservation>>;

/// Everything a source produced for one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub containers: GroupedObservations,
    /// Endpoints that exist but could not be read this poll.
    pub unavailable: BTreeSet<String>,
}

impl Observation {
    /// True when the source reported no endpoints at all, not even empty ones.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn container_count(&self) -> usize {
        self.containers.values().map(Vec::len).sum()
    }
}

/// A classified difference between two polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// First-run report of a container that is not running.
    NotRunning {
        id: String,
        name: String,
        endpoint: String,
        status: String,
    },
    New {
        id: String,
        name: String,
        endpoint: String,
        status: String,
    },
    /// A new id whose name matches one or more previously known containers.
    Restarted {
        id: String,
        name: String,
        endpoint: String,
        status: String,
    },
    StatusChanged {
        id: String,
        name: String,
        endpoint: String,
        old: String,
        new: String,
    },
    Removed {
        id: String,
        name: String,
        endpoint: String,
    },
}

impl ChangeEvent {
    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::NotRunning { id, .. }
            | ChangeEvent::New { id, .. }
            | ChangeEvent::Restarted { id, .. }
            | ChangeEvent::StatusChanged { id, .. }
            | ChangeEvent::Removed { id, .. } => id,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ChangeEvent::NotRunning { endpoint, .. }
            | ChangeEvent::New { endpoint, .. }
            | ChangeEvent::Restarted { endpoint, .. }
            | ChangeEvent::StatusChanged { endpoint, .. }
            | ChangeEvent::Removed { endpoint, .. } => endpoint,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::NotRunning {
                id, name, status, ..
            } => write!(f, "⚠️ Not Running: {} ({}) - {}", name, id, status),
            ChangeEvent::New {
                id, name, status, ..
            } => write!(f, "🆕 New: {} ({}) - {}", name, id, status),
            ChangeEvent::Restarted {
                id, name, status, ..
            } => write!(f, "✅ Restarted: {} ({}) - {}", name, id, status),
            ChangeEvent::StatusChanged {
                id, name, old, new, ..
            } => write!(f, "🔄 Changed: {} ({}) - {} → {}", name, id, old, new),
            ChangeEvent::Removed { id, name, .. } => {
                write!(f, "❌ Removed: {} ({})", name, id)
            }
        }
    }
}

/// Events per endpoint, in order of each endpoint's first event.  Endpoints
/// without events are never present.
pub type ChangeSet = IndexMap<String, Vec<ChangeEvent>>;
