//! Reconciliation of two polls into change events.
//!
//! [`reconcile`] compares the previous [`Snapshot`] against freshly grouped
//! observations and classifies every difference.  Nothing here performs I/O
//! and the previous snapshot is only ever borrowed.

use std::collections::{BTreeSet, HashMap};

use crate::types::{ChangeEvent, ChangeSet, ContainerObservation, GroupedObservations, Snapshot};

/// Computes the change set between `previous` and `current`.
///
/// With an empty `previous` this is a first-run status report of every
/// container that is not running rather than a diff.
pub fn reconcile(previous: &Snapshot, current: &GroupedObservations) -> ChangeSet {
    reconcile_with(previous, current, &BTreeSet::new())
}

/// Same as [`reconcile`], but containers previously recorded on an
/// endpoint listed in `unavailable` are never reported as removed.
pub fn reconcile_with(
    previous: &Snapshot,
    current: &GroupedObservations,
    unavailable: &BTreeSet<String>,
) -> ChangeSet {
    let mut changes = ChangeSet::new();

    if previous.is_empty() {
        for (endpoint, containers) in current {
            let not_running: Vec<ChangeEvent> = containers
                .iter()
                .filter(|c| !c.is_running())
                .map(|c| ChangeEvent::NotRunning {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    endpoint: endpoint.clone(),
                    status: c.status.clone(),
                })
                .collect();
            if !not_running.is_empty() {
                changes.insert(endpoint.clone(), not_running);
            }
        }
        return changes;
    }

    let (new_flat, positions) = flatten(current);

    let mut old_name_to_ids: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for (id, record) in previous {
        old_name_to_ids
            .entry(record.name.as_str())
            .or_default()
            .insert(id.as_str());
    }

    let mut removed_ids_to_skip: BTreeSet<&str> = BTreeSet::new();

    for obs in &new_flat {
        let event = match previous.get(&obs.id) {
            None => match old_name_to_ids.get(obs.name.as_str()) {
                Some(old_ids) if !old_ids.is_empty() => {
                    removed_ids_to_skip.extend(old_ids.iter().copied());
                    ChangeEvent::Restarted {
                        id: obs.id.clone(),
                        name: obs.name.clone(),
                        endpoint: obs.endpoint.clone(),
                        status: obs.status.clone(),
                    }
                }
                _ => ChangeEvent::New {
                    id: obs.id.clone(),
                    name: obs.name.clone(),
                    endpoint: obs.endpoint.clone(),
                    status: obs.status.clone(),
                },
            },
            Some(old) if old.status != obs.status => ChangeEvent::StatusChanged {
                id: obs.id.clone(),
                name: obs.name.clone(),
                endpoint: obs.endpoint.clone(),
                old: old.status.clone(),
                new: obs.status.clone(),
            },
            Some(_) => continue,
        };
        push(&mut changes, event);
    }

    for (id, old) in previous {
        if positions.contains_key(id.as_str()) || removed_ids_to_skip.contains(id.as_str()) {
            continue;
        }
        if unavailable.contains(old.endpoint()) {
            continue;
        }
        push(
            &mut changes,
            ChangeEvent::Removed {
                id: id.clone(),
                name: old.name.clone(),
                endpoint: old.endpoint().to_string(),
            },
        );
    }

    changes
}

/// Builds the snapshot that replaces `previous` once a poll is done.
///
/// Records of unavailable endpoints are carried over unless their id has
/// been observed elsewhere, so the next poll does not see them as new.
pub fn build_snapshot(
    current: &GroupedObservations,
    previous: &Snapshot,
    unavailable: &BTreeSet<String>,
) -> Snapshot {
    let mut snapshot: Snapshot = current
        .values()
        .flatten()
        .map(|c| (c.id.clone(), c.to_record()))
        .collect();

    for (id, record) in previous {
        if unavailable.contains(record.endpoint()) && !snapshot.contains_key(id) {
            snapshot.insert(id.clone(), record.clone());
        }
    }

    snapshot
}

/// Flattens grouped observations in grouped-then-sequence order.
///
/// A duplicated id keeps the position of its first occurrence and the
/// value of its last one.
fn flatten(current: &GroupedObservations) -> (Vec<&ContainerObservation>, HashMap<&str, usize>) {
    let mut flat: Vec<&ContainerObservation> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for obs in current.values().flatten() {
        match positions.get(obs.id.as_str()) {
            Some(&pos) => flat[pos] = obs,
            None => {
                positions.insert(obs.id.as_str(), flat.len());
                flat.push(obs);
            }
        }
    }

    (flat, positions)
}

fn push(changes: &mut ChangeSet, event: ChangeEvent) {
    changes
        .entry(event.endpoint().to_string())
        .or_default()
        .push(event);
}
