//! The poll loop: fetch, reconcile, notify, persist, sleep.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::notify::{format_messages, Notifier};
use crate::reconcile::{build_snapshot, reconcile_with};
use crate::source::SnapshotSource;
use crate::store::SnapshotStore;
use crate::types::Snapshot;

/// Outcome of one poll, mostly for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub events: usize,
    pub messages_sent: usize,
    pub messages_failed: usize,
    /// False when the fetch failed or returned nothing and the snapshot was kept.
    pub snapshot_advanced: bool,
}

pub struct Monitor<S, N, P> {
    source: S,
    notifier: N,
    store: P,
    snapshot: Snapshot,
    interval: Duration,
    message_limit: usize,
}

impl<S, N, P> Monitor<S, N, P>
where
    S: SnapshotSource,
    N: Notifier,
    P: SnapshotStore,
{
    /// Creates a monitor whose starting state is whatever `store` holds.
    pub fn new(source: S, notifier: N, store: P, interval: Duration, message_limit: usize) -> Self {
        let snapshot = store.load();
        Self {
            source,
            notifier,
            store,
            snapshot,
            interval,
            message_limit,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Polls forever.  No single cycle failure stops the loop.
    pub async fn run(&mut self) {
        info!("Polling every {:?}", self.interval);
        loop {
            let report = self.run_cycle().await;
            if report.snapshot_advanced {
                info!(
                    "Cycle done: {} events, {} messages sent, {} failed, tracking {} containers",
                    report.events,
                    report.messages_sent,
                    report.messages_failed,
                    self.snapshot().len()
                );
            }
            sleep(self.interval).await;
        }
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        let observation = match self.source.observe().await {
            Ok(observation) => observation,
            Err(e) => {
                error!("Failed to fetch containers: {}", e);
                return report;
            }
        };
        if observation.is_empty() {
            warn!("No containers data fetched this cycle.");
            return report;
        }

        let changes = reconcile_with(
            &self.snapshot,
            &observation.containers,
            &observation.unavailable,
        );

        for (endpoint, events) in &changes {
            report.events += events.len();
            for event in events {
                debug!("{} on {}: {}", event.id(), endpoint, event);
            }
            for message in format_messages(endpoint, events, self.message_limit) {
                match self.notifier.send(&message).await {
                    Ok(()) => report.messages_sent += 1,
                    Err(e) => {
                        error!("Failed to notify changes on {}: {}", endpoint, e);
                        report.messages_failed += 1;
                    }
                }
            }
        }

        let next = build_snapshot(
            &observation.containers,
            &self.snapshot,
            &observation.unavailable,
        );
        if let Err(e) = self.store.save(&next) {
            error!("Failed to save snapshot: {}", e);
        }
        self.snapshot = next;
        report.snapshot_advanced = true;
        report
    }
}
