use doc_tracker_protocol::{DocumentId, FetchId, HostNotification, TrackerEvent};
use tracing::{debug, error, info};

use super::{emit, Tracker};
use crate::host::{FetchOutcome, Host};
use crate::state::TrackerState;

/// Externally visible lifecycle phase of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the baseline snapshot; raw notifications are queued.
    Caching,
    /// Announcing the baseline and replaying the queue.
    Initializing,
    Ready,
    /// The baseline snapshot could not be obtained. Terminal.
    Failed,
}

/// Raw notifications captured during the bootstrap window, in arrival order.
#[derive(Debug, Default)]
pub(super) struct BootstrapCache {
    events: Vec<HostNotification>,
}

impl BootstrapCache {
    pub(super) fn push(&mut self, notification: HostNotification) {
        self.events.push(notification);
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn into_events(self) -> Vec<HostNotification> {
        self.events
    }
}

/// The cache only exists while `Caching`; entering any later phase frees it.
#[derive(Debug)]
pub(super) enum Bootstrap {
    Caching {
        fetch: FetchId,
        cache: BootstrapCache,
    },
    Initializing,
    Ready,
    Failed,
}

impl Bootstrap {
    pub(super) fn caching(fetch: FetchId) -> Self {
        Bootstrap::Caching {
            fetch,
            cache: BootstrapCache::default(),
        }
    }

    pub(super) fn phase(&self) -> Phase {
        match self {
            Bootstrap::Caching { .. } => Phase::Caching,
            Bootstrap::Initializing => Phase::Initializing,
            Bootstrap::Ready => Phase::Ready,
            Bootstrap::Failed => Phase::Failed,
        }
    }

    /// The outstanding bootstrap fetch, if still waiting for one.
    pub(super) fn fetch(&self) -> Option<FetchId> {
        match self {
            Bootstrap::Caching { fetch, .. } => Some(*fetch),
            _ => None,
        }
    }
}

impl Tracker {
    pub(super) fn finish_bootstrap<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        outcome: FetchOutcome,
    ) {
        let cache = match std::mem::replace(&mut self.bootstrap, Bootstrap::Initializing) {
            Bootstrap::Caching { cache, .. } => cache,
            other => {
                self.bootstrap = other;
                return;
            }
        };

        let snapshot = match outcome {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.fail_bootstrap(host, "snapshot fetch did not return a result");
                return;
            }
            Err(err) => {
                self.fail_bootstrap(host, &err);
                return;
            }
        };

        info!(
            documents = snapshot.document_ids.len(),
            active_document_id = ?snapshot.active_document_id,
            cached_events = cache.len(),
            "Initializing tracker state from snapshot"
        );
        self.state = TrackerState::seed(&snapshot);

        let baseline: Vec<DocumentId> = self.state.open_document_ids().collect();
        for document_id in baseline {
            emit(host, TrackerEvent::DocumentDiscovered { document_id });
        }
        if let Some(active) = self.state.active_document_id() {
            emit(
                host,
                TrackerEvent::DocumentActivated {
                    document_id: Some(active),
                    previous_document_id: None,
                },
            );
        }

        for notification in cache.into_events() {
            debug!(event = notification.kind().as_str(), "Replaying cached host event");
            self.dispatch(host, notification);
        }

        self.bootstrap = Bootstrap::Ready;
        info!(
            open_documents = self.state.open_count(),
            active_document_id = ?self.state.active_document_id(),
            "Tracker ready"
        );
        emit(host, TrackerEvent::TrackerReady);
    }

    fn fail_bootstrap<H: Host + ?Sized>(&mut self, host: &mut H, reason: &str) {
        error!(error = %reason, "Error during tracker initialization");
        self.bootstrap = Bootstrap::Failed;
        host.shutdown();
    }
}
