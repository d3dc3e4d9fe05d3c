//! The document lifecycle tracker.
//!
//! Converts raw host notifications into `documentDiscovered`,
//! `documentActivated`, `documentClosed`, `menuClicked`, and `trackerReady`.
//!
//! Lifecycle:
//!
//! ```text
//! setup ──► Caching ──snapshot ok──► Initializing ──cache drained──► Ready
//!              │
//!              └──snapshot failed / empty──► Failed (host shutdown requested)
//! ```
//!
//! While `Caching`, every raw notification is queued verbatim. Once the
//! baseline snapshot lands, the baseline is announced and the queue is replayed
//! through the steady-state handlers in arrival order, exactly as if those
//! notifications had arrived afterwards.

mod bootstrap;
mod handlers;
mod reconcile;

use doc_tracker_protocol::{FetchId, HostEventKind, HostNotification, TrackerEvent};
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::host::{FetchOutcome, Host};
use crate::state::TrackerState;

use bootstrap::Bootstrap;
pub use bootstrap::Phase;
use reconcile::Reconciliations;

pub struct Tracker {
    state: TrackerState,
    bootstrap: Bootstrap,
    reconciliations: Reconciliations,
    next_fetch_id: u64,
}

impl Tracker {
    /// Starts caching raw notifications and asks the host for the baseline
    /// snapshot, subscribing to every raw event the tracker handles.
    pub fn setup<H: Host + ?Sized>(host: &mut H) -> Self {
        let mut tracker = Self {
            state: TrackerState::default(),
            bootstrap: Bootstrap::Failed,
            reconciliations: Reconciliations::default(),
            next_fetch_id: 1,
        };
        let fetch = tracker.allocate_fetch();
        tracker.bootstrap = Bootstrap::caching(fetch);

        info!(fetch = %fetch, "Tracker caching host events until baseline snapshot arrives");
        host.fetch_snapshot(fetch, &HostEventKind::ALL);
        tracker
    }

    pub fn phase(&self) -> Phase {
        self.bootstrap.phase()
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Number of reconciliation fetches still awaiting an answer.
    pub fn pending_reconciliations(&self) -> usize {
        self.reconciliations.len()
    }

    /// Feeds one raw host notification into the tracker.
    pub fn handle_notification<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        notification: HostNotification,
    ) {
        if let Bootstrap::Caching { cache, .. } = &mut self.bootstrap {
            debug!(event = notification.kind().as_str(), "Caching host event");
            cache.push(notification);
            return;
        }
        if self.bootstrap.phase() == Phase::Failed {
            debug!(
                event = notification.kind().as_str(),
                "Dropping host event after failed initialization"
            );
            return;
        }
        self.dispatch(host, notification);
    }

    /// Delivers the answer to a snapshot fetch issued earlier through
    /// [`Host::fetch_snapshot`].
    pub fn complete_fetch<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        fetch: FetchId,
        outcome: FetchOutcome,
    ) -> Result<()> {
        if self.bootstrap.fetch() == Some(fetch) {
            self.finish_bootstrap(host, outcome);
            return Ok(());
        }
        if self.reconciliations.contains(fetch) {
            self.finish_reconciliation(host, fetch, outcome);
            return Ok(());
        }
        Err(TrackerError::UnknownFetch(fetch))
    }

    fn dispatch<H: Host + ?Sized>(&mut self, host: &mut H, notification: HostNotification) {
        match notification {
            HostNotification::CurrentDocumentChanged(document_id) => {
                self.on_current_document_changed(host, document_id)
            }
            HostNotification::ImageChanged(change) => self.on_image_changed(host, change),
            HostNotification::GeneratorMenuChanged(menu) => {
                self.on_generator_menu_changed(host, menu)
            }
        }
        debug_assert!(
            self.state.invariants_hold(),
            "active document must be open"
        );
    }

    fn allocate_fetch(&mut self) -> FetchId {
        let fetch = FetchId(self.next_fetch_id);
        self.next_fetch_id += 1;
        fetch
    }
}

fn emit<H: Host + ?Sized>(host: &mut H, event: TrackerEvent) {
    debug!(event = event.name(), payload = ?event, "Emitting tracker event");
    host.emit(event);
}
