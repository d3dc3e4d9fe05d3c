//! The host collaborator seen from the tracker.
//!
//! The tracker never performs I/O. Everything it needs from the outside world
//! goes through this trait, and asynchronous answers come back through
//! [`Tracker::complete_fetch`](crate::Tracker::complete_fetch).

use doc_tracker_protocol::{FetchId, HostEventKind, Snapshot, TrackerEvent};
use serde_json::Value;

pub trait Host {
    /// Starts an asynchronous snapshot query. The host must eventually answer
    /// with `Tracker::complete_fetch` using the same `fetch` id.
    ///
    /// `subscribe` lists the raw events the host should start pushing. It is
    /// empty for reconciliation fetches.
    fn fetch_snapshot(&mut self, fetch: FetchId, subscribe: &[HostEventKind]);

    /// Host-reported state of a menu item before the click being processed.
    fn menu_state(&self, menu_name: &str) -> Option<Value>;

    /// Delivers a lifecycle event to listeners.
    fn emit(&mut self, event: TrackerEvent);

    /// Requests termination of the hosting process.
    fn shutdown(&mut self);
}

/// Result of a snapshot fetch as reported by the host.
///
/// `Ok(None)` means the query completed without producing a snapshot.
pub type FetchOutcome = std::result::Result<Option<Snapshot>, String>;
