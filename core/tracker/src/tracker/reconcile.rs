//! "Find other opened documents".
//!
//! When an unknown document gets focus, the host may have opened siblings it
//! never announced. A fresh snapshot is fetched and every id it lists that is
//! neither known nor closed while the fetch was in flight gets discovered.
//! Runs may overlap; each keeps its own closed-during-window set and the
//! shared open set is only ever extended through a check-then-insert.

use doc_tracker_protocol::{DocumentId, FetchId, TrackerEvent};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use super::{emit, Tracker};
use crate::host::{FetchOutcome, Host};

#[derive(Debug)]
pub(super) struct Reconciliation {
    trigger: DocumentId,
    closed_during_window: HashSet<DocumentId>,
}

/// In-flight reconciliation runs keyed by their snapshot fetch.
#[derive(Debug, Default)]
pub(super) struct Reconciliations {
    pending: BTreeMap<FetchId, Reconciliation>,
}

impl Reconciliations {
    fn begin(&mut self, fetch: FetchId, trigger: DocumentId) {
        self.pending.insert(
            fetch,
            Reconciliation {
                trigger,
                closed_during_window: HashSet::new(),
            },
        );
    }

    pub(super) fn contains(&self, fetch: FetchId) -> bool {
        self.pending.contains_key(&fetch)
    }

    pub(super) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Every open window sees every close, known document or not.
    pub(super) fn record_close(&mut self, document_id: DocumentId) {
        for run in self.pending.values_mut() {
            run.closed_during_window.insert(document_id);
        }
    }

    fn finish(&mut self, fetch: FetchId) -> Option<Reconciliation> {
        self.pending.remove(&fetch)
    }
}

impl Tracker {
    pub(super) fn begin_reconciliation<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        trigger: DocumentId,
    ) {
        let fetch = self.allocate_fetch();
        self.reconciliations.begin(fetch, trigger);
        debug!(fetch = %fetch, trigger = %trigger, "Finding other opened documents");
        host.fetch_snapshot(fetch, &[]);
    }

    pub(super) fn finish_reconciliation<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        fetch: FetchId,
        outcome: FetchOutcome,
    ) {
        let Some(run) = self.reconciliations.finish(fetch) else {
            return;
        };

        let snapshot = match outcome {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                warn!(
                    fetch = %fetch,
                    trigger = %run.trigger,
                    "Reconciliation snapshot did not return a result"
                );
                return;
            }
            Err(err) => {
                warn!(
                    fetch = %fetch,
                    trigger = %run.trigger,
                    error = %err,
                    "Reconciliation snapshot failed; document list may be stale"
                );
                return;
            }
        };

        for document_id in snapshot.document_ids {
            if run.closed_during_window.contains(&document_id) {
                debug!(
                    document_id = %document_id,
                    "Skipping document closed during reconciliation"
                );
                continue;
            }
            if self.state.insert_open(document_id) {
                emit(host, TrackerEvent::DocumentDiscovered { document_id });
            }
        }
    }
}
