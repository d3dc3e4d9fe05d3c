//! The tracker's view of which documents are open and which one has focus.
//!
//! Owned by exactly one [`Tracker`](crate::Tracker). Mutation is crate-private
//! so the only way to change it is through the lifecycle handlers, which emit
//! the matching events.

use doc_tracker_protocol::{DocumentId, Snapshot};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    active_document_id: Option<DocumentId>,
    open_document_ids: BTreeSet<DocumentId>,
}

impl TrackerState {
    /// Builds the bootstrap baseline from a snapshot.
    ///
    /// An active id the snapshot forgot to list is added to the open set.
    pub(crate) fn seed(snapshot: &Snapshot) -> Self {
        let mut open_document_ids: BTreeSet<DocumentId> =
            snapshot.document_ids.iter().copied().collect();
        if let Some(active) = snapshot.active_document_id {
            open_document_ids.insert(active);
        }
        Self {
            active_document_id: snapshot.active_document_id,
            open_document_ids,
        }
    }

    pub fn active_document_id(&self) -> Option<DocumentId> {
        self.active_document_id
    }

    /// Open documents in ascending id order.
    pub fn open_document_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.open_document_ids.iter().copied()
    }

    pub fn open_count(&self) -> usize {
        self.open_document_ids.len()
    }

    pub fn is_open(&self, document_id: DocumentId) -> bool {
        self.open_document_ids.contains(&document_id)
    }

    pub fn is_active(&self, document_id: DocumentId) -> bool {
        self.active_document_id == Some(document_id)
    }

    /// Returns `true` if the id was not open yet.
    pub(crate) fn insert_open(&mut self, document_id: DocumentId) -> bool {
        self.open_document_ids.insert(document_id)
    }

    /// Returns `true` if the id was open.
    pub(crate) fn remove_open(&mut self, document_id: DocumentId) -> bool {
        self.open_document_ids.remove(&document_id)
    }

    /// Replaces the active document, returning the previous one.
    pub(crate) fn set_active(&mut self, document_id: Option<DocumentId>) -> Option<DocumentId> {
        std::mem::replace(&mut self.active_document_id, document_id)
    }

    /// The active document, if any, is one of the open documents.
    pub fn invariants_hold(&self) -> bool {
        self.active_document_id
            .map(|active| self.open_document_ids.contains(&active))
            .unwrap_or(true)
    }
}
