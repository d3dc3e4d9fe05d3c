//! Error types for tracker operations.
//!
//! Snapshot failures are not errors here: the tracker handles them itself
//! (fatal at bootstrap, degraded during reconciliation). What remains are
//! caller mistakes in driving the state machine.

use doc_tracker_protocol::FetchId;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("No outstanding snapshot fetch with id {0}")]
    UnknownFetch(FetchId),
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;
