//! # doc-tracker
//!
//! Turns an unordered, partially redundant stream of host notifications
//! (document focus changes, generic image changes, menu interactions) into a
//! consistent set of lifecycle events with exactly-once semantics.
//!
//! ## Design Principles
//!
//! - **Sans-IO**: the tracker never talks to the host directly. Requests go out
//!   through [`Host`], answers come back through [`Tracker::complete_fetch`].
//! - **Single-threaded**: all mutation happens through `&mut Tracker`.
//!   Ordering is the hard part, not locking.
//! - **No globals**: every tracker owns its state; several can coexist.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use doc_tracker::Tracker;
//!
//! let mut tracker = Tracker::setup(&mut host);
//! // ... host answers the bootstrap fetch later:
//! tracker.complete_fetch(&mut host, fetch_id, Ok(Some(snapshot)))?;
//! tracker.handle_notification(&mut host, notification);
//! ```

pub mod error;
pub mod host;
pub mod state;
mod tracker;

pub use doc_tracker_protocol as protocol;
pub use error::{Result, TrackerError};
pub use host::{FetchOutcome, Host};
pub use state::TrackerState;
pub use tracker::{Phase, Tracker};
