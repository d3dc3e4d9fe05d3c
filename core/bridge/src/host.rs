//! `Host` implementation that talks to the host's scripting side over a
//! line-delimited JSON stream.

use doc_tracker::Host;
use doc_tracker_protocol::{BridgeMessage, FetchId, HostEventKind, TrackerEvent};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use tracing::warn;

use crate::error::BridgeError;

const SHUTDOWN_REASON: &str = "tracker initialization failed";

pub struct StdioHost<W: Write> {
    writer: W,
    menu_states: HashMap<String, Value>,
    shutdown_requested: bool,
    write_error: Option<BridgeError>,
}

impl<W: Write> StdioHost<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            menu_states: HashMap::new(),
            shutdown_requested: false,
            write_error: None,
        }
    }

    /// Records the host-reported state of a menu. `None` forgets it.
    pub fn set_menu_state(&mut self, name: String, state: Option<Value>) {
        match state {
            Some(state) => {
                self.menu_states.insert(name, state);
            }
            None => {
                self.menu_states.remove(&name);
            }
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// The first failure writing to the host, if any. Later writes are skipped.
    pub fn take_write_error(&mut self) -> Option<BridgeError> {
        self.write_error.take()
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn send(&mut self, message: &BridgeMessage) {
        if self.write_error.is_some() {
            return;
        }
        if let Err(err) = write_message(&mut self.writer, message) {
            warn!(error = %err, "Failed to write to host");
            self.write_error = Some(err);
        }
    }
}

impl<W: Write> Host for StdioHost<W> {
    fn fetch_snapshot(&mut self, fetch: FetchId, subscribe: &[HostEventKind]) {
        self.send(&BridgeMessage::FetchSnapshot {
            fetch_id: fetch,
            subscribe: subscribe.to_vec(),
        });
    }

    fn menu_state(&self, menu_name: &str) -> Option<Value> {
        self.menu_states.get(menu_name).cloned()
    }

    fn emit(&mut self, event: TrackerEvent) {
        self.send(&BridgeMessage::event(event));
    }

    fn shutdown(&mut self) {
        self.shutdown_requested = true;
        self.send(&BridgeMessage::Shutdown {
            reason: SHUTDOWN_REASON.to_string(),
        });
    }
}

fn write_message<W: Write>(writer: &mut W, message: &BridgeMessage) -> Result<(), BridgeError> {
    serde_json::to_writer(&mut *writer, message).map_err(|source| BridgeError::Json {
        context: "bridge message".to_string(),
        source,
    })?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|source| BridgeError::Io {
            context: "writing to host".to_string(),
            source,
        })
}
