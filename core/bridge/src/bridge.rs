//! The stdio loop: host lines in, tracker requests and events out.

use doc_tracker::{FetchOutcome, Tracker};
use doc_tracker_protocol::{
    parse_host_message, parse_notification, parse_snapshot, FetchId, HostEventKind, HostMessage,
    MAX_LINE_BYTES,
};
use std::io::{BufRead, Read, Write};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::host::StdioHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The host closed its side of the bridge.
    EndOfInput,
    /// The tracker asked for the process to stop.
    Shutdown,
}

pub struct Bridge<W: Write> {
    tracker: Tracker,
    host: StdioHost<W>,
    event_prefix: String,
}

impl<W: Write> Bridge<W> {
    /// Sets up the tracker, which immediately requests the baseline snapshot.
    pub fn start(writer: W, event_prefix: impl Into<String>) -> Self {
        let mut host = StdioHost::new(writer);
        let tracker = Tracker::setup(&mut host);
        Self {
            tracker,
            host,
            event_prefix: event_prefix.into(),
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn handle_line(&mut self, line: &[u8]) {
        let message = match parse_host_message(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(code = %err.code, message = %err.message, "Ignoring malformed host line");
                return;
            }
        };

        match message {
            HostMessage::Event { name, payload } => {
                let Some(kind) = HostEventKind::from_prefixed(&name, &self.event_prefix) else {
                    debug!(name = %name, "Ignoring unsubscribed host event");
                    return;
                };
                match parse_notification(kind, payload) {
                    Ok(notification) => {
                        self.tracker.handle_notification(&mut self.host, notification)
                    }
                    Err(err) => {
                        warn!(
                            event = kind.as_str(),
                            code = %err.code,
                            message = %err.message,
                            "Ignoring invalid host event"
                        );
                    }
                }
            }
            HostMessage::Snapshot { fetch_id, result } => {
                let outcome = parse_snapshot(result).map_err(|err| err.to_string());
                self.complete_fetch(fetch_id, outcome);
            }
            HostMessage::SnapshotError { fetch_id, message } => {
                self.complete_fetch(fetch_id, Err(message));
            }
            HostMessage::MenuState { name, state } => {
                debug!(menu = %name, "Menu state updated");
                self.host.set_menu_state(name, state);
            }
        }
    }

    fn complete_fetch(&mut self, fetch: FetchId, outcome: FetchOutcome) {
        if let Err(err) = self.tracker.complete_fetch(&mut self.host, fetch, outcome) {
            warn!(error = %err, "Ignoring snapshot answer");
        }
    }
}

pub fn run<R: BufRead, W: Write>(
    mut reader: R,
    writer: W,
    config: &BridgeConfig,
) -> Result<RunOutcome, BridgeError> {
    let mut bridge = Bridge::start(writer, config.event_prefix.clone());
    let mut line = Vec::new();

    loop {
        if let Some(err) = bridge.host.take_write_error() {
            return Err(err);
        }
        if bridge.host.shutdown_requested() {
            return Ok(RunOutcome::Shutdown);
        }

        line.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)
            .map_err(|source| BridgeError::Io {
                context: "reading from host".to_string(),
                source,
            })?;
        if read == 0 {
            info!(
                state = %serde_json::to_string(bridge.tracker().state()).unwrap_or_default(),
                ready = bridge.tracker().is_ready(),
                "Host closed the bridge"
            );
            return Ok(RunOutcome::EndOfInput);
        }

        if line.last() != Some(&b'\n') && line.len() > MAX_LINE_BYTES {
            warn!(limit = MAX_LINE_BYTES, "Discarding oversized host line");
            discard_rest_of_line(&mut reader)?;
            continue;
        }

        let trimmed = trim_line_ending(&line);
        if trimmed.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        bridge.handle_line(trimmed);
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn discard_rest_of_line<R: BufRead>(reader: &mut R) -> Result<(), BridgeError> {
    loop {
        let buffer = reader.fill_buf().map_err(|source| BridgeError::Io {
            context: "reading from host".to_string(),
            source,
        })?;
        if buffer.is_empty() {
            return Ok(());
        }
        match buffer.iter().position(|b| *b == b'\n') {
            Some(index) => {
                reader.consume(index + 1);
                return Ok(());
            }
            None => {
                let len = buffer.len();
                reader.consume(len);
            }
        }
    }
}
