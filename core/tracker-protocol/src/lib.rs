//! Wire types shared by the document tracker and its host bridge.
//!
//! The host pushes raw notifications (`currentDocumentChanged`, `imageChanged`,
//! `generatorMenuChanged`) under a namespace prefix and answers snapshot
//! requests. The tracker turns those into the small `TrackerEvent` vocabulary.
//! Keeping both sides in one crate prevents schema drift between the tracker
//! and whatever drives it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Namespace prefix the host puts in front of its push event names.
pub const DEFAULT_EVENT_PREFIX: &str = "PS_EVENT_";
pub const MAX_LINE_BYTES: usize = 1024 * 1024; // 1MB

/// Opaque host identifier of an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocumentId {
    fn from(value: u64) -> Self {
        DocumentId(value)
    }
}

/// Correlates a snapshot request with its (later) completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchId(pub u64);

impl fmt::Display for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw host push events the tracker subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostEventKind {
    CurrentDocumentChanged,
    GeneratorMenuChanged,
    ImageChanged,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 3] = [
        HostEventKind::CurrentDocumentChanged,
        HostEventKind::GeneratorMenuChanged,
        HostEventKind::ImageChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostEventKind::CurrentDocumentChanged => "currentDocumentChanged",
            HostEventKind::GeneratorMenuChanged => "generatorMenuChanged",
            HostEventKind::ImageChanged => "imageChanged",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "currentDocumentChanged" => Some(HostEventKind::CurrentDocumentChanged),
            "generatorMenuChanged" => Some(HostEventKind::GeneratorMenuChanged),
            "imageChanged" => Some(HostEventKind::ImageChanged),
            _ => None,
        }
    }

    /// Resolves a namespaced host event name (e.g. `PS_EVENT_imageChanged`).
    /// Returns `None` for events outside the prefix or not subscribed to.
    pub fn from_prefixed(name: &str, prefix: &str) -> Option<Self> {
        name.strip_prefix(prefix).and_then(Self::from_str)
    }
}

/// Payload of a raw `imageChanged` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageChange {
    pub id: DocumentId,
    #[serde(default)]
    pub closed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The menu object nested in a raw `generatorMenuChanged` notification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MenuChange {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MenuChange {
    /// The menu name, treating an empty string as absent.
    pub fn menu_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Deserialize)]
struct MenuChangedPayload {
    #[serde(rename = "generatorMenuChanged", default)]
    menu: Option<MenuChange>,
}

/// A decoded raw host notification.
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    CurrentDocumentChanged(DocumentId),
    /// `None` when the payload carried no menu object at all.
    GeneratorMenuChanged(Option<MenuChange>),
    ImageChanged(ImageChange),
}

impl HostNotification {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostNotification::CurrentDocumentChanged(_) => HostEventKind::CurrentDocumentChanged,
            HostNotification::GeneratorMenuChanged(_) => HostEventKind::GeneratorMenuChanged,
            HostNotification::ImageChanged(_) => HostEventKind::ImageChanged,
        }
    }
}

/// Point-in-time answer of the host's snapshot query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub document_ids: Vec<DocumentId>,
    #[serde(default)]
    pub active_document_id: Option<DocumentId>,
}

/// Outbound menu click, enriched with tracker state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEvent {
    pub name: String,
    pub document_id: Option<DocumentId>,
    pub previous_state: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MenuEvent {
    /// Builds the outbound event from the host menu object. Returns `None`
    /// when the menu has no name.
    pub fn enrich(
        menu: MenuChange,
        document_id: Option<DocumentId>,
        previous_state: Option<Value>,
    ) -> Option<Self> {
        let name = menu.menu_name()?.to_string();
        let mut extra = menu.extra;
        extra.remove("documentId");
        extra.remove("previousState");
        Some(MenuEvent {
            name,
            document_id,
            previous_state,
            extra,
        })
    }
}

/// The normalized lifecycle vocabulary produced by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum TrackerEvent {
    #[serde(rename_all = "camelCase")]
    DocumentDiscovered { document_id: DocumentId },
    #[serde(rename_all = "camelCase")]
    DocumentActivated {
        document_id: Option<DocumentId>,
        previous_document_id: Option<DocumentId>,
    },
    #[serde(rename_all = "camelCase")]
    DocumentClosed { document_id: DocumentId },
    MenuClicked { menu: MenuEvent },
    TrackerReady,
}

impl TrackerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TrackerEvent::DocumentDiscovered { .. } => "documentDiscovered",
            TrackerEvent::DocumentActivated { .. } => "documentActivated",
            TrackerEvent::DocumentClosed { .. } => "documentClosed",
            TrackerEvent::MenuClicked { .. } => "menuClicked",
            TrackerEvent::TrackerReady => "trackerReady",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Bridge line protocol
// ─────────────────────────────────────────────────────────────────────

/// One line sent by the host side of the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    Event {
        name: String,
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename_all = "camelCase")]
    Snapshot {
        fetch_id: FetchId,
        #[serde(default)]
        result: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    SnapshotError { fetch_id: FetchId, message: String },
    MenuState {
        name: String,
        #[serde(default)]
        state: Option<Value>,
    },
}

/// One line written by the tracker side of the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    #[serde(rename_all = "camelCase")]
    FetchSnapshot {
        fetch_id: FetchId,
        subscribe: Vec<HostEventKind>,
    },
    #[serde(rename_all = "camelCase")]
    Event {
        emitted_at: String,
        event: TrackerEvent,
    },
    Shutdown { reason: String },
}

impl BridgeMessage {
    pub fn event(event: TrackerEvent) -> Self {
        BridgeMessage::Event {
            emitted_at: Utc::now().to_rfc3339(),
            event,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub fn parse_host_message(line: &[u8]) -> Result<HostMessage, ErrorInfo> {
    if line.len() > MAX_LINE_BYTES {
        return Err(ErrorInfo::new(
            "line_too_large",
            "line exceeded maximum size",
        ));
    }
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_line", "line was empty"));
    }
    serde_json::from_slice(line).map_err(|err| {
        ErrorInfo::new("invalid_json", format!("line was not valid JSON: {}", err))
    })
}

/// Decodes the payload of a raw notification of the given kind.
///
/// Only the presence of a document id is checked. A menu payload without a
/// usable menu object is not an error; the tracker ignores it later.
pub fn parse_notification(
    kind: HostEventKind,
    payload: Value,
) -> Result<HostNotification, ErrorInfo> {
    match kind {
        HostEventKind::CurrentDocumentChanged => {
            if payload.is_null() {
                return Err(ErrorInfo::new(
                    "missing_field",
                    "document id is required",
                ));
            }
            let id = serde_json::from_value::<DocumentId>(payload).map_err(|err| {
                ErrorInfo::new("invalid_document_id", format!("bad document id: {}", err))
            })?;
            Ok(HostNotification::CurrentDocumentChanged(id))
        }
        HostEventKind::ImageChanged => {
            let change = serde_json::from_value::<ImageChange>(payload).map_err(|err| {
                ErrorInfo::new(
                    "invalid_params",
                    format!("imageChanged payload is invalid: {}", err),
                )
            })?;
            Ok(HostNotification::ImageChanged(change))
        }
        HostEventKind::GeneratorMenuChanged => {
            let menu = serde_json::from_value::<MenuChangedPayload>(payload)
                .ok()
                .and_then(|payload| payload.menu);
            Ok(HostNotification::GeneratorMenuChanged(menu))
        }
    }
}

/// Decodes a snapshot fetch result. `null` means the fetch returned nothing.
pub fn parse_snapshot(result: Option<Value>) -> Result<Option<Snapshot>, ErrorInfo> {
    match result {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value::<Snapshot>(value)
            .map(Some)
            .map_err(|err| {
                ErrorInfo::new(
                    "invalid_snapshot",
                    format!("snapshot result is invalid: {}", err),
                )
            }),
    }
}
