//! Steady-state handlers for the three raw host events.
//!
//! Events raised by one handler invocation always go out in the same order:
//! discovery, then activation, then reconciliation is started.

use doc_tracker_protocol::{DocumentId, ImageChange, MenuChange, MenuEvent, TrackerEvent};
use tracing::debug;

use super::{emit, Tracker};
use crate::host::Host;

impl Tracker {
    /// The host says `document_id` has focus. It also says this for documents
    /// it never announced, so an unknown id means "discovered" as well.
    pub(super) fn on_current_document_changed<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        document_id: DocumentId,
    ) {
        let was_known = self.state.is_open(document_id);
        let was_active = self.state.is_active(document_id);

        if !was_known {
            self.state.insert_open(document_id);
        }
        let previous = if was_active {
            None
        } else {
            Some(self.state.set_active(Some(document_id)))
        };

        if !was_known {
            emit(host, TrackerEvent::DocumentDiscovered { document_id });
        }
        if let Some(previous_document_id) = previous {
            emit(
                host,
                TrackerEvent::DocumentActivated {
                    document_id: Some(document_id),
                    previous_document_id,
                },
            );
        }

        // The host announces only one of several documents opened together.
        if !was_known {
            self.begin_reconciliation(host, document_id);
        }
    }

    pub(super) fn on_image_changed<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        change: ImageChange,
    ) {
        if change.closed {
            self.on_document_closed(host, change.id);
        } else {
            debug!(document_id = %change.id, "Ignoring non-close image change");
        }
    }

    fn on_document_closed<H: Host + ?Sized>(&mut self, host: &mut H, document_id: DocumentId) {
        self.reconciliations.record_close(document_id);

        if self.state.is_active(document_id) {
            self.state.set_active(None);
            emit(
                host,
                TrackerEvent::DocumentActivated {
                    document_id: None,
                    previous_document_id: Some(document_id),
                },
            );
        }

        if self.state.remove_open(document_id) {
            emit(host, TrackerEvent::DocumentClosed { document_id });
        } else {
            debug!(document_id = %document_id, "Ignoring close of unknown document");
        }
    }

    pub(super) fn on_generator_menu_changed<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        menu: Option<MenuChange>,
    ) {
        let Some(menu) = menu else {
            return;
        };
        let previous_state = match menu.menu_name() {
            Some(name) => host.menu_state(name),
            None => {
                debug!("Ignoring menu change without a menu name");
                return;
            }
        };

        let document_id = self.state.active_document_id();
        if let Some(menu) = MenuEvent::enrich(menu, document_id, previous_state) {
            emit(host, TrackerEvent::MenuClicked { menu });
        }
    }
}
