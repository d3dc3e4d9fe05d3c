use doc_tracker::protocol::{
    DocumentId, FetchId, HostEventKind, HostNotification, ImageChange, MenuChange, Snapshot,
    TrackerEvent,
};
use doc_tracker::{Host, Phase, Tracker};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

const BOOTSTRAP_FETCH: FetchId = FetchId(1);

#[derive(Default)]
struct RecordingHost {
    fetches: Vec<(FetchId, Vec<HostEventKind>)>,
    events: Vec<TrackerEvent>,
    menu_states: HashMap<String, Value>,
    shutdowns: usize,
}

impl Host for RecordingHost {
    fn fetch_snapshot(&mut self, fetch: FetchId, subscribe: &[HostEventKind]) {
        self.fetches.push((fetch, subscribe.to_vec()));
    }

    fn menu_state(&self, menu_name: &str) -> Option<Value> {
        self.menu_states.get(menu_name).cloned()
    }

    fn emit(&mut self, event: TrackerEvent) {
        self.events.push(event);
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}

impl RecordingHost {
    fn take_events(&mut self) -> Vec<TrackerEvent> {
        std::mem::take(&mut self.events)
    }

    fn last_fetch(&self) -> FetchId {
        self.fetches.last().expect("a fetch was issued").0
    }
}

fn id(value: u64) -> DocumentId {
    DocumentId(value)
}

fn snapshot(ids: &[u64], active: Option<u64>) -> Snapshot {
    Snapshot {
        document_ids: ids.iter().copied().map(DocumentId).collect(),
        active_document_id: active.map(DocumentId),
    }
}

fn focus(value: u64) -> HostNotification {
    HostNotification::CurrentDocumentChanged(id(value))
}

fn close(value: u64) -> HostNotification {
    HostNotification::ImageChanged(ImageChange {
        id: id(value),
        closed: true,
        extra: Map::new(),
    })
}

fn touch(value: u64) -> HostNotification {
    let mut extra = Map::new();
    extra.insert("layers".to_string(), json!([{"id": 1}]));
    HostNotification::ImageChanged(ImageChange {
        id: id(value),
        closed: false,
        extra,
    })
}

fn menu(name: Option<&str>) -> HostNotification {
    HostNotification::GeneratorMenuChanged(Some(MenuChange {
        name: name.map(str::to_string),
        extra: Map::new(),
    }))
}

fn discovered(value: u64) -> TrackerEvent {
    TrackerEvent::DocumentDiscovered {
        document_id: id(value),
    }
}

fn activated(current: Option<u64>, previous: Option<u64>) -> TrackerEvent {
    TrackerEvent::DocumentActivated {
        document_id: current.map(DocumentId),
        previous_document_id: previous.map(DocumentId),
    }
}

fn closed(value: u64) -> TrackerEvent {
    TrackerEvent::DocumentClosed {
        document_id: id(value),
    }
}

/// A tracker that finished bootstrap, with the bootstrap events discarded.
fn ready_tracker(host: &mut RecordingHost, baseline: Snapshot) -> Tracker {
    let mut tracker = Tracker::setup(host);
    tracker
        .complete_fetch(host, BOOTSTRAP_FETCH, Ok(Some(baseline)))
        .expect("bootstrap completes");
    assert!(tracker.is_ready());
    host.take_events();
    tracker
}

#[test]
fn bootstrap_announces_baseline_then_activation_then_ready() {
    let mut host = RecordingHost::default();
    let mut tracker = Tracker::setup(&mut host);
    assert_eq!(host.fetches, vec![(BOOTSTRAP_FETCH, HostEventKind::ALL.to_vec())]);

    tracker
        .complete_fetch(&mut host, BOOTSTRAP_FETCH, Ok(Some(snapshot(&[1, 2], Some(2)))))
        .expect("bootstrap completes");

    assert_eq!(
        host.events,
        vec![
            discovered(1),
            discovered(2),
            activated(Some(2), None),
            TrackerEvent::TrackerReady,
        ]
    );
    assert_eq!(tracker.phase(), Phase::Ready);
    assert_eq!(tracker.state().active_document_id(), Some(id(2)));
}

#[test]
fn bootstrap_without_active_document_skips_activation() {
    let mut host = RecordingHost::default();
    let mut tracker = Tracker::setup(&mut host);
    tracker
        .complete_fetch(&mut host, BOOTSTRAP_FETCH, Ok(Some(snapshot(&[], None))))
        .expect("bootstrap completes");

    assert_eq!(host.events, vec![TrackerEvent::TrackerReady]);
    assert_eq!(tracker.state().active_document_id(), None);
}

#[test]
fn bootstrap_failure_requests_shutdown_and_emits_nothing() {
    let mut host = RecordingHost::default();
    let mut tracker = Tracker::setup(&mut host);
    tracker.handle_notification(&mut host, focus(1));

    tracker
        .complete_fetch(&mut host, BOOTSTRAP_FETCH, Err("script error".to_string()))
        .expect("completion accepted");

    assert_eq!(host.shutdowns, 1);
    assert!(host.events.is_empty());
    assert_eq!(tracker.phase(), Phase::Failed);
}

#[test]
fn bootstrap_without_result_is_fatal() {
    let mut host = RecordingHost::default();
    let mut tracker = Tracker::setup(&mut host);

    tracker
        .complete_fetch(&mut host, BOOTSTRAP_FETCH, Ok(None))
        .expect("completion accepted");

    assert_eq!(host.shutdowns, 1);
    assert!(host.events.is_empty());
    assert!(!tracker.is_ready());
}

#[test]
fn cached_events_replay_after_baseline_and_before_ready() {
    let mut host = RecordingHost::default();
    let mut tracker = Tracker::setup(&mut host);
    tracker.handle_notification(&mut host, focus(3));
    tracker.handle_notification(&mut host, close(1));
    tracker.handle_notification(&mut host, close(42));
    assert!(host.events.is_empty());

    tracker
        .complete_fetch(&mut host, BOOTSTRAP_FETCH, Ok(Some(snapshot(&[1, 2], Some(2)))))
        .expect("bootstrap completes");

    assert_eq!(
        host.events,
        vec![
            discovered(1),
            discovered(2),
            activated(Some(2), None),
            discovered(3),
            activated(Some(3), Some(2)),
            closed(1),
            TrackerEvent::TrackerReady,
        ]
    );
    let open: Vec<_> = tracker.state().open_document_ids().collect();
    assert_eq!(open, vec![id(2), id(3)]);
    assert_eq!(tracker.state().active_document_id(), Some(id(3)));
    // The replayed focus change on an unknown document starts a reconciliation.
    assert_eq!(host.fetches.len(), 2);
    assert_eq!(tracker.pending_reconciliations(), 1);
}

#[test]
fn focus_on_unknown_document_discovers_activates_then_reconciles() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));

    tracker.handle_notification(&mut host, focus(3));

    assert_eq!(host.events, vec![discovered(3), activated(Some(3), Some(2))]);
    assert_eq!(host.fetches.last(), Some(&(FetchId(2), Vec::new())));
    assert!(tracker.state().is_open(id(3)));
}

#[test]
fn focus_on_known_document_only_activates() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));

    tracker.handle_notification(&mut host, focus(1));

    assert_eq!(host.events, vec![activated(Some(1), Some(2))]);
    assert_eq!(host.fetches.len(), 1);
}

#[test]
fn focus_on_active_document_is_silent() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));

    tracker.handle_notification(&mut host, focus(2));

    assert!(host.events.is_empty());
    assert_eq!(host.fetches.len(), 1);
}

#[test]
fn closing_active_document_clears_focus_before_close() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));

    tracker.handle_notification(&mut host, close(2));

    assert_eq!(host.events, vec![activated(None, Some(2)), closed(2)]);
    assert_eq!(tracker.state().active_document_id(), None);
    assert!(!tracker.state().is_open(id(2)));
}

#[test]
fn closing_background_document_keeps_focus() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));

    tracker.handle_notification(&mut host, close(1));

    assert_eq!(host.events, vec![closed(1)]);
    assert_eq!(tracker.state().active_document_id(), Some(id(2)));
}

#[test]
fn document_is_closed_at_most_once() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1], Some(1)));

    tracker.handle_notification(&mut host, close(1));
    tracker.handle_notification(&mut host, close(1));

    assert_eq!(host.events, vec![activated(None, Some(1)), closed(1)]);
}

#[test]
fn reopened_id_is_discovered_again() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1], Some(1)));

    tracker.handle_notification(&mut host, close(1));
    tracker.handle_notification(&mut host, focus(1));

    assert_eq!(
        host.events,
        vec![
            activated(None, Some(1)),
            closed(1),
            discovered(1),
            activated(Some(1), None),
        ]
    );
}

#[test]
fn non_close_image_change_is_inert() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));
    let before = tracker.state().clone();

    tracker.handle_notification(&mut host, touch(2));
    tracker.handle_notification(&mut host, touch(9));

    assert!(host.events.is_empty());
    assert_eq!(tracker.state(), &before);
}

#[test]
fn reconciliation_skips_known_and_recently_closed_documents() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));

    tracker.handle_notification(&mut host, focus(3));
    let fetch = host.last_fetch();
    // 4 was opened alongside 3 and closed again before the snapshot landed.
    tracker.handle_notification(&mut host, close(4));
    host.take_events();

    tracker
        .complete_fetch(&mut host, fetch, Ok(Some(snapshot(&[3, 4, 5], Some(3)))))
        .expect("reconciliation completes");

    assert_eq!(host.events, vec![discovered(5)]);
    assert!(tracker.state().is_open(id(5)));
    assert!(!tracker.state().is_open(id(4)));
    assert_eq!(tracker.pending_reconciliations(), 0);
}

#[test]
fn reconciliation_does_not_resurrect_document_closed_in_window() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1], Some(1)));

    tracker.handle_notification(&mut host, focus(2));
    let fetch = host.last_fetch();
    tracker.handle_notification(&mut host, close(1));
    host.take_events();

    tracker
        .complete_fetch(&mut host, fetch, Ok(Some(snapshot(&[1, 2], Some(2)))))
        .expect("reconciliation completes");

    assert!(host.events.is_empty());
    assert!(!tracker.state().is_open(id(1)));
}

#[test]
fn reconciliation_failure_is_not_fatal() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1], Some(1)));

    tracker.handle_notification(&mut host, focus(2));
    let fetch = host.last_fetch();
    host.take_events();

    tracker
        .complete_fetch(&mut host, fetch, Err("script error".to_string()))
        .expect("completion accepted");
    assert!(host.events.is_empty());
    assert_eq!(host.shutdowns, 0);

    tracker.handle_notification(&mut host, focus(3));
    assert_eq!(host.events, vec![discovered(3), activated(Some(3), Some(2))]);
    assert!(tracker.is_ready());
}

#[test]
fn reconciliation_without_result_emits_nothing() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[], None));

    tracker.handle_notification(&mut host, focus(2));
    let fetch = host.last_fetch();
    host.take_events();

    tracker
        .complete_fetch(&mut host, fetch, Ok(None))
        .expect("completion accepted");
    assert!(host.events.is_empty());
    assert_eq!(tracker.pending_reconciliations(), 0);
}

#[test]
fn overlapping_reconciliations_converge_without_duplicates() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1], Some(1)));

    tracker.handle_notification(&mut host, focus(2));
    let first = host.last_fetch();
    tracker.handle_notification(&mut host, focus(3));
    let second = host.last_fetch();
    assert_ne!(first, second);
    host.take_events();

    // Answers arrive out of order.
    tracker
        .complete_fetch(&mut host, second, Ok(Some(snapshot(&[1, 2, 3, 4, 5], Some(3)))))
        .expect("second completes");
    tracker
        .complete_fetch(&mut host, first, Ok(Some(snapshot(&[1, 2, 4, 5, 6], Some(2)))))
        .expect("first completes");

    assert_eq!(host.events, vec![discovered(4), discovered(5), discovered(6)]);
}

#[test]
fn menu_click_is_enriched_with_active_document_and_previous_state() {
    let mut host = RecordingHost::default();
    host.menu_states
        .insert("assets".to_string(), json!({"enabled": true, "checked": false}));
    let mut tracker = ready_tracker(&mut host, snapshot(&[1, 2], Some(2)));

    tracker.handle_notification(&mut host, menu(Some("assets")));

    let [TrackerEvent::MenuClicked { menu }] = host.events.as_slice() else {
        panic!("expected one menuClicked, got {:?}", host.events);
    };
    assert_eq!(menu.name, "assets");
    assert_eq!(menu.document_id, Some(id(2)));
    assert_eq!(
        menu.previous_state,
        Some(json!({"enabled": true, "checked": false}))
    );
}

#[test]
fn menu_click_without_focus_has_no_document() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[], None));

    tracker.handle_notification(&mut host, menu(Some("assets")));

    let [TrackerEvent::MenuClicked { menu }] = host.events.as_slice() else {
        panic!("expected one menuClicked, got {:?}", host.events);
    };
    assert_eq!(menu.document_id, None);
    assert_eq!(menu.previous_state, None);
}

#[test]
fn menu_change_without_name_is_ignored() {
    let mut host = RecordingHost::default();
    let mut tracker = ready_tracker(&mut host, snapshot(&[1], Some(1)));
    let before = tracker.state().clone();

    tracker.handle_notification(&mut host, menu(None));
    tracker.handle_notification(&mut host, HostNotification::GeneratorMenuChanged(None));

    assert!(host.events.is_empty());
    assert_eq!(tracker.state(), &before);
}

#[test]
fn trackers_are_independent() {
    let mut first_host = RecordingHost::default();
    let mut second_host = RecordingHost::default();
    let mut first = ready_tracker(&mut first_host, snapshot(&[1], Some(1)));
    let second = ready_tracker(&mut second_host, snapshot(&[7], Some(7)));

    first.handle_notification(&mut first_host, close(1));

    assert!(!first.state().is_open(id(1)));
    assert!(second.state().is_open(id(7)));
    assert!(second_host.events.is_empty());
}

// ─────────────────────────────────────────────────────────────────────
// Properties over generated notification sequences
// ─────────────────────────────────────────────────────────────────────

/// Small deterministic generator so failures reproduce.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

fn random_notifications(rng: &mut XorShift, count: usize) -> Vec<HostNotification> {
    (0..count)
        .map(|_| {
            let document = 1 + rng.below(6);
            match rng.below(5) {
                0 | 1 => focus(document),
                2 => close(document),
                3 => touch(document),
                _ => menu(if rng.below(2) == 0 { Some("assets") } else { None }),
            }
        })
        .collect()
}

fn random_snapshot(rng: &mut XorShift) -> Snapshot {
    let ids: Vec<u64> = (1..=6).filter(|_| rng.below(2) == 0).collect();
    let active = if ids.is_empty() || rng.below(4) == 0 {
        None
    } else {
        Some(ids[rng.below(ids.len() as u64) as usize])
    };
    snapshot(&ids, active)
}

/// Replays the event stream against a model of the listener's view and
/// checks the ordering and exactly-once contracts.
fn assert_event_contracts(events: &[TrackerEvent]) {
    let mut open: HashSet<DocumentId> = HashSet::new();
    let mut active: Option<DocumentId> = None;

    for event in events {
        match event {
            TrackerEvent::DocumentDiscovered { document_id } => {
                assert!(
                    open.insert(*document_id),
                    "{} discovered twice without a close",
                    document_id
                );
            }
            TrackerEvent::DocumentActivated {
                document_id,
                previous_document_id,
            } => {
                assert_eq!(*previous_document_id, active, "stale previous id");
                assert_ne!(*document_id, active, "activation without change");
                if let Some(document_id) = document_id {
                    assert!(open.contains(document_id), "activated undiscovered document");
                }
                active = *document_id;
            }
            TrackerEvent::DocumentClosed { document_id } => {
                assert!(open.remove(document_id), "{} closed while not open", document_id);
                assert_ne!(active, Some(*document_id), "closed the active document");
            }
            TrackerEvent::MenuClicked { menu } => {
                assert_eq!(menu.document_id, active);
            }
            TrackerEvent::TrackerReady => {}
        }
    }
}

fn without_ready(events: &[TrackerEvent]) -> Vec<TrackerEvent> {
    events
        .iter()
        .filter(|event| **event != TrackerEvent::TrackerReady)
        .cloned()
        .collect()
}

#[test]
fn replay_matches_processing_after_bootstrap() {
    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);

    for _ in 0..200 {
        let baseline = random_snapshot(&mut rng);
        let notifications = random_notifications(&mut rng, 12);

        let mut cached_host = RecordingHost::default();
        let mut cached = Tracker::setup(&mut cached_host);
        for notification in notifications.clone() {
            cached.handle_notification(&mut cached_host, notification);
        }
        cached
            .complete_fetch(&mut cached_host, BOOTSTRAP_FETCH, Ok(Some(baseline.clone())))
            .expect("bootstrap completes");

        let mut live_host = RecordingHost::default();
        let mut live = Tracker::setup(&mut live_host);
        live.complete_fetch(&mut live_host, BOOTSTRAP_FETCH, Ok(Some(baseline.clone())))
            .expect("bootstrap completes");
        for notification in notifications {
            live.handle_notification(&mut live_host, notification);
        }

        assert_eq!(cached.state(), live.state(), "baseline {:?}", baseline);
        assert_eq!(
            cached_host.events.last(),
            Some(&TrackerEvent::TrackerReady),
            "ready comes last after replay"
        );
        assert_eq!(
            without_ready(&cached_host.events),
            without_ready(&live_host.events)
        );
        assert_eq!(cached_host.fetches, live_host.fetches);
    }
}

#[test]
fn generated_runs_keep_state_invariants_and_event_contracts() {
    let mut rng = XorShift(0x0123_4567_89AB_CDEF);

    for _ in 0..200 {
        let mut host = RecordingHost::default();
        let mut tracker = Tracker::setup(&mut host);
        for notification in random_notifications(&mut rng, 4) {
            tracker.handle_notification(&mut host, notification);
        }
        tracker
            .complete_fetch(&mut host, BOOTSTRAP_FETCH, Ok(Some(random_snapshot(&mut rng))))
            .expect("bootstrap completes");
        assert!(tracker.state().invariants_hold());

        for step in 0..30 {
            for notification in random_notifications(&mut rng, 1) {
                tracker.handle_notification(&mut host, notification);
            }
            assert!(tracker.state().invariants_hold());

            // Let reconciliation answers lag behind the notifications.
            if step % 3 == 0 {
                let fetches: Vec<FetchId> = host
                    .fetches
                    .iter()
                    .map(|(fetch, _)| *fetch)
                    .filter(|fetch| *fetch != BOOTSTRAP_FETCH)
                    .collect();
                for fetch in fetches {
                    let reply = random_snapshot(&mut rng);
                    // Fetches answered in an earlier round are rejected.
                    let _ = tracker.complete_fetch(&mut host, fetch, Ok(Some(reply)));
                }
                assert!(tracker.state().invariants_hold());
                assert_eq!(tracker.pending_reconciliations(), 0);
            }
        }

        assert_event_contracts(&host.events);
    }
}
