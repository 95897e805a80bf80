mod common;

use call_assist::transport::ConnectionState;
use call_assist::{EventDispatcher, EventKind, EventSink, TranscriptEvent};
use common::EventLog;

fn caption(text: &str) -> TranscriptEvent {
    TranscriptEvent::Caption {
        channel_index: 0,
        speaker_label: "you".to_string(),
        text: text.to_string(),
    }
}

#[test]
fn events_arrive_in_dispatch_order() {
    let dispatcher = EventDispatcher::new();
    let log = EventLog::new();
    let _sub = dispatcher.subscribe(EventKind::Caption, log.handler());

    for text in ["one", "two", "three"] {
        dispatcher.dispatch(&caption(text));
    }

    let texts: Vec<String> = log
        .events()
        .into_iter()
        .map(|event| match event {
            TranscriptEvent::Caption { text, .. } => text,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[test]
fn subscribers_only_see_their_variant() {
    let dispatcher = EventDispatcher::new();
    let captions = EventLog::new();
    let summaries = EventLog::new();
    let _c = dispatcher.subscribe(EventKind::Caption, captions.handler());
    let _s = dispatcher.subscribe(EventKind::Summary, summaries.handler());

    dispatcher.dispatch(&caption("hello"));
    dispatcher.dispatch(&TranscriptEvent::Summary {
        text: "so far".to_string(),
    });
    dispatcher.dispatch(&caption("again"));

    assert_eq!(captions.len(), 2);
    assert_eq!(summaries.len(), 1);
}

#[test]
fn every_subscriber_of_a_variant_is_invoked() {
    let dispatcher = EventDispatcher::new();
    let first = EventLog::new();
    let second = EventLog::new();
    let _a = dispatcher.subscribe(EventKind::Caption, first.handler());
    let _b = dispatcher.subscribe(EventKind::Caption, second.handler());

    dispatcher.dispatch(&caption("shared"));

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
}

#[test]
fn unsubscribe_stops_delivery() {
    let dispatcher = EventDispatcher::new();
    let log = EventLog::new();
    let sub = dispatcher.subscribe(EventKind::Caption, log.handler());

    dispatcher.dispatch(&caption("before"));
    sub.unsubscribe();
    dispatcher.dispatch(&caption("after"));

    assert_eq!(log.len(), 1);
}

#[test]
fn dropping_the_handle_unsubscribes() {
    let dispatcher = EventDispatcher::new();
    let log = EventLog::new();

    {
        let _sub = dispatcher.subscribe(EventKind::Caption, log.handler());
        dispatcher.dispatch(&caption("in scope"));
    }
    dispatcher.dispatch(&caption("out of scope"));

    assert_eq!(log.len(), 1);
}

#[test]
fn sink_passes_events_through_until_sealed() {
    let dispatcher = EventDispatcher::new();
    let statuses = EventLog::new();
    let captions = EventLog::new();
    let _s = dispatcher.subscribe(EventKind::Status, statuses.handler());
    let _c = dispatcher.subscribe(EventKind::Caption, captions.handler());

    let sink = EventSink::new(dispatcher);
    sink.emit(caption("live"));
    sink.emit_terminal_status(ConnectionState::Closed {
        code: Some(1000),
        reason: None,
    });

    // Sealed: content and further terminal statuses are dropped
    sink.emit(caption("late"));
    sink.emit_terminal_status(ConnectionState::Error {
        message: "late fault".to_string(),
    });

    assert!(sink.is_sealed());
    assert_eq!(captions.len(), 1);
    assert_eq!(statuses.len(), 1);
    assert_eq!(
        statuses.events()[0],
        TranscriptEvent::StatusChanged {
            state: ConnectionState::Closed {
                code: Some(1000),
                reason: None,
            }
        }
    );
}
