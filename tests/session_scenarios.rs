use panelfeed::api::{EventLogParser, MockHistorySource};
use panelfeed::state::{HistoryPage, OrderedEvent};
use panelfeed::types::{ChannelEvent, EventBody, MessageEvent, MethodStatus};
use panelfeed::{ChannelSession, SessionConfig};
use serde_json::{json, Value};

fn events(lines: &[Value]) -> Vec<ChannelEvent> {
    let mut feed = String::new();
    for line in lines {
        feed.push_str(&line.to_string());
        feed.push('\n');
    }
    EventLogParser::new().process(feed.as_bytes())
}

fn joined(config: SessionConfig) -> ChannelSession {
    let mut session = ChannelSession::new(config);
    session.join();
    session
}

fn participant(id: &str, handle: &str, kind: &str) -> Value {
    json!({"id": id, "name": handle, "type": kind, "handle": handle})
}

fn message_ids(session: &ChannelSession) -> Vec<String> {
    session.messages().iter().map(|m| m.id.clone()).collect()
}

#[tokio::test]
async fn test_window_cap_four_keeps_last_four() {
    let mut session = joined(SessionConfig {
        visible_cap: 4,
        ..SessionConfig::for_participant("panel")
    });
    let feed: Vec<Value> = (1..=9)
        .map(|n| {
            json!({"type": "message", "id": n.to_string(), "senderId": "agent", "pubsubId": n})
        })
        .collect();
    session.run(futures::stream::iter(events(&feed))).await;

    assert_eq!(message_ids(&session), vec!["6", "7", "8", "9"]);
    assert_eq!(session.window().state().oldest_loaded_cursor, Some(6));
}

#[tokio::test]
async fn test_replayed_history_is_idempotent() {
    let mut session = joined(SessionConfig::for_participant("panel"));
    let replayed =
        json!({"type": "message", "id": "m1", "senderId": "agent", "pubsubId": 4, "replay": true});
    let feed = events(&[
        replayed.clone(),
        replayed,
        json!({"type": "message", "id": "m1-copy", "senderId": "agent", "pubsubId": 4}),
    ]);
    session.run(futures::stream::iter(feed)).await;

    assert_eq!(message_ids(&session), vec!["m1"]);
    assert!(session.messages()[0].complete, "replayed messages are complete");
}

#[tokio::test]
async fn test_method_call_result_scenario() {
    let mut session = joined(SessionConfig::for_participant("panel"));
    let feed = events(&[
        json!({"type": "roster", "participants": {
            "tools": {
                "id": "tools", "name": "tools", "type": "worker", "handle": "tools",
                "methods": [{"name": "lookup", "description": "Find a record"}]
            }
        }}),
        json!({"type": "method-call", "callId": "c1", "methodName": "lookup",
               "providerId": "tools", "senderId": "agent", "ts": 10}),
        json!({"type": "method-call", "callId": "c1", "methodName": "lookup",
               "providerId": "tools", "senderId": "agent", "ts": 10, "replay": true}),
        json!({"type": "method-result", "callId": "c1", "complete": true,
               "isError": false, "content": {"ok": true}}),
    ]);
    session.run(futures::stream::iter(feed)).await;

    assert_eq!(session.method_entries().len(), 1);
    let record = &session.method_entries()["c1"];
    assert_eq!(record.status, MethodStatus::Success);
    assert_eq!(record.result, Some(json!({"ok": true})));
    assert_eq!(record.description.as_deref(), Some("Find a record"));
    assert!(record.completed_at.is_some());
    assert_eq!(message_ids(&session), vec!["c1"]);
}

#[tokio::test]
async fn test_method_history_pruning_keeps_pending_calls() {
    let mut session = joined(SessionConfig {
        max_method_entries: 10,
        ..SessionConfig::for_participant("panel")
    });
    let mut feed = Vec::new();
    for n in 0..9 {
        let call_id = format!("done-{n}");
        feed.push(json!({"type": "method-call", "callId": call_id, "methodName": "run",
                         "providerId": "tools", "senderId": "agent", "ts": n}));
        feed.push(json!({"type": "method-result", "callId": call_id, "complete": true,
                         "content": "ok"}));
    }
    for n in 0..3 {
        feed.push(json!({"type": "method-call", "callId": format!("live-{n}"),
                         "methodName": "run", "providerId": "tools", "senderId": "agent",
                         "ts": 100 + n}));
    }
    session.run(futures::stream::iter(events(&feed))).await;

    let entries = session.method_entries();
    assert!(entries.len() <= 8, "pruned to {} records", entries.len());
    for n in 0..3 {
        assert_eq!(entries[&format!("live-{n}")].status, MethodStatus::Pending);
    }
    assert!(!entries.contains_key("done-0"));
    let placeholders = session
        .messages()
        .iter()
        .filter(|m| m.method_call_id().is_some())
        .count();
    assert_eq!(placeholders, entries.len());
}

#[tokio::test]
async fn test_expected_stop_then_reconnect_under_new_id() {
    let mut session = joined(SessionConfig::for_participant("panel"));
    let panel = participant("panel", "panel", "panel");
    let old = participant("agent-7", "reviewer", "worker");
    let new = participant("agent-7b", "reviewer", "worker");
    let feed = events(&[
        json!({"type": "roster", "participants": {"panel": panel, "agent-7": old}}),
        json!({"type": "message", "id": "t1", "senderId": "agent-7", "contentType": "typing"}),
        json!({"type": "agent-debug", "ts": 1, "payload": {
            "debugType": "lifecycle", "event": "stopped",
            "agentId": "agent-7", "handle": "reviewer", "reason": "user-requested"
        }}),
        json!({"type": "roster", "participants": {"panel": panel}}),
    ]);
    session.run(futures::stream::iter(feed)).await;

    assert!(session.messages().iter().all(|m| m.disconnect.is_none()));
    assert!(!session.roster().expects_stop("reviewer"));

    let late = events(&[
        json!({"type": "message", "id": "t2", "senderId": "agent-7", "contentType": "typing"}),
        json!({"type": "roster", "participants": {"panel": panel, "agent-7b": new}}),
    ]);
    session.run(futures::stream::iter(late)).await;

    assert!(session.messages().iter().all(|m| !m.is_incomplete_typing()));
    assert!(session.grouped().is_empty());

    // A second unannounced departure is a real disconnect.
    session.run(futures::stream::iter(events(&[
        json!({"type": "roster", "participants": {"panel": panel}}),
    ])))
    .await;
    let notices: Vec<_> = session
        .messages()
        .iter()
        .filter_map(|m| m.disconnect.as_ref())
        .map(|notice| notice.participant_id.clone())
        .collect();
    assert_eq!(notices, vec!["agent-7b"]);
}

#[tokio::test]
async fn test_expected_stop_is_settled_by_graceful_leave() {
    let mut session = joined(SessionConfig::for_participant("panel"));
    let panel = participant("panel", "panel", "panel");
    let first = participant("a1", "rev", "worker");
    let second = participant("a2", "rev", "worker");
    let feed = events(&[
        json!({"type": "roster", "participants": {"panel": panel, "a1": first}}),
        json!({"type": "agent-debug", "ts": 1, "payload": {
            "debugType": "lifecycle", "event": "idle-timeout", "agentId": "a1", "handle": "rev"
        }}),
        json!({"type": "roster", "participants": {"panel": panel},
               "change": {"type": "leave", "participantId": "a1", "leaveReason": "graceful"}}),
        json!({"type": "roster", "participants": {"panel": panel, "a2": second}}),
        json!({"type": "roster", "participants": {"panel": panel}}),
    ]);
    session.run(futures::stream::iter(feed)).await;

    let notices: Vec<_> = session
        .messages()
        .iter()
        .filter_map(|m| m.disconnect.as_ref())
        .map(|notice| notice.participant_id.clone())
        .collect();
    assert_eq!(notices, vec!["a2"]);
}

#[tokio::test]
async fn test_reconnect_discards_pending_expected_stops() {
    let mut session = joined(SessionConfig::for_participant("panel"));
    let panel = participant("panel", "panel", "panel");
    let worker = participant("a1", "rev", "worker");
    session
        .run(futures::stream::iter(events(&[
            json!({"type": "roster", "participants": {"panel": panel, "a1": worker}}),
            json!({"type": "agent-debug", "ts": 1, "payload": {
                "debugType": "lifecycle", "event": "stopped", "agentId": "a1", "handle": "rev"
            }}),
        ])))
        .await;
    assert!(session.roster().expects_stop("rev"));

    session.on_reconnect();
    assert!(!session.roster().expects_stop("rev"));
}

#[tokio::test]
async fn test_departures_during_join_replay_are_silent() {
    let mut session = joined(SessionConfig::for_participant("panel"));
    let worker = participant("w1", "builder", "worker");
    let feed = events(&[
        json!({"type": "roster", "participants": {"w1": worker}}),
        json!({"type": "roster", "participants": {}}),
    ]);
    session.run(futures::stream::iter(feed)).await;
    assert!(session.messages().is_empty());
    assert!(session.roster().is_suppressing());
}

#[tokio::test]
async fn test_typing_supersession_in_grouped_output() {
    let mut session = joined(SessionConfig::for_participant("panel"));
    let feed = events(&[
        json!({"type": "message", "id": "q", "senderId": "panel", "content": "hi"}),
        json!({"type": "message", "id": "T1", "senderId": "A", "contentType": "typing"}),
        json!({"type": "message", "id": "T2", "senderId": "A", "contentType": "typing"}),
    ]);
    session.run(futures::stream::iter(feed)).await;

    let grouped = session.grouped();
    assert_eq!(grouped.len(), 2);
    let group = grouped[1].as_group().expect("inline group");
    let ids: Vec<&str> = group.items.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["T2"]);
}

fn page_message(sequence_id: i64, id: &str) -> OrderedEvent {
    OrderedEvent {
        sequence_id,
        event: ChannelEvent::live(EventBody::Message(MessageEvent {
            id: id.to_string(),
            sender_id: "agent".to_string(),
            content: format!("older {id}"),
            ..MessageEvent::default()
        })),
    }
}

#[tokio::test]
async fn test_load_earlier_skips_empty_pages() {
    let mut session = joined(SessionConfig {
        visible_cap: 2,
        ..SessionConfig::for_participant("panel")
    });
    let feed: Vec<Value> = (20..=24)
        .map(|n| {
            json!({"type": "message", "id": format!("m{n}"), "senderId": "agent", "pubsubId": n})
        })
        .collect();
    session.run(futures::stream::iter(events(&feed))).await;
    assert_eq!(session.window().state().oldest_loaded_cursor, Some(23));

    let source = MockHistorySource::new(vec![
        HistoryPage {
            messages: Vec::new(),
            has_more: true,
            next_cursor: Some(15),
        },
        HistoryPage {
            messages: vec![page_message(12, "h12"), page_message(14, "h14")],
            has_more: true,
            next_cursor: Some(12),
        },
    ]);

    let added = session.load_earlier(&source).await.expect("history loads");
    assert_eq!(added, 2);
    assert_eq!(message_ids(&session), vec!["h12", "h14", "m23", "m24"]);
    assert_eq!(source.requests().len(), 2);
    assert_eq!(source.requests()[1].0, 15);
    assert_eq!(session.window().state().oldest_loaded_cursor, Some(12));
    assert!(session.has_more_history());
}
