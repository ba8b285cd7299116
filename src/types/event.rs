use super::message::{Attachment, ChatMessage, MessageKind, MethodRef, SenderMetadata};
use super::participant::ParticipantSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One inbound (or outbound) protocol event. `replay` marks events re-delivered
/// from persisted history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelEvent {
    #[serde(flatten)]
    pub body: EventBody,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replay: bool,
}

impl ChannelEvent {
    pub fn live(body: EventBody) -> Self {
        Self {
            body,
            replay: false,
        }
    }

    pub fn replayed(body: EventBody) -> Self {
        Self { body, replay: true }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.body {
            EventBody::Message(_) => "message",
            EventBody::UpdateMessage(_) => "update-message",
            EventBody::Error(_) => "error",
            EventBody::MethodCall(_) => "method-call",
            EventBody::MethodResult(_) => "method-result",
            EventBody::ExecutionPause(_) => "execution-pause",
            EventBody::AgentDebug(_) => "agent-debug",
            EventBody::Roster(_) => "roster",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventBody {
    Message(MessageEvent),
    UpdateMessage(UpdateMessageEvent),
    Error(ErrorEvent),
    MethodCall(MethodCallEvent),
    MethodResult(MethodResultEvent),
    ExecutionPause(ExecutionPauseEvent),
    AgentDebug(AgentDebugEvent),
    Roster(RosterUpdate),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub id: String,
    pub sender_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubsub_id: Option<i64>,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_metadata: Option<SenderMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl From<MessageEvent> for ChatMessage {
    fn from(event: MessageEvent) -> Self {
        let method = (event.kind == MessageKind::Method).then(|| MethodRef {
            call_id: event.id.clone(),
        });
        Self {
            id: event.id,
            pubsub_id: event.pubsub_id,
            sender_id: event.sender_id,
            content: event.content,
            content_type: event.content_type,
            kind: event.kind,
            complete: event.complete,
            attachments: event.attachments,
            sender_metadata: event.sender_metadata,
            method,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallEvent {
    pub call_id: String,
    pub method_name: String,
    #[serde(default)]
    pub args: Value,
    pub provider_id: String,
    pub sender_id: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MethodResultEvent {
    pub call_id: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPauseEvent {
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentDebugEvent {
    pub payload: AgentDebugPayload,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "debugType", rename_all = "kebab-case")]
pub enum AgentDebugPayload {
    #[serde(rename_all = "camelCase")]
    Lifecycle {
        event: LifecycleEvent,
        agent_id: String,
        handle: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    SpawnError {
        agent_id: String,
        handle: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl AgentDebugPayload {
    pub fn handle(&self) -> &str {
        match self {
            Self::Lifecycle { handle, .. } | Self::SpawnError { handle, .. } => handle,
        }
    }

    pub fn agent_id(&self) -> &str {
        match self {
            Self::Lifecycle { agent_id, .. } | Self::SpawnError { agent_id, .. } => agent_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleEvent {
    Spawned,
    Started,
    Woken,
    IdleTimeout,
    Stopped,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterUpdate {
    pub participants: BTreeMap<String, ParticipantSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<RosterChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterChange {
    #[serde(rename = "type")]
    pub change_type: String,
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_reason: Option<String>,
}

impl RosterChange {
    pub fn is_graceful_leave_of(&self, participant_id: &str) -> bool {
        self.change_type == "leave"
            && self.participant_id == participant_id
            && self.leave_reason.as_deref() == Some("graceful")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_event_parses_from_wire_shape() {
        let event: ChannelEvent = serde_json::from_value(json!({
            "type": "message",
            "id": "m1",
            "senderId": "agent-1",
            "content": "hi",
            "contentType": "thinking",
            "pubsubId": 12,
            "replay": true
        }))
        .unwrap();
        assert!(event.replay);
        match event.body {
            EventBody::Message(message) => {
                assert_eq!(message.pubsub_id, Some(12));
                assert_eq!(message.content_type.as_deref(), Some("thinking"));
                assert_eq!(message.kind, MessageKind::Message);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_agent_debug_lifecycle_parses() {
        let event: ChannelEvent = serde_json::from_value(json!({
            "type": "agent-debug",
            "ts": 5,
            "payload": {
                "debugType": "lifecycle",
                "event": "idle-timeout",
                "agentId": "agent-7",
                "handle": "reviewer"
            }
        }))
        .unwrap();
        let EventBody::AgentDebug(debug) = event.body else {
            panic!("expected agent-debug");
        };
        assert_eq!(debug.payload.handle(), "reviewer");
        assert!(matches!(
            debug.payload,
            AgentDebugPayload::Lifecycle {
                event: LifecycleEvent::IdleTimeout,
                ..
            }
        ));
    }

    #[test]
    fn test_graceful_leave_matches_exact_participant() {
        let change = RosterChange {
            change_type: "leave".to_string(),
            participant_id: "agent-1".to_string(),
            leave_reason: Some("graceful".to_string()),
        };
        assert!(change.is_graceful_leave_of("agent-1"));
        assert!(!change.is_graceful_leave_of("agent-2"));
    }
}
