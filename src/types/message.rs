use super::participant::ParticipantType;
use serde::{Deserialize, Serialize};

pub const CONTENT_TYPE_THINKING: &str = "thinking";
pub const CONTENT_TYPE_TYPING: &str = "typing";
pub const CONTENT_TYPE_ACTION: &str = "action";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Message,
    Method,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Opaque payload reference; encoding lives outside this crate.
    #[serde(default)]
    pub data: Option<String>,
}

/// Sender identity captured when a message was observed. The live roster entry
/// may be gone by the time the message is rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SenderMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub participant_type: ParticipantType,
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MethodRef {
    pub call_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectNotice {
    pub participant_id: String,
    pub name: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(rename = "type")]
    pub participant_type: ParticipantType,
    pub observed_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub pubsub_id: Option<i64>,
    pub sender_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub pending: Option<bool>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub sender_metadata: Option<SenderMetadata>,
    #[serde(default)]
    pub method: Option<MethodRef>,
    #[serde(default)]
    pub disconnect: Option<DisconnectNotice>,
}

/// The single payload a message renders as.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessagePayload<'a> {
    Content(&'a str),
    Method(&'a MethodRef),
    Disconnect(&'a DisconnectNotice),
}

impl ChatMessage {
    pub fn text(
        id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_pubsub_id(mut self, pubsub_id: i64) -> Self {
        self.pubsub_id = Some(pubsub_id);
        self
    }

    pub fn completed(mut self) -> Self {
        self.complete = true;
        self
    }

    /// Zero-content timeline anchor for a method call.
    pub fn method_placeholder(call_id: &str, caller_id: &str) -> Self {
        Self {
            id: call_id.to_string(),
            sender_id: caller_id.to_string(),
            kind: MessageKind::Method,
            method: Some(MethodRef {
                call_id: call_id.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn disconnect_notice(id: String, notice: DisconnectNotice) -> Self {
        Self {
            id,
            sender_id: notice.participant_id.clone(),
            kind: MessageKind::System,
            complete: true,
            disconnect: Some(notice),
            ..Self::default()
        }
    }

    pub fn payload(&self) -> MessagePayload<'_> {
        if let Some(notice) = &self.disconnect {
            return MessagePayload::Disconnect(notice);
        }
        if let Some(method) = &self.method {
            return MessagePayload::Method(method);
        }
        MessagePayload::Content(&self.content)
    }

    pub fn has_content_type(&self, content_type: &str) -> bool {
        self.content_type.as_deref() == Some(content_type)
    }

    pub fn is_pending(&self) -> bool {
        self.pending == Some(true)
    }

    pub fn is_typing(&self) -> bool {
        self.has_content_type(CONTENT_TYPE_TYPING)
    }

    pub fn is_incomplete_typing(&self) -> bool {
        self.is_typing() && !self.complete
    }

    pub fn method_call_id(&self) -> Option<&str> {
        self.method.as_ref().map(|m| m.call_id.as_str())
    }
}
