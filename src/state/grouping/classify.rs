use crate::types::{ChatMessage, MessageKind, CONTENT_TYPE_ACTION, CONTENT_TYPE_THINKING};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineKind {
    Method,
    Thinking,
    Action,
    Typing,
}

/// Where a message lands in the grouped output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placement {
    Standalone,
    Inline(InlineKind),
    /// Finished or superseded typing signal; not rendered at all.
    Hidden,
}

/// Which inline category a message belongs to, if any. Completed typing
/// signals are not inline.
pub fn inline_kind(message: &ChatMessage) -> Option<InlineKind> {
    if message.kind == MessageKind::Method {
        Some(InlineKind::Method)
    } else if message.has_content_type(CONTENT_TYPE_THINKING) {
        Some(InlineKind::Thinking)
    } else if message.has_content_type(CONTENT_TYPE_ACTION) {
        Some(InlineKind::Action)
    } else if message.is_incomplete_typing() {
        Some(InlineKind::Typing)
    } else {
        None
    }
}

fn is_typing_signal(message: &ChatMessage) -> bool {
    message.kind != MessageKind::Method && message.is_typing()
}

pub(super) fn placement(
    message: &ChatMessage,
    latest_typing: &HashMap<String, String>,
) -> Placement {
    if is_typing_signal(message) {
        let latest = latest_typing.get(&message.sender_id);
        if message.complete || latest != Some(&message.id) {
            return Placement::Hidden;
        }
        return Placement::Inline(InlineKind::Typing);
    }
    match inline_kind(message) {
        Some(kind) => Placement::Inline(kind),
        None => Placement::Standalone,
    }
}

/// Last incomplete typing signal per sender. Always a full scan; typing
/// signals are few.
pub(super) fn latest_typing_by_sender(messages: &[Arc<ChatMessage>]) -> HashMap<String, String> {
    let mut latest = HashMap::new();
    for message in messages {
        if is_typing_signal(message) && !message.complete {
            latest.insert(message.sender_id.clone(), message.id.clone());
        }
    }
    latest
}

/// Tool invocation identity carried in an action item's JSON body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub tool_use_id: Option<String>,
    pub name: Option<String>,
}

pub fn action_descriptor(message: &ChatMessage) -> Option<ActionDescriptor> {
    if !message.has_content_type(CONTENT_TYPE_ACTION) {
        return None;
    }
    let Ok(Value::Object(body)) = serde_json::from_str::<Value>(&message.content) else {
        return Some(ActionDescriptor::default());
    };
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .map(ToString::to_string)
    };
    Some(ActionDescriptor {
        tool_use_id: text(&["toolUseId", "tool_use_id", "id"]),
        name: text(&["name", "tool"]),
    })
}

/// Lowercase, alphanumerics only: `read_file`, `ReadFile` and `read-file`
/// all compare equal.
pub fn normalize_tool_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
