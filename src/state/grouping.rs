//! Derives the render list from the message window: runs of ephemeral items
//! (method calls, thinking traces, tool actions, live typing signals) collapse
//! into one inline group, conversational messages stay standalone.
//!
//! [`group_messages`] is the reference computation. [`GroupingMemo`] caches the
//! previous result and patches it for pure appends and tail-only edits; both
//! shortcuts must agree with the reference output exactly.

mod builder;
mod classify;
mod memo;


use crate::types::{ChatMessage, MethodCallRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub use classify::{
    action_descriptor, inline_kind, normalize_tool_name, ActionDescriptor, InlineKind,
};
pub use memo::{GroupingMemo, RecomputePath};

pub type MethodLookup = HashMap<String, MethodCallRecord>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupedItem {
    Message { message: Arc<ChatMessage> },
    InlineGroup(InlineGroup),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineGroup {
    pub key: String,
    /// Every visible inline item of the run, in order.
    #[serde(skip)]
    pub sources: Vec<Arc<ChatMessage>>,
    /// `sources` after action de-duplication and method suppression.
    pub items: Vec<Arc<ChatMessage>>,
}

impl GroupedItem {
    pub fn key(&self) -> &str {
        match self {
            Self::Message { message } => &message.id,
            Self::InlineGroup(group) => &group.key,
        }
    }

    pub fn as_message(&self) -> Option<&Arc<ChatMessage>> {
        match self {
            Self::Message { message } => Some(message),
            Self::InlineGroup(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&InlineGroup> {
        match self {
            Self::Message { .. } => None,
            Self::InlineGroup(group) => Some(group),
        }
    }
}

pub fn group_messages(messages: &[Arc<ChatMessage>], methods: &MethodLookup) -> Vec<GroupedItem> {
    let latest_typing = classify::latest_typing_by_sender(messages);
    let mut builder = builder::GroupBuilder::new(methods);
    for message in messages {
        builder.push(message, &latest_typing);
    }
    builder.finish()
}
