use super::builder::{derive_group, GroupBuilder};
use super::classify::{inline_kind, latest_typing_by_sender};
use super::{GroupedItem, MethodLookup};
use crate::types::ChatMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputePath {
    Unchanged,
    Full,
    TailMutation,
    Append,
}

/// Caches the last grouping keyed on pointer identity of the input messages
/// and the method-history revision.
#[derive(Debug, Default)]
pub struct GroupingMemo {
    input: Vec<Arc<ChatMessage>>,
    methods_revision: Option<u64>,
    latest_typing: HashMap<String, String>,
    output: Vec<GroupedItem>,
    last_path: Option<RecomputePath>,
}

impl GroupingMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_path(&self) -> Option<RecomputePath> {
        self.last_path
    }

    pub fn output(&self) -> &[GroupedItem] {
        &self.output
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn compute(
        &mut self,
        messages: &[Arc<ChatMessage>],
        methods: &MethodLookup,
        methods_revision: u64,
    ) -> &[GroupedItem] {
        let path = self.recompute(messages, methods, methods_revision);
        trace!(?path, len = messages.len(), "grouping recomputed");
        self.last_path = Some(path);
        self.methods_revision = Some(methods_revision);
        if path != RecomputePath::Unchanged {
            self.input = messages.to_vec();
        }
        &self.output
    }

    fn recompute(
        &mut self,
        messages: &[Arc<ChatMessage>],
        methods: &MethodLookup,
        methods_revision: u64,
    ) -> RecomputePath {
        if self.methods_revision == Some(methods_revision) {
            let previous_len = self.input.len();
            if messages.len() == previous_len && same_prefix(&self.input, messages, previous_len) {
                return RecomputePath::Unchanged;
            }
            if messages.len() == previous_len
                && previous_len > 0
                && same_prefix(&self.input, messages, previous_len - 1)
            {
                if let Some(output) = self.tail_mutation(&messages[previous_len - 1], methods) {
                    self.output = output;
                    return RecomputePath::TailMutation;
                }
            }
            if messages.len() > previous_len && same_prefix(&self.input, messages, previous_len) {
                if let Some((output, latest_typing)) = self.append(messages, methods) {
                    self.output = output;
                    self.latest_typing = latest_typing;
                    return RecomputePath::Append;
                }
            }
        }

        let latest_typing = latest_typing_by_sender(messages);
        let mut builder = GroupBuilder::new(methods);
        for message in messages {
            builder.push(message, &latest_typing);
        }
        self.output = builder.finish();
        self.latest_typing = latest_typing;
        RecomputePath::Full
    }

    /// Same length, only the last element changed.
    fn tail_mutation(
        &self,
        new_last: &Arc<ChatMessage>,
        methods: &MethodLookup,
    ) -> Option<Vec<GroupedItem>> {
        let old_last = self.input.last()?;
        if old_last.id != new_last.id || old_last.sender_id != new_last.sender_id {
            return None;
        }

        let (tail, head) = self.output.split_last()?;
        match tail {
            GroupedItem::Message { message } if Arc::ptr_eq(message, old_last) => {
                if new_last.is_typing() || inline_kind(new_last).is_some() {
                    return None;
                }
                let mut output = head.to_vec();
                output.push(GroupedItem::Message {
                    message: Arc::clone(new_last),
                });
                Some(output)
            }
            GroupedItem::InlineGroup(group)
                if group
                    .sources
                    .last()
                    .is_some_and(|source| Arc::ptr_eq(source, old_last)) =>
            {
                let old_kind = inline_kind(old_last)?;
                if inline_kind(new_last)? != old_kind {
                    return None;
                }
                let mut sources = group.sources.clone();
                if let Some(slot) = sources.last_mut() {
                    *slot = Arc::clone(new_last);
                }
                let mut output = head.to_vec();
                output.push(GroupedItem::InlineGroup(derive_group(sources, methods)));
                Some(output)
            }
            _ => None,
        }
    }

    /// Strictly longer input with an identical prefix. Bails out when a new
    /// typing signal supersedes one that is already visible.
    fn append(
        &self,
        messages: &[Arc<ChatMessage>],
        methods: &MethodLookup,
    ) -> Option<(Vec<GroupedItem>, HashMap<String, String>)> {
        let latest_typing = latest_typing_by_sender(messages);
        let superseded = self
            .latest_typing
            .iter()
            .any(|(sender, id)| latest_typing.get(sender) != Some(id));
        if superseded {
            return None;
        }

        let mut items = self.output.clone();
        let run = match items.pop() {
            Some(GroupedItem::InlineGroup(group)) => group.sources,
            Some(other) => {
                items.push(other);
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut builder = GroupBuilder::resume(items, run, methods);
        for message in &messages[self.input.len()..] {
            builder.push(message, &latest_typing);
        }
        Some((builder.finish(), latest_typing))
    }
}

fn same_prefix(previous: &[Arc<ChatMessage>], next: &[Arc<ChatMessage>], len: usize) -> bool {
    previous.len() >= len
        && next.len() >= len
        && previous[..len]
            .iter()
            .zip(&next[..len])
            .all(|(a, b)| Arc::ptr_eq(a, b))
}
