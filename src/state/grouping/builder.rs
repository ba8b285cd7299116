use super::classify::{action_descriptor, normalize_tool_name, placement, Placement};
use super::{GroupedItem, InlineGroup, MethodLookup};
use crate::types::{ChatMessage, MessageKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Single forward pass over the message list. Every recompute path funnels
/// through here so they cannot drift apart.
pub(super) struct GroupBuilder<'a> {
    items: Vec<GroupedItem>,
    run: Vec<Arc<ChatMessage>>,
    methods: &'a MethodLookup,
}

impl<'a> GroupBuilder<'a> {
    pub(super) fn new(methods: &'a MethodLookup) -> Self {
        Self::resume(Vec::new(), Vec::new(), methods)
    }

    /// Continues from already-grouped `items` with `run` as the open inline run.
    pub(super) fn resume(
        items: Vec<GroupedItem>,
        run: Vec<Arc<ChatMessage>>,
        methods: &'a MethodLookup,
    ) -> Self {
        Self {
            items,
            run,
            methods,
        }
    }

    pub(super) fn push(
        &mut self,
        message: &Arc<ChatMessage>,
        latest_typing: &HashMap<String, String>,
    ) {
        match placement(message, latest_typing) {
            Placement::Hidden => {}
            Placement::Inline(_) => self.run.push(Arc::clone(message)),
            Placement::Standalone => {
                self.flush_run();
                self.items.push(GroupedItem::Message {
                    message: Arc::clone(message),
                });
            }
        }
    }

    pub(super) fn finish(mut self) -> Vec<GroupedItem> {
        self.flush_run();
        self.items
    }

    fn flush_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        let sources = std::mem::take(&mut self.run);
        self.items
            .push(GroupedItem::InlineGroup(derive_group(sources, self.methods)));
    }
}

/// Builds a group's rendered view from its source items.
///
/// Only the last action per tool-use id survives. A method item is dropped when
/// a surviving action names the same tool.
pub(super) fn derive_group(
    sources: Vec<Arc<ChatMessage>>,
    methods: &MethodLookup,
) -> InlineGroup {
    let key = sources
        .first()
        .map(|first| format!("inline-{}", first.id))
        .unwrap_or_default();

    let descriptors: Vec<_> = sources
        .iter()
        .map(|m| match m.kind {
            MessageKind::Method => None,
            _ => action_descriptor(m),
        })
        .collect();

    let mut last_by_tool_use: HashMap<&str, usize> = HashMap::new();
    for (index, descriptor) in descriptors.iter().enumerate() {
        if let Some(tool_use_id) = descriptor.as_ref().and_then(|d| d.tool_use_id.as_deref()) {
            last_by_tool_use.insert(tool_use_id, index);
        }
    }

    let keep_action = |index: usize| match descriptors[index]
        .as_ref()
        .and_then(|d| d.tool_use_id.as_deref())
    {
        Some(tool_use_id) => last_by_tool_use.get(tool_use_id) == Some(&index),
        None => true,
    };

    let action_names: HashSet<String> = descriptors
        .iter()
        .enumerate()
        .filter(|(index, descriptor)| descriptor.is_some() && keep_action(*index))
        .filter_map(|(_, descriptor)| descriptor.as_ref()?.name.as_deref())
        .map(normalize_tool_name)
        .collect();

    let items = sources
        .iter()
        .enumerate()
        .filter(|(index, message)| match descriptors[*index] {
            Some(_) => keep_action(*index),
            None => !is_suppressed_method(message, methods, &action_names),
        })
        .map(|(_, message)| Arc::clone(message))
        .collect();

    InlineGroup {
        key,
        sources,
        items,
    }
}

fn is_suppressed_method(
    message: &ChatMessage,
    methods: &MethodLookup,
    action_names: &HashSet<String>,
) -> bool {
    if message.kind != MessageKind::Method || action_names.is_empty() {
        return false;
    }
    message
        .method_call_id()
        .and_then(|call_id| methods.get(call_id))
        .is_some_and(|record| action_names.contains(&normalize_tool_name(&record.method_name)))
}
