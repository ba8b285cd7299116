use crate::types::ChatMessage;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageWindowState {
    /// Arrival order, not timestamp order.
    pub messages: Vec<Arc<ChatMessage>>,
    pub oldest_loaded_cursor: Option<i64>,
    pub pagination_exhausted: bool,
}

/// The canonical, capacity-bounded message log for one channel.
///
/// Messages are shared as `Arc`s; any change to a message swaps in a fresh
/// allocation so downstream memoization can rely on pointer identity.
#[derive(Debug, Clone)]
pub struct MessageWindow {
    state: MessageWindowState,
    visible_cap: usize,
}

impl MessageWindow {
    pub fn new(visible_cap: usize) -> Self {
        Self {
            state: MessageWindowState::default(),
            visible_cap: visible_cap.max(1),
        }
    }

    pub fn state(&self) -> &MessageWindowState {
        &self.state
    }

    pub fn messages(&self) -> &[Arc<ChatMessage>] {
        &self.state.messages
    }

    pub fn len(&self) -> usize {
        self.state.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.messages.is_empty()
    }

    pub fn visible_cap(&self) -> usize {
        self.visible_cap
    }

    pub fn trim_threshold(&self) -> usize {
        self.visible_cap.saturating_mul(2)
    }

    pub fn has_more_history(&self) -> bool {
        self.state.oldest_loaded_cursor.is_some() && !self.state.pagination_exhausted
    }

    pub fn find(&self, id: &str) -> Option<&Arc<ChatMessage>> {
        self.state.messages.iter().find(|m| m.id == id)
    }

    pub fn contains_sequence(&self, pubsub_id: i64) -> bool {
        self.state
            .messages
            .iter()
            .any(|m| m.pubsub_id == Some(pubsub_id))
    }

    /// Applies `updater` to the current list and trims to the visible cap when
    /// the result grows past twice the cap. Returns true when a trim happened.
    pub fn update<F>(&mut self, updater: F) -> bool
    where
        F: FnOnce(&[Arc<ChatMessage>]) -> Vec<Arc<ChatMessage>>,
    {
        let next = updater(&self.state.messages);
        self.commit(next)
    }

    fn commit(&mut self, mut next: Vec<Arc<ChatMessage>>) -> bool {
        if next.len() > self.trim_threshold() {
            let drop_count = next.len() - self.visible_cap;
            next.drain(..drop_count);
            self.state.oldest_loaded_cursor = next
                .first()
                .and_then(|m| m.pubsub_id)
                .or_else(|| first_sequence_id(&next));
            self.state.pagination_exhausted = false;
            self.state.messages = next;
            debug!(
                dropped = drop_count,
                cursor = ?self.state.oldest_loaded_cursor,
                "message window trimmed"
            );
            return true;
        }

        if self.state.oldest_loaded_cursor.is_none() {
            self.state.oldest_loaded_cursor = first_sequence_id(&next);
        }
        self.state.messages = next;
        false
    }

    pub fn push(&mut self, message: ChatMessage) -> bool {
        let mut next = std::mem::take(&mut self.state.messages);
        next.push(Arc::new(message));
        self.commit(next)
    }

    /// Rewrites the message with `id` through `edit`. Unknown ids are a no-op.
    pub fn replace_message<F>(&mut self, id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut ChatMessage),
    {
        let Some(index) = self.state.messages.iter().position(|m| m.id == id) else {
            return false;
        };
        let mut edited = ChatMessage::clone(&self.state.messages[index]);
        edit(&mut edited);
        let edited = Arc::new(edited);
        self.update(|current| {
            let mut next = current.to_vec();
            next[index] = edited;
            next
        });
        true
    }

    /// Rewrites every message matching `select`; returns how many changed.
    pub fn replace_where<P, F>(&mut self, select: P, mut edit: F) -> usize
    where
        P: Fn(&ChatMessage) -> bool,
        F: FnMut(&mut ChatMessage),
    {
        let indices: Vec<usize> = self
            .state
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| select(m))
            .map(|(index, _)| index)
            .collect();
        if indices.is_empty() {
            return 0;
        }

        self.update(|current| {
            let mut next = current.to_vec();
            for &index in &indices {
                let mut edited = ChatMessage::clone(&next[index]);
                edit(&mut edited);
                next[index] = Arc::new(edited);
            }
            next
        });
        indices.len()
    }

    /// Drops every message matching `remove`. When the cursor-bearing message
    /// goes, the cursor moves to the next remaining sequence id, if any.
    pub fn remove_where<P>(&mut self, remove: P) -> usize
    where
        P: Fn(&ChatMessage) -> bool,
    {
        let before = self.state.messages.len();
        if !self.state.messages.iter().any(|m| remove(m)) {
            return 0;
        }
        let cursor = self.state.oldest_loaded_cursor;
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.state.messages)
            .into_iter()
            .partition(|m| remove(m));
        let cursor_removed = cursor.is_some() && removed.iter().any(|m| m.pubsub_id == cursor);
        if cursor_removed {
            if let Some(sequence) = first_sequence_id(&kept) {
                self.state.oldest_loaded_cursor = Some(sequence);
            }
        }
        self.commit(kept);
        before.saturating_sub(self.state.messages.len())
    }

    /// Splices older history before the current list. Cursor and exhausted flag
    /// are updated even when every incoming message was a duplicate.
    pub fn prepend(
        &mut self,
        older: Vec<ChatMessage>,
        new_cursor: Option<i64>,
        exhausted: bool,
    ) -> usize {
        let known_sequences: HashSet<i64> = self
            .state
            .messages
            .iter()
            .filter_map(|m| m.pubsub_id)
            .collect();
        let known_ids: HashSet<&str> = self.state.messages.iter().map(|m| m.id.as_str()).collect();

        let mut seen_sequences = HashSet::new();
        let fresh: Vec<Arc<ChatMessage>> = older
            .into_iter()
            .filter(|m| match m.pubsub_id {
                Some(seq) => !known_sequences.contains(&seq) && seen_sequences.insert(seq),
                None => true,
            })
            .filter(|m| !known_ids.contains(m.id.as_str()))
            .map(Arc::new)
            .collect();
        let added = fresh.len();

        if added > 0 {
            let mut next = fresh;
            next.extend(self.state.messages.iter().cloned());
            self.state.messages = next;
        }
        self.state.oldest_loaded_cursor = new_cursor;
        self.state.pagination_exhausted = exhausted;
        debug!(added, cursor = ?new_cursor, exhausted, "prepended history page");
        added
    }

    pub fn reset(&mut self) {
        self.state = MessageWindowState::default();
    }
}

fn first_sequence_id(messages: &[Arc<ChatMessage>]) -> Option<i64> {
    messages.iter().find_map(|m| m.pubsub_id)
}
