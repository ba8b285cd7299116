use crate::dispatch::EventHandlers;
use crate::state::debug_log::{DebugEntry, DebugLog};
use crate::state::method_history::MethodHistory;
use crate::state::roster::{RosterOutcome, RosterTracker};
use crate::state::window::MessageWindow;
use crate::types::{
    now_millis, AgentDebugPayload, Attachment, ChatMessage, MethodCallRecord, MethodResultEvent,
    RosterUpdate, UpdateMessageEvent,
};
use tracing::trace;

/// The per-channel components the dispatcher mutates.
#[derive(Debug)]
pub(super) struct SessionState {
    pub(super) window: MessageWindow,
    pub(super) methods: MethodHistory,
    pub(super) roster: RosterTracker,
    pub(super) debug_log: DebugLog,
}

impl SessionState {
    pub(super) fn apply_roster(&mut self, update: RosterUpdate) -> RosterOutcome {
        self.roster.apply_update(update, now_millis(), &mut self.window)
    }

    fn edit_message(&mut self, id: &str, edit: impl FnOnce(&mut ChatMessage)) {
        if !self.window.replace_message(id, edit) {
            trace!(id, "update for unknown message ignored");
        }
    }
}

impl EventHandlers for SessionState {
    fn lookup_message(&self, id: &str) -> Option<&ChatMessage> {
        self.window.find(id).map(|message| message.as_ref())
    }

    fn has_sequence(&self, pubsub_id: i64) -> bool {
        self.window.contains_sequence(pubsub_id)
    }

    fn acknowledge_pending(
        &mut self,
        id: &str,
        pubsub_id: Option<i64>,
        attachments: Option<Vec<Attachment>>,
    ) {
        self.edit_message(id, |message| {
            message.pending = None;
            if message.pubsub_id.is_none() {
                message.pubsub_id = pubsub_id;
            }
            if let Some(incoming) = attachments {
                merge_attachments(message, incoming);
            }
        });
    }

    fn append_message(&mut self, message: ChatMessage) {
        self.window.push(message);
    }

    fn append_content(&mut self, update: UpdateMessageEvent) {
        let UpdateMessageEvent {
            id,
            content,
            complete,
            content_type,
        } = update;
        self.edit_message(&id, |message| {
            if let Some(delta) = content {
                message.content.push_str(&delta);
            }
            if let Some(complete) = complete {
                message.complete = complete;
            }
            if let Some(content_type) = content_type {
                message.content_type = Some(content_type);
            }
        });
    }

    fn fail_message(&mut self, id: &str, error: String) {
        self.edit_message(id, |message| {
            message.complete = true;
            message.error = Some(error);
        });
    }

    fn complete_message(&mut self, id: &str) {
        self.edit_message(id, |message| message.complete = true);
    }

    fn add_method_record(&mut self, record: MethodCallRecord) {
        self.methods.add_record(record, &mut self.window);
    }

    fn method_result(&mut self, result: MethodResultEvent) {
        self.methods
            .handle_result(result, now_millis(), &mut self.window);
    }

    fn lifecycle_hint(&mut self, payload: &AgentDebugPayload) {
        self.roster.register_lifecycle(payload);
    }

    fn record_debug(&mut self, entry: DebugEntry) {
        self.debug_log.push(entry);
    }

    fn roster_update(&mut self, update: RosterUpdate) {
        self.apply_roster(update);
    }
}

/// Adds attachments the local copy does not already carry (matched by id).
fn merge_attachments(message: &mut ChatMessage, incoming: Vec<Attachment>) {
    let existing = message.attachments.get_or_insert_with(Vec::new);
    for attachment in incoming {
        if !existing.iter().any(|a| a.id == attachment.id) {
            existing.push(attachment);
        }
    }
}
