//! Classifies inbound protocol events and routes them to handler callbacks.
//!
//! The dispatcher holds no state: every query and side effect goes through
//! [`EventHandlers`]. An ordered middleware chain may intercept an event
//! before default handling; a middleware that drops its [`Next`] swallows
//! the event.

use crate::state::debug_log::DebugEntry;
use crate::types::{
    AgentDebugPayload, Attachment, ChannelEvent, ChatMessage, EventBody, MessageEvent,
    MethodCallEvent, MethodCallRecord, MethodResultEvent, MethodStatus, ParticipantSnapshot,
    RosterUpdate, SenderMetadata, UpdateMessageEvent,
};
use std::collections::BTreeMap;
use tracing::trace;

/// Callbacks the dispatcher drives. Implemented by the session over its
/// window, method history and roster.
pub trait EventHandlers {
    fn lookup_message(&self, id: &str) -> Option<&ChatMessage>;
    fn has_sequence(&self, pubsub_id: i64) -> bool;
    /// Server echo of a locally authored message.
    fn acknowledge_pending(
        &mut self,
        id: &str,
        pubsub_id: Option<i64>,
        attachments: Option<Vec<Attachment>>,
    );
    fn append_message(&mut self, message: ChatMessage);
    /// Incremental delta: content is appended, never replaced.
    fn append_content(&mut self, update: UpdateMessageEvent);
    fn fail_message(&mut self, id: &str, error: String);
    fn complete_message(&mut self, id: &str);
    fn add_method_record(&mut self, record: MethodCallRecord);
    fn method_result(&mut self, result: MethodResultEvent);
    fn lifecycle_hint(&mut self, payload: &AgentDebugPayload);
    fn record_debug(&mut self, entry: DebugEntry);
    fn roster_update(&mut self, update: RosterUpdate);
}

pub type Participants = BTreeMap<String, ParticipantSnapshot>;

/// Intercepts events ahead of default handling.
pub trait EventMiddleware {
    fn handle(&self, event: ChannelEvent, next: Next<'_>);
}

impl<F> EventMiddleware for F
where
    F: Fn(ChannelEvent, Next<'_>),
{
    fn handle(&self, event: ChannelEvent, next: Next<'_>) {
        self(event, next)
    }
}

pub type Middleware = Box<dyn EventMiddleware + Send + Sync>;

/// Continuation into the rest of the chain. Consumed by value, so it runs at
/// most once.
pub struct Next<'a> {
    rest: &'a [Middleware],
    terminal: &'a mut dyn FnMut(ChannelEvent),
}

impl Next<'_> {
    pub fn run(self, event: ChannelEvent) {
        match self.rest.split_first() {
            Some((first, rest)) => first.handle(
                event,
                Next {
                    rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(event),
        }
    }
}

pub fn dispatch<H>(
    event: ChannelEvent,
    handlers: &mut H,
    self_id: &str,
    known_participants: &Participants,
    middleware: &[Middleware],
) where
    H: EventHandlers + ?Sized,
{
    let mut terminal =
        |event: ChannelEvent| handle_event(event, handlers, self_id, known_participants);
    Next {
        rest: middleware,
        terminal: &mut terminal,
    }
    .run(event);
}

fn handle_event<H>(
    event: ChannelEvent,
    handlers: &mut H,
    self_id: &str,
    known_participants: &Participants,
) where
    H: EventHandlers + ?Sized,
{
    let replay = event.replay;
    match event.body {
        EventBody::Message(message) => {
            handle_message(message, replay, handlers, self_id, known_participants)
        }
        EventBody::UpdateMessage(update) => handlers.append_content(update),
        EventBody::Error(error) => handlers.fail_message(&error.id, error.error),
        EventBody::MethodCall(call) => {
            if call.provider_id == self_id && !replay {
                trace!(call_id = %call.call_id, "skipping self-provided method call");
                return;
            }
            handlers.add_method_record(method_record(call, known_participants));
        }
        EventBody::MethodResult(result) => handlers.method_result(result),
        EventBody::ExecutionPause(pause) => handlers.complete_message(&pause.message_id),
        EventBody::AgentDebug(debug) => {
            handlers.lifecycle_hint(&debug.payload);
            handlers.record_debug(DebugEntry {
                ts: debug.ts,
                payload: debug.payload,
            });
        }
        EventBody::Roster(update) => handlers.roster_update(update),
    }
}

fn handle_message<H>(
    event: MessageEvent,
    replay: bool,
    handlers: &mut H,
    self_id: &str,
    known_participants: &Participants,
) where
    H: EventHandlers + ?Sized,
{
    match handlers.lookup_message(&event.id).map(ChatMessage::is_pending) {
        Some(true) => {
            handlers.acknowledge_pending(&event.id, event.pubsub_id, event.attachments);
            return;
        }
        Some(false) => {
            trace!(id = %event.id, "duplicate message id dropped");
            return;
        }
        None => {}
    }
    if let Some(pubsub_id) = event.pubsub_id {
        if handlers.has_sequence(pubsub_id) {
            trace!(id = %event.id, pubsub_id, "duplicate sequence id dropped");
            return;
        }
    }

    let mut message = ChatMessage::from(event);
    if replay || message.sender_id == self_id {
        message.complete = true;
    }
    if message.sender_metadata.is_none() {
        message.sender_metadata = known_participants
            .get(&message.sender_id)
            .map(|sender| SenderMetadata {
                name: sender.name.clone(),
                participant_type: sender.participant_type,
                handle: Some(sender.handle.clone()),
            });
    }
    handlers.append_message(message);
}

fn method_record(call: MethodCallEvent, known_participants: &Participants) -> MethodCallRecord {
    let description = known_participants
        .get(&call.provider_id)
        .and_then(|provider| provider.method_description(&call.method_name))
        .map(ToString::to_string);
    MethodCallRecord {
        call_id: call.call_id,
        method_name: call.method_name,
        description,
        args: call.args,
        status: MethodStatus::Pending,
        started_at: call.ts,
        provider_id: call.provider_id,
        caller_id: call.sender_id,
        ..MethodCallRecord::default()
    }
}
