use super::handlers::SessionState;
use super::outbound::OutboundSink;
use crate::config::{
    DEFAULT_MAX_METHOD_ENTRIES, DEFAULT_NOTICE_TTL_MS, DEFAULT_PAGE_SIZE, DEFAULT_VISIBLE_CAP,
};
use crate::dispatch::{dispatch, EventMiddleware, Middleware};
use crate::state::debug_log::{DebugEntry, DebugLog, DEFAULT_DEBUG_LOG_CAPACITY};
use crate::state::grouping::{GroupedItem, GroupingMemo, RecomputePath};
use crate::state::method_history::MethodHistory;
use crate::state::pagination::{
    fetch_until_messages, FetchedHistory, HistorySource, PaginationGuard, PaginationTicket,
};
use crate::state::roster::{RosterOutcome, RosterTracker, SenderView};
use crate::state::typing::{TypingController, DEFAULT_TYPING_QUIET};
use crate::state::window::MessageWindow;
use crate::types::{
    now_millis, Attachment, ChannelEvent, ChatMessage, DismissibleNotice, EventBody,
    MessageEvent, MethodCallRecord, MethodRecordPatch, NoticeKind, ParticipantSnapshot,
    RosterUpdate,
};
use anyhow::Result;
use futures::{Stream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub self_id: String,
    pub visible_cap: usize,
    pub page_size: usize,
    pub max_method_entries: usize,
    pub typing_quiet: Duration,
    pub notice_ttl: Duration,
    pub debug_log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            self_id: String::new(),
            visible_cap: DEFAULT_VISIBLE_CAP,
            page_size: DEFAULT_PAGE_SIZE,
            max_method_entries: DEFAULT_MAX_METHOD_ENTRIES,
            typing_quiet: DEFAULT_TYPING_QUIET,
            notice_ttl: Duration::from_millis(DEFAULT_NOTICE_TTL_MS as u64),
            debug_log_capacity: DEFAULT_DEBUG_LOG_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn for_participant(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            ..Self::default()
        }
    }
}

/// One channel connection: owns every component, routes inbound events
/// through the dispatcher one at a time, and exposes the render surface.
pub struct ChannelSession {
    config: SessionConfig,
    state: SessionState,
    memo: GroupingMemo,
    pagination: PaginationGuard,
    middleware: Vec<Middleware>,
    notice: Option<DismissibleNotice>,
    typing: Option<TypingController>,
}

impl ChannelSession {
    pub fn new(config: SessionConfig) -> Self {
        let state = SessionState {
            window: MessageWindow::new(config.visible_cap),
            methods: MethodHistory::new(config.max_method_entries),
            roster: RosterTracker::new(config.self_id.clone()),
            debug_log: DebugLog::new(config.debug_log_capacity),
        };
        Self {
            config,
            state,
            memo: GroupingMemo::new(),
            pagination: PaginationGuard::new(),
            middleware: Vec::new(),
            notice: None,
            typing: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn self_id(&self) -> &str {
        &self.config.self_id
    }

    /// Appends to the middleware chain; earlier middleware runs first.
    pub fn add_middleware<M>(&mut self, middleware: M)
    where
        M: EventMiddleware + Send + Sync + 'static,
    {
        self.middleware.push(Box::new(middleware));
    }

    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: EventMiddleware + Send + Sync + 'static,
    {
        self.add_middleware(middleware);
        self
    }

    pub fn join(&mut self) {
        info!(self_id = %self.config.self_id, "joining channel");
        self.state.roster.begin_join();
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        let known = self.state.roster.participants();
        dispatch(
            event,
            &mut self.state,
            &self.config.self_id,
            &known,
            &self.middleware,
        );
    }

    /// Roster delivered outside the event feed.
    pub fn apply_roster(&mut self, update: RosterUpdate) -> RosterOutcome {
        self.state.apply_roster(update)
    }

    /// Drains `events` in order, each handled to completion before the next.
    /// Returns how many were processed.
    pub async fn run<S>(&mut self, events: S) -> usize
    where
        S: Stream<Item = ChannelEvent>,
    {
        let mut events = std::pin::pin!(events);
        let mut processed = 0;
        while let Some(event) = events.next().await {
            self.handle_event(event);
            processed += 1;
        }
        debug!(processed, "event stream ended");
        processed
    }

    pub fn on_reconnect(&mut self) -> usize {
        self.state.roster.on_reconnect(&mut self.state.window)
    }

    /// Disconnect/unmount: refuses late pagination results and stops the
    /// typing debounce task.
    pub fn unmount(&mut self) {
        self.pagination.cancel();
        if self.typing.take().is_some() {
            debug!("typing controller stopped");
        }
    }

    // Render surface.

    pub fn grouped(&mut self) -> &[GroupedItem] {
        self.memo.compute(
            self.state.window.messages(),
            self.state.methods.entries(),
            self.state.methods.revision(),
        )
    }

    pub fn last_grouping_path(&self) -> Option<RecomputePath> {
        self.memo.last_path()
    }

    pub fn window(&self) -> &MessageWindow {
        &self.state.window
    }

    pub fn messages(&self) -> &[Arc<ChatMessage>] {
        self.state.window.messages()
    }

    pub fn has_more_history(&self) -> bool {
        self.state.window.has_more_history()
    }

    pub fn method_entries(&self) -> &HashMap<String, MethodCallRecord> {
        self.state.methods.entries()
    }

    /// Local handling of a call (e.g. a tool run in-process).
    pub fn update_method(&mut self, call_id: &str, patch: MethodRecordPatch) -> bool {
        self.state
            .methods
            .update_record(call_id, patch, &mut self.state.window)
    }

    pub fn debug_entries(&self) -> impl Iterator<Item = &DebugEntry> {
        self.state.debug_log.iter()
    }

    pub fn participants(&self) -> Arc<BTreeMap<String, ParticipantSnapshot>> {
        self.state.roster.participants()
    }

    pub fn roster(&self) -> &RosterTracker {
        &self.state.roster
    }

    pub fn resolve_sender(&self, message: &ChatMessage) -> Option<SenderView> {
        self.state.roster.resolve_sender(message)
    }

    pub fn visible_notice(&self, now_ms: i64) -> Option<&DismissibleNotice> {
        self.notice
            .as_ref()
            .filter(|notice| notice.is_visible_at(now_ms))
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    fn raise_notice(&mut self, kind: NoticeKind, text: String) {
        let ttl_ms = i64::try_from(self.config.notice_ttl.as_millis()).unwrap_or(i64::MAX);
        self.notice = Some(DismissibleNotice {
            kind,
            text,
            expires_at: now_millis().saturating_add(ttl_ms),
        });
    }

    // Pagination.

    /// Hands out a ticket for the next older page, or `None` when history is
    /// exhausted or a fetch is already in flight.
    pub fn begin_load_earlier(&mut self) -> Option<PaginationTicket> {
        if !self.state.window.has_more_history() {
            return None;
        }
        let cursor = self.state.window.state().oldest_loaded_cursor?;
        let ticket = self.pagination.try_begin(cursor, self.config.page_size);
        if ticket.is_none() {
            debug!(cursor, "pagination already in flight");
        }
        ticket
    }

    /// Applies a fetch result atomically. Results for cancelled tickets are
    /// dropped; failures leave the window untouched and are returned.
    pub fn complete_load_earlier(
        &mut self,
        ticket: PaginationTicket,
        result: Result<FetchedHistory>,
    ) -> Result<usize> {
        if !self.pagination.finish(&ticket) {
            debug!(cursor = ticket.cursor, "discarding stale pagination result");
            return Ok(0);
        }
        match result {
            Ok(fetched) => Ok(self.state.window.prepend(
                fetched.messages,
                fetched.next_cursor,
                fetched.exhausted,
            )),
            Err(error) => {
                warn!(cursor = ticket.cursor, error = %error, "loading earlier history failed");
                self.raise_notice(
                    NoticeKind::HistoryUnavailable,
                    "Could not load earlier messages".to_string(),
                );
                Err(error)
            }
        }
    }

    pub async fn load_earlier<S>(&mut self, source: &S) -> Result<usize>
    where
        S: HistorySource + ?Sized,
    {
        let Some(ticket) = self.begin_load_earlier() else {
            return Ok(0);
        };
        let result = fetch_until_messages(source, ticket.cursor, ticket.page_size).await;
        self.complete_load_earlier(ticket, result)
    }

    // Local authoring.

    /// Appends an optimistic pending message and publishes it. On failure the
    /// optimistic copy is withdrawn and a send-failed notice is raised.
    pub async fn send_message<O>(
        &mut self,
        content: impl Into<String>,
        attachments: Option<Vec<Attachment>>,
        sink: &O,
    ) -> Result<String>
    where
        O: OutboundSink + ?Sized,
    {
        let id = Uuid::new_v4().to_string();
        let content = content.into();
        let mut local = ChatMessage::text(id.clone(), self.config.self_id.clone(), content.clone());
        local.complete = true;
        local.pending = Some(true);
        local.attachments = attachments.clone();
        self.state.window.push(local);

        let event = ChannelEvent::live(EventBody::Message(MessageEvent {
            id: id.clone(),
            sender_id: self.config.self_id.clone(),
            content,
            complete: true,
            attachments,
            ..MessageEvent::default()
        }));

        if let Err(error) = sink.publish(event).await {
            warn!(id = %id, error = %error, "send failed");
            self.state.window.remove_where(|m| m.id == id);
            self.raise_notice(NoticeKind::SendFailed, format!("Message not sent: {error}"));
            return Err(error);
        }
        Ok(id)
    }

    /// Starts the typing debounce task, publishing start/stop signals on
    /// `outbound`. Replaces any previous controller.
    pub fn attach_typing(&mut self, outbound: mpsc::UnboundedSender<ChannelEvent>) {
        self.typing = Some(TypingController::spawn(
            outbound,
            self.config.self_id.clone(),
            self.config.typing_quiet,
        ));
    }

    /// Returns false when no typing controller is attached.
    pub fn input_changed(&self, text: &str) -> bool {
        self.typing
            .as_ref()
            .is_some_and(|typing| typing.input_changed(text))
    }
}
