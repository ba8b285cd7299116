use crate::types::{ChannelEvent, ChatMessage, EventBody};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, trace};

/// Fetch capability over persisted channel history.
pub trait HistorySource: Send + Sync {
    /// Events strictly older than `cursor`, newest page first.
    fn fetch_messages_before(
        &self,
        cursor: i64,
        limit: usize,
    ) -> impl Future<Output = Result<HistoryPage>> + Send;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<OrderedEvent>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderedEvent {
    pub sequence_id: i64,
    pub event: ChannelEvent,
}

impl OrderedEvent {
    /// Persisted `message` events as replayed, complete window records.
    /// Every other event type yields `None`.
    pub fn into_history_message(self) -> Option<ChatMessage> {
        let EventBody::Message(event) = self.event.body else {
            return None;
        };
        let mut message = ChatMessage::from(event);
        message.pubsub_id = Some(message.pubsub_id.unwrap_or(self.sequence_id));
        message.complete = true;
        message.pending = None;
        Some(message)
    }
}

/// Result of one pagination loop, ready for `MessageWindow::prepend`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedHistory {
    pub messages: Vec<ChatMessage>,
    pub next_cursor: Option<i64>,
    pub exhausted: bool,
    pub pages: usize,
}

/// Requests pages backwards from `cursor` until one yields a message, the
/// source reports no more history, or the cursor stops moving backwards.
/// A page without `next_cursor` continues from its oldest sequence id.
pub async fn fetch_until_messages<S>(
    source: &S,
    cursor: i64,
    page_size: usize,
) -> Result<FetchedHistory>
where
    S: HistorySource + ?Sized,
{
    let mut cursor = cursor;
    let mut pages = 0;
    loop {
        let page = source
            .fetch_messages_before(cursor, page_size)
            .await
            .with_context(|| format!("failed to fetch history before cursor {cursor}"))?;
        pages += 1;

        let has_more = page.has_more;
        let advancing = page
            .next_cursor
            .or_else(|| page.messages.iter().map(|entry| entry.sequence_id).min())
            .filter(|next| *next < cursor);
        let messages: Vec<ChatMessage> = page
            .messages
            .into_iter()
            .filter_map(OrderedEvent::into_history_message)
            .collect();
        trace!(cursor, pages, found = messages.len(), has_more, "history page");

        match advancing {
            Some(next) if has_more && messages.is_empty() => cursor = next,
            _ => {
                if has_more && advancing.is_none() {
                    debug!(cursor, next = ?page.next_cursor, "history cursor did not advance");
                }
                return Ok(FetchedHistory {
                    messages,
                    next_cursor: advancing.or(Some(cursor)),
                    exhausted: !has_more || advancing.is_none(),
                    pages,
                });
            }
        }
    }
}

/// Snapshot handed to an in-flight fetch; completion is only applied while
/// the guard still recognises it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationTicket {
    pub cursor: i64,
    pub page_size: usize,
    generation: u64,
}

/// Allows one pagination fetch at a time. Concurrent requests are refused,
/// not queued.
#[derive(Debug, Default)]
pub struct PaginationGuard {
    in_flight: Option<u64>,
    generation: u64,
}

impl PaginationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn try_begin(&mut self, cursor: i64, page_size: usize) -> Option<PaginationTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        self.generation += 1;
        self.in_flight = Some(self.generation);
        Some(PaginationTicket {
            cursor,
            page_size,
            generation: self.generation,
        })
    }

    /// Releases the guard. Returns false for a ticket that was cancelled or
    /// superseded; its result must be dropped.
    pub fn finish(&mut self, ticket: &PaginationTicket) -> bool {
        if self.in_flight != Some(ticket.generation) {
            return false;
        }
        self.in_flight = None;
        true
    }

    pub fn cancel(&mut self) {
        self.in_flight = None;
        self.generation += 1;
    }
}
