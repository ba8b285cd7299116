use crate::state::pagination::{HistoryPage, HistorySource};
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Scripted history source: hands out queued pages in order and records every
/// `(cursor, limit)` request.
#[derive(Clone, Default)]
pub struct MockHistorySource {
    pages: Arc<Mutex<VecDeque<Result<HistoryPage, String>>>>,
    requests: Arc<Mutex<Vec<(i64, usize)>>>,
}

impl MockHistorySource {
    pub fn new(pages: Vec<HistoryPage>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages.into_iter().map(Ok).collect())),
            requests: Arc::default(),
        }
    }

    /// Queues a failure for the next request.
    pub fn push_error(&self, message: impl Into<String>) {
        lock(&self.pages).push_back(Err(message.into()));
    }

    pub fn push_page(&self, page: HistoryPage) {
        lock(&self.pages).push_back(Ok(page));
    }

    pub fn requests(&self) -> Vec<(i64, usize)> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.pages).len()
    }
}

impl HistorySource for MockHistorySource {
    async fn fetch_messages_before(&self, cursor: i64, limit: usize) -> Result<HistoryPage> {
        lock(&self.requests).push((cursor, limit));
        match lock(&self.pages).pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("MockHistorySource: no more pages configured")),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
