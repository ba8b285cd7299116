use super::window::MessageWindow;
use crate::types::{
    ChatMessage, MethodCallRecord, MethodRecordPatch, MethodResultEvent, MethodStatus,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

const UNKNOWN_METHOD_ERROR: &str = "Method call failed";

/// Call records keyed by call id, with size-capped eviction of finished calls.
#[derive(Debug, Clone)]
pub struct MethodHistory {
    entries: HashMap<String, MethodCallRecord>,
    max_entries: usize,
    revision: u64,
}

impl MethodHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            revision: 0,
        }
    }

    pub fn entries(&self) -> &HashMap<String, MethodCallRecord> {
        &self.entries
    }

    pub fn get(&self, call_id: &str) -> Option<&MethodCallRecord> {
        self.entries.get(call_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add_record(&mut self, record: MethodCallRecord, window: &mut MessageWindow) {
        if let Some(existing) = self.entries.get_mut(&record.call_id) {
            if existing.status.is_terminal() {
                trace!(call_id = %record.call_id, "ignoring duplicate of finished method record");
                return;
            }
            trace!(call_id = %record.call_id, "merging duplicate method record");
            existing.merge_from(record);
            self.revision += 1;
            return;
        }

        self.revision += 1;

        let placeholder = ChatMessage::method_placeholder(&record.call_id, &record.caller_id);
        self.entries.insert(record.call_id.clone(), record);
        window.push(placeholder);
        self.prune(window);
    }

    /// Shallow-merges `patch` into an existing, still-pending record.
    pub fn update_record(
        &mut self,
        call_id: &str,
        patch: MethodRecordPatch,
        window: &mut MessageWindow,
    ) -> bool {
        let Some(record) = self.entries.get_mut(call_id) else {
            return false;
        };
        if record.status.is_terminal() {
            trace!(call_id, "ignoring patch for finished method record");
            return false;
        }
        record.apply_patch(patch);
        let finished = record.status.is_terminal();
        self.revision += 1;
        if finished {
            self.prune(window);
        }
        true
    }

    pub fn handle_result(
        &mut self,
        result: MethodResultEvent,
        now_ms: i64,
        window: &mut MessageWindow,
    ) {
        let Some(record) = self.entries.get_mut(&result.call_id) else {
            debug!(call_id = %result.call_id, "result for unknown method call");
            return;
        };
        if record.status.is_terminal() {
            trace!(call_id = %result.call_id, "result after completion ignored");
            return;
        }

        let mut changed = false;
        if let Some(progress) = result.progress {
            record.progress = Some(progress);
            changed = true;
        }

        if let Some(chunk) = console_chunk_text(&result.content) {
            if !(record.handled_locally && !record.console_output.is_empty()) {
                record.console_output.push_str(chunk);
                changed = true;
            }
        } else if result.complete {
            if result.is_error {
                record.status = MethodStatus::Error;
                record.error = Some(error_text(&result.content));
            } else {
                record.status = MethodStatus::Success;
                record.result = Some(result.content);
            }
            record.completed_at = Some(now_ms);
            changed = true;
        }

        if !changed {
            return;
        }
        let finished = record.status.is_terminal();
        self.revision += 1;
        if finished {
            self.prune(window);
        }
    }

    /// Evicts the oldest finished records once the table passes 80% of the cap,
    /// down to 70%. Pending records are never evicted.
    fn prune(&mut self, window: &mut MessageWindow) {
        let len = self.entries.len();
        if len * 10 <= self.max_entries * 8 {
            return;
        }
        let target = self.max_entries * 7 / 10;
        let excess = len.saturating_sub(target);

        let mut finished: Vec<(&String, i64)> = self
            .entries
            .iter()
            .filter(|(_, record)| record.status.is_terminal())
            .map(|(id, record)| (id, record.started_at))
            .collect();
        finished.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let evicted: HashSet<String> = finished
            .into_iter()
            .take(excess)
            .map(|(id, _)| id.clone())
            .collect();
        if evicted.is_empty() {
            return;
        }

        self.entries.retain(|id, _| !evicted.contains(id));
        window.remove_where(|m| {
            m.method_call_id()
                .is_some_and(|call_id| evicted.contains(call_id))
        });
        self.revision += 1;
        debug!(
            evicted = evicted.len(),
            remaining = self.entries.len(),
            "pruned method history"
        );
    }
}

/// Text of a structured console-output chunk, if `content` is one.
pub fn console_chunk_text(content: &Value) -> Option<&str> {
    let object = content.as_object()?;
    if object.get("type").and_then(Value::as_str) != Some("console") {
        return None;
    }
    object
        .get("content")
        .or_else(|| object.get("output"))
        .and_then(Value::as_str)
}

fn error_text(content: &Value) -> String {
    if let Some(text) = content.as_str() {
        return text.to_string();
    }
    content
        .get("error")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| UNKNOWN_METHOD_ERROR.to_string())
}
