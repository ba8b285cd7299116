use crate::api::logging::emit_event_parse_error;
use crate::types::ChannelEvent;
use anyhow::{Context, Result};
use std::path::Path;

/// Incremental decoder for newline-delimited event feeds. Chunks may split
/// lines (or UTF-8 sequences) anywhere; SSE-style `data: ` framing is
/// tolerated and malformed lines are skipped.
#[derive(Default)]
pub struct EventLogParser {
    buffer: Vec<u8>,
    line_number: usize,
}

impl EventLogParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<ChannelEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        let mut start = 0;

        while let Some(end) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let line_end = start + end;
            let line = String::from_utf8_lossy(&self.buffer[start..line_end]).into_owned();
            self.line_number += 1;
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
            start = line_end + 1;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        events
    }

    /// Decodes a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Vec<ChannelEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        self.buffer.push(b'\n');
        self.process(&[])
    }

    fn decode_line(&self, raw: &str) -> Option<ChannelEvent> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
            return None;
        }
        let json_data = line
            .strip_prefix("data:")
            .map(str::trim_start)
            .unwrap_or(line);
        if json_data == "[DONE]" {
            return None;
        }

        match serde_json::from_str::<ChannelEvent>(json_data) {
            Ok(event) => Some(event),
            Err(e) => {
                emit_event_parse_error(self.line_number, json_data, &e);
                None
            }
        }
    }
}

pub async fn read_event_log(path: impl AsRef<Path>) -> Result<Vec<ChannelEvent>> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read event log {}", path.display()))?;
    let mut parser = EventLogParser::new();
    let mut events = parser.process(&bytes);
    events.extend(parser.finish());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventBody;

    const MESSAGE_LINE: &str =
        r#"{"type":"message","id":"m1","senderId":"agent","content":"héllo","pubsubId":1}"#;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut parser = EventLogParser::new();
        let line = format!("{MESSAGE_LINE}\n");
        let bytes = line.as_bytes();
        // Split inside the two-byte 'é'.
        let split = line.find('é').unwrap() + 1;

        assert!(parser.process(&bytes[..split]).is_empty());
        let events = parser.process(&bytes[split..]);
        assert_eq!(events.len(), 1);
        match &events[0].body {
            EventBody::Message(message) => assert_eq!(message.content, "héllo"),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn test_sse_framing_and_noise_are_skipped() {
        let mut parser = EventLogParser::new();
        let feed = format!(
            ": keep-alive\nevent: message\ndata: {MESSAGE_LINE}\n\nnot json\ndata: [DONE]\n"
        );
        let events = parser.process(feed.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].type_name(), "message");
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut parser = EventLogParser::new();
        let update = r#"{"type":"update-message","id":"m1","content":" more"}"#;
        assert!(parser.process(update.as_bytes()).is_empty());
        let events = parser.finish();
        assert_eq!(events.len(), 1);
        assert!(parser.finish().is_empty());
    }
}
