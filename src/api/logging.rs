use crate::util::parse_bool_str;
use serde_json::Value;
use tracing::{debug, warn};

const DEBUG_PAYLOAD_ENV: &str = "PANELFEED_DEBUG_PAYLOAD";
const MAX_LOGGED_LINE_CHARS: usize = 512;

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    debug!(
        target: "panelfeed::payload",
        url = request_url,
        "history response payload:\n{formatted_payload}"
    );
}

pub fn emit_event_parse_error(line_number: usize, line: &str, parse_error: &serde_json::Error) {
    warn!(
        line_number,
        error = %parse_error,
        data = %clip(line),
        "skipping malformed event line"
    );
}

fn clip(line: &str) -> &str {
    match line.char_indices().nth(MAX_LOGGED_LINE_CHARS) {
        Some((end, _)) => &line[..end],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "nope");
        assert!(!debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
        assert!(!debug_payload_enabled());
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        let long = "é".repeat(MAX_LOGGED_LINE_CHARS + 10);
        assert_eq!(clip(&long).chars().count(), MAX_LOGGED_LINE_CHARS);
        assert_eq!(clip("short"), "short");
    }
}
