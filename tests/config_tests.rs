use panelfeed::config::{Config, DEFAULT_PAGE_SIZE, DEFAULT_VISIBLE_CAP};
use std::time::Duration;

fn config(self_id: &str) -> Config {
    Config {
        self_id: self_id.to_string(),
        visible_cap: DEFAULT_VISIBLE_CAP,
        page_size: DEFAULT_PAGE_SIZE,
        max_method_entries: 200,
        typing_quiet_ms: 1_500,
        notice_ttl_ms: 5_000,
        history_url: None,
        history_token: None,
    }
}

#[test]
fn test_config_validation_requires_local_participant() {
    assert!(config("").validate().is_err());
    assert!(config("   ").validate().is_err());
    assert!(config("panel-1").validate().is_ok());
}

#[test]
fn test_config_validation_rejects_non_http_history_url() {
    let mut cfg = config("panel-1");
    cfg.history_url = Some("ftp://history.example/messages".to_string());
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("PANELFEED_HISTORY_URL"));

    cfg.history_url = Some("https://history.example/api".to_string());
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_config_validation_rejects_token_without_url() {
    let mut cfg = config("panel-1");
    cfg.history_token = Some("secret".to_string());
    assert!(cfg.validate().is_err());

    cfg.history_url = Some("http://localhost:8080".to_string());
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_session_config_carries_tuning() {
    let session = config("panel-1").session_config();
    assert_eq!(session.self_id, "panel-1");
    assert_eq!(session.visible_cap, DEFAULT_VISIBLE_CAP);
    assert_eq!(session.page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(session.typing_quiet, Duration::from_millis(1_500));
    assert_eq!(session.notice_ttl, Duration::from_secs(5));
}
