use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    SendFailed,
    HistoryUnavailable,
}

/// A user-visible, auto-expiring notice. `expires_at` is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DismissibleNotice {
    pub kind: NoticeKind,
    pub text: String,
    pub expires_at: i64,
}

impl DismissibleNotice {
    pub fn is_visible_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }
}
