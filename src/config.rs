use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::session::SessionConfig;
use crate::state::debug_log::DEFAULT_DEBUG_LOG_CAPACITY;
use crate::util::{env_override_usize, non_empty_env};

pub const DEFAULT_VISIBLE_CAP: usize = 200;
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_MAX_METHOD_ENTRIES: usize = 200;
pub const DEFAULT_TYPING_QUIET_MS: usize = 2_000;
pub const DEFAULT_NOTICE_TTL_MS: usize = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub self_id: String,
    pub visible_cap: usize,
    pub page_size: usize,
    pub max_method_entries: usize,
    pub typing_quiet_ms: usize,
    pub notice_ttl_ms: usize,
    pub history_url: Option<String>,
    pub history_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            self_id: non_empty_env("PANELFEED_SELF_ID").unwrap_or_default(),
            visible_cap: env_override_usize(
                "PANELFEED_VISIBLE_CAP",
                DEFAULT_VISIBLE_CAP,
                4,
                5_000,
            ),
            page_size: env_override_usize("PANELFEED_PAGE_SIZE", DEFAULT_PAGE_SIZE, 1, 500),
            max_method_entries: env_override_usize(
                "PANELFEED_MAX_METHOD_ENTRIES",
                DEFAULT_MAX_METHOD_ENTRIES,
                10,
                10_000,
            ),
            typing_quiet_ms: env_override_usize(
                "PANELFEED_TYPING_QUIET_MS",
                DEFAULT_TYPING_QUIET_MS,
                250,
                30_000,
            ),
            notice_ttl_ms: env_override_usize(
                "PANELFEED_NOTICE_TTL_MS",
                DEFAULT_NOTICE_TTL_MS,
                500,
                60_000,
            ),
            history_url: non_empty_env("PANELFEED_HISTORY_URL"),
            history_token: non_empty_env("PANELFEED_HISTORY_TOKEN"),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.self_id.trim().is_empty() {
            bail!("PANELFEED_SELF_ID must be set to the local participant id");
        }

        if let Some(url) = &self.history_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!(
                    "Invalid PANELFEED_HISTORY_URL '{}': expected http:// or https:// URL",
                    url
                );
            }
        }

        if self.history_token.is_some() && self.history_url.is_none() {
            bail!("PANELFEED_HISTORY_TOKEN is set but PANELFEED_HISTORY_URL is not");
        }

        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            self_id: self.self_id.clone(),
            visible_cap: self.visible_cap,
            page_size: self.page_size,
            max_method_entries: self.max_method_entries,
            typing_quiet: Duration::from_millis(self.typing_quiet_ms as u64),
            notice_ttl: Duration::from_millis(self.notice_ttl_ms as u64),
            debug_log_capacity: DEFAULT_DEBUG_LOG_CAPACITY,
        }
    }
}
