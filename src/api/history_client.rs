use crate::api::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::state::pagination::{HistoryPage, HistorySource};
use crate::util::is_local_endpoint_url;
use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

/// `GET {base}/messages?before={cursor}&limit={limit}` against a channel
/// history service.
#[derive(Clone)]
pub struct HttpHistorySource {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpHistorySource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    /// `None` when no history service is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .history_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.history_token.clone()))
    }

    pub fn request_url(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }
}

impl HistorySource for HttpHistorySource {
    async fn fetch_messages_before(&self, cursor: i64, limit: usize) -> Result<HistoryPage> {
        let request_url = self.request_url();
        let mut request = self
            .http
            .get(&request_url)
            .query(&[("before", cursor.to_string()), ("limit", limit.to_string())]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|error| map_history_request_error(error, &request_url))?
            .error_for_status()
            .map_err(|error| map_history_request_error(error, &request_url))?;

        let payload: Value = response
            .json()
            .await
            .with_context(|| format!("history response from '{request_url}' was not JSON"))?;
        if debug_payload_enabled() {
            emit_debug_payload(&request_url, &payload);
        }
        decode_history_page(payload)
    }
}

pub fn decode_history_page(payload: Value) -> Result<HistoryPage> {
    if !payload.is_object() {
        bail!("history response must be a JSON object");
    }
    serde_json::from_value(payload).context("history response did not match the page shape")
}

fn map_history_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local history endpoint '{}': {}. Start the service or update PANELFEED_HISTORY_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach history endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("history request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "history endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("history request to '{}' failed: {}", request_url, error)
}
