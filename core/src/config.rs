//! Client configuration.
//!
//! Loaded from JSON or from `WXAPP_*` environment variables layered over the
//! defaults. Every field has a default, so an empty object is a valid config.

use std::time::Duration;

use serde::Deserialize;

use crate::client::DEFAULT_TOKEN_HEADER;
use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:9999/api/v1";
pub const DEFAULT_LOGIN_ROUTE: &str = "/pages/login/login";
pub const DEFAULT_REDIRECT_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub token_header: String,
    pub login_route: String,
    pub redirect_delay_ms: u64,
    pub messages: Messages,
}

/// User-visible texts. One of these is shown for every failed call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub loading: String,
    pub not_logged_in: String,
    pub network_failure: String,
    /// Prefix for non-200 statuses; the status code is appended.
    pub http_failure: String,
    pub session_expired: String,
    /// Shown when a business error has no message, and for local failures.
    pub request_failed: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            redirect_delay_ms: DEFAULT_REDIRECT_DELAY_MS,
            messages: Messages::default(),
        }
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            loading: "Loading...".to_string(),
            not_logged_in: "Please log in first".to_string(),
            network_failure: "Network request failed".to_string(),
            http_failure: "Request failed".to_string(),
            session_expired: "Session expired, please log in again".to_string(),
            request_failed: "Request failed".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ApiError> {
        serde_json::from_str(raw).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    /// Defaults overridden by `WXAPP_BASE_URL`, `WXAPP_TOKEN_HEADER`,
    /// `WXAPP_LOGIN_ROUTE` and `WXAPP_REDIRECT_DELAY_MS`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();
        if let Some(v) = lookup("WXAPP_BASE_URL") {
            config.base_url = v;
        }
        if let Some(v) = lookup("WXAPP_TOKEN_HEADER") {
            config.token_header = v;
        }
        if let Some(v) = lookup("WXAPP_LOGIN_ROUTE") {
            config.login_route = v;
        }
        if let Some(v) = lookup("WXAPP_REDIRECT_DELAY_MS") {
            config.redirect_delay_ms = v.parse().map_err(|_| {
                ApiError::InvalidRequest(format!("WXAPP_REDIRECT_DELAY_MS is not a number: {v}"))
            })?;
        }
        Ok(config)
    }
}
