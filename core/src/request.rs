//! Logical request descriptors.
//!
//! A `RequestDescriptor` is what callers hand to `Facade::call`: a path
//! relative to the configured base URL, a method, an optional payload object,
//! and the two per-call switches.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::HttpMethod;

/// Per-call switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Attach the session token, failing fast when there is none.
    pub need_auth: bool,
    /// Hold the loading indicator for the duration of the call.
    pub show_loading: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            need_auth: true,
            show_loading: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub path: String,
    pub method: HttpMethod,
    pub payload: Option<Map<String, Value>>,
    pub options: RequestOptions,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            payload: None,
            options: RequestOptions::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Attach a payload. It must serialize to a JSON object; `null` clears
    /// the payload.
    pub fn with_payload<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(payload).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.payload = match value {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(ApiError::SerializationError(format!(
                    "payload must be a JSON object, got {other}"
                )))
            }
        };
        Ok(self)
    }

    /// Do not require or attach a session token.
    pub fn public(mut self) -> Self {
        self.options.need_auth = false;
        self
    }

    /// Do not touch the loading indicator.
    pub fn silent(mut self) -> Self {
        self.options.show_loading = false;
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.path.trim().is_empty() {
            return Err(ApiError::InvalidRequest("path must not be empty".to_string()));
        }
        Ok(())
    }
}
