//! The backend's uniform response wrapper.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Business code for a successful call.
pub const SUCCESS_CODE: i64 = 200;

/// Business code for an expired or invalid session token.
pub const SESSION_EXPIRED_CODE: i64 = 401;

/// `{code, data, msg}` as returned by every backend route.
///
/// The backend mirrors the payload under `result` as well; `data` wins when
/// both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    pub fn is_session_expired(&self) -> bool {
        self.code == SESSION_EXPIRED_CODE
    }

    /// Take the payload out of the envelope.
    pub fn into_payload(self) -> Value {
        match (self.data, self.result) {
            (Value::Null, Some(result)) => result,
            (data, _) => data,
        }
    }
}
