//! Stateless HTTP request builder and response parser for the backend.
//!
//! # Design
//! `ApiClient` holds only the base URL and the token header name and carries
//! no mutable state between calls. `build_request` produces an `HttpRequest`
//! from a descriptor plus an optional token, and `parse_response` consumes an
//! `HttpResponse` and unwraps the envelope. The facade runs the transport in
//! between and owns every side effect.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::request::RequestDescriptor;

/// Transport status the backend uses for every answered call.
pub const HTTP_OK: u16 = 200;

pub const DEFAULT_TOKEN_HEADER: &str = "token";

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token_header: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_token_header(base_url, DEFAULT_TOKEN_HEADER)
    }

    pub fn with_token_header(base_url: &str, token_header: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token_header: token_header.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        descriptor.validate()?;

        let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
        if let Some(token) = token {
            headers.push((self.token_header.clone(), token.to_string()));
        }

        let (query, body) = if descriptor.method.payload_in_query() {
            (query_pairs(descriptor.payload.as_ref()), None)
        } else {
            let payload = descriptor.payload.clone().unwrap_or_default();
            let body = serde_json::to_string(&Value::Object(payload))
                .map_err(|e| ApiError::SerializationError(e.to_string()))?;
            (Vec::new(), Some(body))
        };

        Ok(HttpRequest {
            method: descriptor.method,
            url: format!("{}{}", self.base_url, descriptor.path),
            query,
            headers,
            body,
        })
    }

    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        if response.status != HTTP_OK {
            return Err(ApiError::HttpError {
                status: response.status,
                body: response.body,
            });
        }

        let envelope: Envelope = serde_json::from_str(&response.body)
            .map_err(|e| ApiError::DeserializationError(e.to_string()))?;

        if envelope.is_success() {
            Ok(envelope.into_payload())
        } else if envelope.is_session_expired() {
            Err(ApiError::SessionExpired)
        } else {
            Err(ApiError::BusinessError {
                code: envelope.code,
                msg: envelope.msg.filter(|m| !m.is_empty()),
            })
        }
    }
}

/// Decode an unwrapped payload into a typed value.
pub fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Flatten a payload object into query pairs. Nulls are dropped; nested values
/// are sent as their JSON text.
fn query_pairs(payload: Option<&Map<String, Value>>) -> Vec<(String, String)> {
    let Some(payload) = payload else {
        return Vec::new();
    };
    payload
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                nested => nested.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use serde_json::json;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:9999/api/v1")
    }

    #[test]
    fn build_get_puts_payload_in_query() {
        let d = RequestDescriptor::get("/wxapp/home")
            .with_payload(&json!({"q": "tools", "page": 2, "category_id": null, "hot": true}))
            .unwrap();
        let req = client().build_request(&d, None).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:9999/api/v1/wxapp/home");
        assert!(req.body.is_none());
        let mut query = req.query.clone();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("hot".to_string(), "true".to_string()),
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "tools".to_string()),
            ]
        );
    }

    #[test]
    fn build_post_serializes_body_and_attaches_token() {
        let d = RequestDescriptor::post("/wxapp/favorite/toggle")
            .with_payload(&json!({"app_id": 7, "value": true}))
            .unwrap();
        let req = client().build_request(&d, Some("abc")).unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("token"), Some("abc"));
        assert!(req.query.is_empty());
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"app_id": 7, "value": true}));
    }

    #[test]
    fn build_post_without_payload_sends_empty_object() {
        let req = client()
            .build_request(&RequestDescriptor::post("/x"), None)
            .unwrap();
        assert_eq!(req.body.as_deref(), Some("{}"));
        assert!(req.header("token").is_none());
    }

    #[test]
    fn custom_token_header_is_used() {
        let client = ApiClient::with_token_header("http://h", "Authorization");
        let req = client
            .build_request(&RequestDescriptor::get("/x"), Some("t"))
            .unwrap();
        assert_eq!(req.header("authorization"), Some("t"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = ApiClient::new("http://localhost:9999/api/v1/");
        let req = client
            .build_request(&RequestDescriptor::get("/wxapp/list"), None)
            .unwrap();
        assert_eq!(req.url, "http://localhost:9999/api/v1/wxapp/list");
    }

    #[test]
    fn build_rejects_empty_path() {
        let err = client()
            .build_request(&RequestDescriptor::get(""), None)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn parse_success_unwraps_data() {
        let payload = client()
            .parse_response(HttpResponse::new(200, r#"{"code":200,"data":{"x":1},"msg":"OK"}"#))
            .unwrap();
        assert_eq!(payload, json!({"x": 1}));
    }

    #[test]
    fn parse_session_expired() {
        let err = client()
            .parse_response(HttpResponse::new(200, r#"{"code":401,"msg":"expired"}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
    }

    #[test]
    fn parse_business_error_keeps_message() {
        let err = client()
            .parse_response(HttpResponse::new(200, r#"{"code":500,"msg":"boom"}"#))
            .unwrap_err();
        match err {
            ApiError::BusinessError { code, msg } => {
                assert_eq!(code, 500);
                assert_eq!(msg.as_deref(), Some("boom"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_business_error_drops_empty_message() {
        let err = client()
            .parse_response(HttpResponse::new(200, r#"{"code":400,"msg":""}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::BusinessError { code: 400, msg: None }));
    }

    #[test]
    fn parse_non_200_status_is_http_error() {
        let err = client()
            .parse_response(HttpResponse::new(404, ""))
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 404, .. }));
    }

    #[test]
    fn parse_status_wins_over_envelope() {
        let err = client()
            .parse_response(HttpResponse::new(401, r#"{"code":401,"msg":"expired"}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::HttpError { status: 401, .. }));
    }

    #[test]
    fn parse_bad_json() {
        let err = client()
            .parse_response(HttpResponse::new(200, "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn decode_reports_type_mismatch() {
        let err = decode::<Vec<u32>>(json!({"x": 1})).unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
