use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::client::TransportResponse;
use crate::utils::{GatewayError, Result as GatewayResult};

/// Successful result of a dispatch. `Empty` is a response without content and
/// is distinct from an empty JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Json(Map<String, Value>),
    Empty,
}

impl DispatchOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, DispatchOutcome::Empty)
    }

    pub fn as_json(&self) -> Option<&Map<String, Value>> {
        match self {
            DispatchOutcome::Json(map) => Some(map),
            DispatchOutcome::Empty => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            DispatchOutcome::Json(map) => Some(Value::Object(map)),
            DispatchOutcome::Empty => None,
        }
    }
}

impl From<Value> for DispatchOutcome {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => DispatchOutcome::Json(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                DispatchOutcome::Json(map)
            }
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..400).contains(&status)
}

fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_string()
}

/// Maps a transport response onto the uniform success or error shape.
pub fn normalize(response: TransportResponse) -> GatewayResult<DispatchOutcome> {
    let text = response.text();

    if !is_success(response.status) {
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(json) => Some(json.to_string()),
            Err(_) if text.is_empty() => None,
            Err(_) => Some(text),
        };
        return Err(GatewayError::HttpStatus {
            status: response.status,
            reason: reason_phrase(response.status),
            body,
        });
    }

    if text.is_empty() {
        return Ok(DispatchOutcome::Empty);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => Ok(json.into()),
        Err(_) => {
            let mut map = Map::new();
            map.insert("content".to_string(), Value::String(text));
            Ok(DispatchOutcome::Json(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reqwest::header::HeaderMap;
    use serde_json::json;

    fn response(status: u16, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_object_body_is_returned_as_is() {
        let outcome = normalize(response(200, r#"{"id": 1, "name": "Rex"}"#)).unwrap();
        assert_eq!(outcome.into_value(), Some(json!({"id": 1, "name": "Rex"})));
    }

    #[test]
    fn test_non_object_json_is_wrapped() {
        let outcome = normalize(response(200, "[1, 2, 3]")).unwrap();
        assert_eq!(outcome.into_value(), Some(json!({"result": [1, 2, 3]})));

        let outcome = normalize(response(200, "42")).unwrap();
        assert_eq!(outcome.into_value(), Some(json!({"result": 42})));
    }

    #[test]
    fn test_empty_body_differs_from_empty_object() {
        let empty = normalize(response(204, "")).unwrap();
        assert!(empty.is_empty());

        let object = normalize(response(200, "{}")).unwrap();
        assert!(!object.is_empty());
        assert_eq!(object.as_json().map(Map::len), Some(0));
    }

    #[test]
    fn test_text_body_is_wrapped_as_content() {
        let outcome = normalize(response(200, "plain text")).unwrap();
        assert_eq!(outcome.into_value(), Some(json!({"content": "plain text"})));
    }

    #[test]
    fn test_whitespace_body_is_content_not_empty() {
        let outcome = normalize(response(200, "  \n")).unwrap();
        assert_eq!(outcome.into_value(), Some(json!({"content": "  \n"})));
    }

    #[test]
    fn test_redirect_status_counts_as_success() {
        assert!(normalize(response(304, "")).unwrap().is_empty());
    }

    #[test]
    fn test_error_status_carries_reason_and_body() {
        let err = normalize(response(404, r#"{"detail": "Not found"}"#)).unwrap_err();
        match &err {
            GatewayError::HttpStatus { status, reason, body } => {
                assert_eq!(*status, 404);
                assert_eq!(reason, "Not Found");
                assert_eq!(body.as_deref(), Some(r#"{"detail":"Not found"}"#));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("HTTP error 404: Not Found - "));

        let err = normalize(response(500, "boom")).unwrap_err();
        assert_eq!(err.to_string(), "HTTP error 500: Internal Server Error - boom");

        let err = normalize(response(405, "")).unwrap_err();
        assert_eq!(err.to_string(), "HTTP error 405: Method Not Allowed");
        assert!(err.is_method_unsupported());
    }
}
