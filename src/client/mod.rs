//! HTTP transports the dispatcher sends requests through.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::openapi::HttpMethod;
use crate::utils::Result as GatewayResult;

pub mod http_client;
pub mod in_process;

pub use http_client::ReqwestTransport;
pub use in_process::InProcessTransport;

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: Option<Map<String, Value>>,
    pub json: Option<Value>,
}

impl OutboundRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            json: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Anything that can carry an [`OutboundRequest`] to the target API.
/// Network-level failures come back as `GatewayError::Request`; any HTTP
/// status, including errors, is a successful transport response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    fn base_url(&self) -> Option<&str>;

    async fn request(&self, request: OutboundRequest) -> GatewayResult<TransportResponse>;
}

/// Flattens query parameters into string pairs. Nulls are skipped and arrays
/// become repeated keys.
pub fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => continue,
            Value::Array(items) => {
                for item in items {
                    if let Some(rendered) = render_scalar(item) {
                        pairs.push((key.clone(), rendered));
                    }
                }
            }
            other => {
                if let Some(rendered) = render_scalar(other) {
                    pairs.push((key.clone(), rendered));
                }
            }
        }
    }
    pairs
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Joins a relative URL onto `base`; absolute URLs pass through.
pub fn resolve_url(base: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match base {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        None => url.to_string(),
    }
}
