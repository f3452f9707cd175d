use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use tower::ServiceExt;
use tracing::debug;
use url::Url;

use super::{query_pairs, resolve_url, HttpTransport, OutboundRequest, TransportResponse};
use crate::utils::{GatewayError, Result as GatewayResult};

pub const DEFAULT_IN_PROCESS_BASE_URL: &str = "http://app";

/// Sends requests straight into an axum `Router` without opening a socket.
#[derive(Clone)]
pub struct InProcessTransport {
    router: Router,
    base_url: String,
}

impl InProcessTransport {
    pub fn new(router: Router) -> Self {
        Self::with_base_url(router, DEFAULT_IN_PROCESS_BASE_URL)
    }

    pub fn with_base_url(router: Router, base_url: impl Into<String>) -> Self {
        Self {
            router,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_request(&self, request: &OutboundRequest) -> GatewayResult<Request<Body>> {
        let mut url = Url::parse(&resolve_url(Some(&self.base_url), &request.url))
            .map_err(|e| GatewayError::Request(format!("Invalid URL {}: {}", request.url, e)))?;
        if let Some(params) = &request.params {
            let pairs = query_pairs(params);
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }

        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        let mut builder = Request::builder().method(method).uri(url.as_str());

        let body = match &request.json {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
                Body::from(serde_json::to_vec(json)?)
            }
            None => Body::empty(),
        };

        builder
            .body(body)
            .map_err(|e| GatewayError::Request(e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for InProcessTransport {
    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    async fn request(&self, request: OutboundRequest) -> GatewayResult<TransportResponse> {
        let http_request = self.build_request(&request)?;
        debug!("Routing {} {} in process", request.method, http_request.uri());

        let response = self
            .router
            .clone()
            .oneshot(http_request)
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::HttpMethod;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Json;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn app() -> Router {
        Router::new()
            .route(
                "/pets",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({"limit": q.get("limit").cloned()}))
                })
                .post(|Json(body): Json<Value>| async move { (StatusCode::CREATED, Json(body)) }),
            )
            .route(
                "/pets/{id}",
                get(|Path(id): Path<String>| async move { Json(json!({"id": id})) })
                    .delete(|| async { StatusCode::NO_CONTENT }),
            )
    }

    #[tokio::test]
    async fn test_get_with_query() {
        let transport = InProcessTransport::new(app());
        let mut request = OutboundRequest::new(HttpMethod::Get, "http://app/pets");
        request.params = json!({"limit": 3}).as_object().cloned();

        let response = transport.request(request).await.unwrap();
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body, json!({"limit": "3"}));
    }

    #[tokio::test]
    async fn test_post_json_and_relative_url() {
        let transport = InProcessTransport::new(app());
        let mut request = OutboundRequest::new(HttpMethod::Post, "/pets");
        request.json = Some(json!({"name": "Rex"}));

        let response = transport.request(request).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.text(), r#"{"name":"Rex"}"#);
    }

    #[tokio::test]
    async fn test_unknown_route_and_empty_body() {
        let transport = InProcessTransport::new(app());
        assert_eq!(transport.base_url(), Some("http://app"));

        let missing = transport
            .request(OutboundRequest::new(HttpMethod::Get, "/nope"))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);

        let deleted = transport
            .request(OutboundRequest::new(HttpMethod::Delete, "/pets/7"))
            .await
            .unwrap();
        assert_eq!(deleted.status, 204);
        assert!(deleted.body.is_empty());
    }
}
