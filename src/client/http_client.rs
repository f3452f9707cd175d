use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

use super::{query_pairs, resolve_url, HttpTransport, OutboundRequest, TransportResponse};
use crate::config::Config;
use crate::utils::{GatewayError, Result as GatewayResult};

/// Network transport backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Option<String>,
    default_headers: HashMap<String, String>,
}

impl ReqwestTransport {
    pub fn new(config: &Config, base_url: Option<String>) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            default_headers: config.headers.clone(),
        })
    }

    pub fn with_timeout(base_url: Option<String>, timeout: Duration) -> GatewayResult<Self> {
        let config = Config {
            timeout_seconds: Some(timeout.as_secs().max(1)),
            ..Config::default()
        };
        Self::new(&config, base_url)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    async fn request(&self, request: OutboundRequest) -> GatewayResult<TransportResponse> {
        let url = resolve_url(self.base_url.as_deref(), &request.url);
        debug!("Sending {} {}", request.method, url);

        let mut builder = self.client.request(request.method.into(), &url);

        for (key, value) in &self.default_headers {
            builder = builder.header(key, value);
        }

        if let Some(params) = &request.params {
            builder = builder.query(&query_pairs(params));
        }

        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            GatewayError::Request(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        debug!("Response status: {}", status);

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
