//! Resolution, validation and execution of the generic REST verbs.
//!
//! Closed-world dispatch only reaches URLs that resolve to a declared path and
//! verb. Open-world dispatch sends whatever it is given. OPTIONS additionally
//! falls back to schema discovery and prefix listing when the target does not
//! implement it.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use super::response::{normalize, DispatchOutcome};
use crate::client::{resolve_url, HttpTransport, OutboundRequest};
use crate::openapi::{
    build_full_uri, extract_path_from_url, is_within_base_url, HttpMethod, SpecIndex,
};
use crate::resources::Registry;
use crate::routing::has_path_parameters;
use crate::utils::{GatewayError, Result as GatewayResult};

/// Cap on the number of known URIs quoted in "no match" errors.
pub const KNOWN_RESOURCE_SAMPLE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub method: HttpMethod,
    pub url: String,
    pub params: Option<Map<String, Value>>,
    pub body: Option<Value>,
}

impl DispatchRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            body: None,
        }
    }

    pub fn with_params(mut self, params: Option<Map<String, Value>>) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

pub struct Dispatcher {
    index: Arc<SpecIndex>,
    registry: Arc<Registry>,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    open_world: bool,
}

impl Dispatcher {
    pub fn new(
        index: Arc<SpecIndex>,
        registry: Arc<Registry>,
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        open_world: bool,
    ) -> Self {
        Self {
            index,
            registry,
            base_url: base_url.into(),
            transport,
            open_world,
        }
    }

    pub fn open_world(&self) -> bool {
        self.open_world
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> GatewayResult<DispatchOutcome> {
        debug!(
            "Dispatching {} {} (open_world={})",
            request.method, request.url, self.open_world
        );
        if request.method == HttpMethod::Options {
            return self.handle_options(request).await;
        }
        self.execute_standard(request).await
    }

    async fn execute_standard(&self, request: DispatchRequest) -> GatewayResult<DispatchOutcome> {
        if !self.open_world {
            self.validate(&request)?;
        }
        self.send(request).await
    }

    /// Checks that the URL lies under the base URL and resolves to a declared
    /// path that declares the verb.
    fn validate(&self, request: &DispatchRequest) -> GatewayResult<()> {
        let unknown = || GatewayError::UnknownResource {
            url: request.url.clone(),
            known: self.registry.sample_uris(KNOWN_RESOURCE_SAMPLE),
        };
        if !is_within_base_url(&request.url, &self.base_url) {
            return Err(unknown());
        }

        let path = extract_path_from_url(&request.url, &self.base_url);
        let found = self
            .index
            .find_matching_paths(&path, false)
            .into_iter()
            .next()
            .ok_or_else(unknown)?;

        let entry = self.index.entry(&found.spec_path);
        if !entry.is_some_and(|e| e.declares(request.method)) {
            let mut available: Vec<String> = entry
                .map(|e| e.methods.iter().map(|m| m.to_string()).collect())
                .unwrap_or_default();
            available.sort();
            return Err(GatewayError::MethodNotSupported {
                method: request.method.to_string(),
                url: request.url.clone(),
                available,
            });
        }
        Ok(())
    }

    async fn send(&self, request: DispatchRequest) -> GatewayResult<DispatchOutcome> {
        let url = resolve_url(Some(&self.base_url), &request.url);
        let mut outbound = OutboundRequest::new(request.method, url);
        outbound.params = request.params.filter(|params| !params.is_empty());
        if request.method.accepts_body() {
            outbound.json = request.body.filter(|body| !is_blank(body));
        }

        let response = self.transport.request(outbound).await?;
        debug!("Upstream answered {}", response.status);
        normalize(response)
    }

    async fn handle_options(&self, request: DispatchRequest) -> GatewayResult<DispatchOutcome> {
        let mut unsupported = None;
        if self.open_world {
            match self.send(request.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_method_unsupported() => {
                    debug!("OPTIONS not supported upstream for {}, using discovery", request.url);
                    unsupported = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let path = extract_path_from_url(&request.url, &self.base_url);

        if let Some(found) = self.index.find_matching_paths(&path, false).into_iter().next() {
            let (methods, _) = self.index.get_path_info(&found.spec_path);
            if methods.contains(&HttpMethod::Options) {
                return match unsupported {
                    // Already sent once; the upstream refused it.
                    Some(e) => Err(e),
                    None => self.execute_standard(request).await,
                };
            }
            let schema = self
                .index
                .get_operation_schema(&found.spec_path, Some(&methods))?;
            return Ok(schema.into());
        }

        let prefixed = self.index.find_matching_paths(&path, true);
        if !prefixed.is_empty() {
            return Ok(self.prefix_listing(&path, &prefixed).into());
        }

        if self.open_world {
            return match unsupported {
                Some(e) => Err(e),
                None => self.send(request).await,
            };
        }

        Err(GatewayError::NoResourcesFound {
            url: request.url,
            available: self.registry.sample_uris(KNOWN_RESOURCE_SAMPLE),
        })
    }

    fn prefix_listing(&self, path: &str, matches: &[crate::routing::PathMatch]) -> Value {
        let routes: Vec<Value> = matches
            .iter()
            .map(|m| {
                let (methods, _) = self.index.get_path_info(&m.spec_path);
                let methods: Vec<&str> = methods.iter().map(HttpMethod::as_str).collect();
                let kind = if has_path_parameters(&m.spec_path) {
                    "template"
                } else {
                    "resource"
                };
                json!({
                    "url": build_full_uri(&self.base_url, &m.spec_path),
                    "methods": methods,
                    "type": kind,
                })
            })
            .collect();

        json!({
            "description": format!(
                "Routes matching prefix: Found {} routes starting with {}",
                routes.len(),
                path
            ),
            "matching_routes": routes,
        })
    }
}
