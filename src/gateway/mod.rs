//! The gateway facade: one OpenAPI document and one transport in, resources,
//! templates and the REST verb tools out.

use std::sync::Arc;

use axum::Router;
use serde_json::{Map, Value};
use tracing::info;

use crate::client::{HttpTransport, InProcessTransport};
use crate::config::Config;
use crate::dispatch::{DispatchOutcome, DispatchRequest, Dispatcher, KNOWN_RESOURCE_SAMPLE};
use crate::openapi::{HttpMethod, SpecIndex};
use crate::resources::{GatewayResource, GatewayTemplate, Registry, RegistryEntry};
use crate::routing::{Classifier, RouteRule};
use crate::utils::{GatewayError, Result as GatewayResult};

pub mod verbs;

pub use verbs::{annotations_for_method, BodyArgs, QueryArgs, VerbTool, VERB_METHODS};

pub const DEFAULT_GATEWAY_NAME: &str = "MCP Web Gateway";

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub name: Option<String>,
    pub add_rest_tools: bool,
    pub open_world: bool,
    /// Replaces the default rules when set.
    pub route_rules: Option<Vec<RouteRule>>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            name: None,
            add_rest_tools: true,
            open_world: false,
            route_rules: None,
        }
    }
}

impl GatewayOptions {
    pub fn from_config(config: &Config) -> GatewayResult<Self> {
        let route_rules = if config.route_rules.is_empty() {
            None
        } else {
            Some(
                config
                    .route_rules
                    .iter()
                    .map(RouteRule::try_from)
                    .collect::<GatewayResult<Vec<_>>>()?,
            )
        };
        Ok(Self {
            name: config.name.clone(),
            add_rest_tools: config.add_rest_tools,
            open_world: config.open_world,
            route_rules,
        })
    }
}

/// A web application the gateway can be mounted on without a network hop.
pub trait HostApplication {
    fn openapi(&self) -> Value;

    fn router(&self) -> Router;

    fn title(&self) -> Option<String> {
        self.openapi()
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

pub struct McpWebGateway {
    name: String,
    base_url: String,
    open_world: bool,
    index: Arc<SpecIndex>,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    tools: Vec<VerbTool>,
}

impl McpWebGateway {
    pub fn new(
        document: Value,
        transport: Arc<dyn HttpTransport>,
        options: GatewayOptions,
    ) -> GatewayResult<Self> {
        let index = Arc::new(SpecIndex::new(document)?);
        let base_url = index.determine_base_url(transport.base_url())?;

        let classifier = match options.route_rules {
            Some(rules) => Classifier::new(rules)?,
            None => Classifier::default(),
        };
        let registry = Arc::new(Registry::populate(&index, &classifier, &base_url)?);
        let dispatcher = Dispatcher::new(
            Arc::clone(&index),
            Arc::clone(&registry),
            base_url.clone(),
            transport,
            options.open_world,
        );

        let mut gateway = Self {
            name: options.name.unwrap_or_else(|| DEFAULT_GATEWAY_NAME.to_string()),
            base_url,
            open_world: options.open_world,
            index,
            registry,
            dispatcher,
            tools: Vec::new(),
        };
        if options.add_rest_tools {
            gateway.add_rest_tools();
        }

        info!(
            "Created MCP Web Gateway '{}' for {} ({} entries, open_world={})",
            gateway.name,
            gateway.base_url,
            gateway.registry.len(),
            gateway.open_world
        );
        Ok(gateway)
    }

    /// Builds a gateway over an in-process application. Requests are routed
    /// straight into the application's router under `http://app`.
    pub fn from_host_framework(
        app: &impl HostApplication,
        mut options: GatewayOptions,
    ) -> GatewayResult<Self> {
        let document = app.openapi();
        let transport = Arc::new(InProcessTransport::new(app.router()));
        if options.name.is_none() {
            options.name = app.title();
        }
        Self::new(document, transport, options)
    }

    /// Registers the GET, POST, PUT, PATCH, DELETE and OPTIONS tools. Calling
    /// it again changes nothing.
    pub fn add_rest_tools(&mut self) {
        if !self.tools.is_empty() {
            return;
        }
        self.tools = VERB_METHODS
            .into_iter()
            .map(|method| VerbTool::new(method, self.open_world))
            .collect();
    }

    pub fn tools(&self) -> &[VerbTool] {
        &self.tools
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn open_world(&self) -> bool {
        self.open_world
    }

    pub fn index(&self) -> &SpecIndex {
        &self.index
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn resources(&self) -> impl Iterator<Item = &GatewayResource> + '_ {
        self.registry.resources()
    }

    pub fn templates(&self) -> impl Iterator<Item = &GatewayTemplate> + '_ {
        self.registry.templates()
    }

    /// The merged schema for a resource, a template, or a concrete URI under a template.
    pub fn read_resource(&self, uri: &str) -> GatewayResult<String> {
        let entry: RegistryEntry = self
            .registry
            .resolve_uri(&self.index, uri)
            .ok_or_else(|| GatewayError::UnknownResource {
                url: uri.to_string(),
                known: self.registry.sample_uris(KNOWN_RESOURCE_SAMPLE),
            })?;
        entry.read()
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> GatewayResult<DispatchOutcome> {
        self.dispatcher.dispatch(request).await
    }

    /// Runs one of the registered verb tools.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> GatewayResult<DispatchOutcome> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| GatewayError::McpProtocol(format!("Unknown tool: {}", name)))?;

        let args = BodyArgs::parse(arguments)?;
        let request = DispatchRequest::new(tool.method, args.url)
            .with_params(args.params)
            .with_body(args.body.map(Value::Object));
        self.dispatch(request).await
    }

    pub fn has_tool(&self, method: HttpMethod) -> bool {
        self.tools.iter().any(|tool| tool.method == method)
    }
}
