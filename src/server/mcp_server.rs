use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    model::{
        AnnotateAble, CallToolRequestParams, CallToolResult, Content, Implementation,
        ListResourceTemplatesResult, ListResourcesResult, ListToolsResult,
        PaginatedRequestParams, RawResource, ReadResourceRequestParams, ReadResourceResult,
        Resource, ResourceContents, ResourceTemplate, ServerCapabilities, ServerInfo, Tool,
    },
    service::{RequestContext, RoleServer},
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::dispatch::DispatchOutcome;
use crate::gateway::McpWebGateway;
use crate::resources::{GatewayResource, GatewayTemplate};
use crate::utils::GatewayError;

/// Exposes a [`McpWebGateway`] over the MCP protocol.
#[derive(Clone)]
pub struct GatewayMcpServer {
    gateway: Arc<McpWebGateway>,
}

impl GatewayMcpServer {
    pub fn new(gateway: Arc<McpWebGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &McpWebGateway {
        &self.gateway
    }

    /// Start the server with stdio transport
    pub async fn serve_stdio(self) -> Result<()> {
        info!("Starting MCP Web Gateway with stdio transport");

        let service = self.serve(stdio()).await.map_err(|e| {
            error!("Failed to start stdio transport: {:?}", e);
            anyhow::anyhow!("Failed to start stdio transport: {:?}", e)
        })?;

        info!("MCP server started successfully with stdio transport");
        service.waiting().await.map_err(|e| {
            error!("Server error: {:?}", e);
            anyhow::anyhow!("Server error: {:?}", e)
        })?;

        Ok(())
    }

    pub fn resource_list(&self) -> Vec<Resource> {
        self.gateway.resources().map(to_mcp_resource).collect()
    }

    pub fn template_list(&self) -> Result<Vec<ResourceTemplate>, McpError> {
        self.gateway.templates().map(to_mcp_template).collect()
    }

    pub fn tool_list(&self) -> Vec<Tool> {
        self.gateway.tools().iter().map(|tool| tool.to_tool()).collect()
    }

    pub fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let text = self.gateway.read_resource(uri).map_err(|e| match e {
            GatewayError::UnknownResource { .. } => McpError::invalid_params(e.to_string(), None),
            other => McpError::internal_error(other.to_string(), None),
        })?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }

    pub async fn call(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, Value>>,
    ) -> Result<CallToolResult, McpError> {
        match self.gateway.call_tool(name, arguments).await {
            Ok(DispatchOutcome::Json(map)) => Ok(CallToolResult::structured(Value::Object(map))),
            Ok(DispatchOutcome::Empty) => Ok(CallToolResult::success(vec![Content::text("")])),
            Err(e @ (GatewayError::McpProtocol(_) | GatewayError::Validation(_))) => {
                Err(McpError::invalid_params(e.to_string(), None))
            }
            Err(e) => {
                error!("Tool {} failed: {}", name, e);
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

fn to_mcp_resource(resource: &GatewayResource) -> Resource {
    let mut raw = RawResource::new(resource.uri.clone(), resource.name.clone());
    raw.description = Some(resource.description.clone());
    raw.mime_type = Some(resource.mime_type.clone());
    raw.no_annotation()
}

fn to_mcp_template(template: &GatewayTemplate) -> Result<ResourceTemplate, McpError> {
    serde_json::from_value(json!({
        "uriTemplate": template.uri_template,
        "name": template.name,
        "description": template.description,
        "mimeType": template.mime_type,
    }))
    .map_err(|e| McpError::internal_error(format!("Invalid resource template: {e}"), None))
}

impl ServerHandler for GatewayMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = self.gateway.name().to_string();
        server_info.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info,
            instructions: Some(format!(
                "Resources describe the endpoints of {}; reading one returns its OpenAPI schema. \
                 Use the GET, POST, PUT, PATCH, DELETE and OPTIONS tools to call them.",
                self.gateway.base_url()
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_list(),
            next_cursor: None,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        debug!("tools/call {}", request.name);
        self.call(&request.name, request.arguments).await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.resource_list(),
            next_cursor: None,
            ..Default::default()
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            resource_templates: self.template_list()?,
            next_cursor: None,
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        debug!("resources/read {}", request.uri);
        self.read(&request.uri)
    }
}
