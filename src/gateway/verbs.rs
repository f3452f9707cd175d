//! The six generic REST verb tools.

use std::sync::Arc;

use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::openapi::HttpMethod;
use crate::utils::{GatewayError, Result as GatewayResult};

pub const VERB_METHODS: [HttpMethod; 6] = [
    HttpMethod::Get,
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Patch,
    HttpMethod::Delete,
    HttpMethod::Options,
];

/// Arguments of GET, DELETE and OPTIONS.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryArgs {
    /// Target URL, absolute or relative to the gateway base URL.
    pub url: String,
    /// Query string parameters.
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

/// Arguments of POST, PUT and PATCH.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BodyArgs {
    /// Target URL, absolute or relative to the gateway base URL.
    pub url: String,
    /// JSON request body.
    #[serde(default)]
    pub body: Option<Map<String, Value>>,
    /// Query string parameters.
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
}

impl BodyArgs {
    pub fn parse(arguments: Option<Map<String, Value>>) -> GatewayResult<Self> {
        let arguments = Value::Object(arguments.unwrap_or_default());
        serde_json::from_value(arguments)
            .map_err(|e| GatewayError::Validation(format!("Invalid tool arguments: {}", e)))
    }
}

fn input_schema(method: HttpMethod) -> JsonObject {
    let schema = if method.accepts_body() {
        schemars::schema_for!(BodyArgs)
    } else {
        schemars::schema_for!(QueryArgs)
    };
    match serde_json::to_value(&schema) {
        Ok(Value::Object(map)) => map,
        _ => JsonObject::new(),
    }
}

/// Hints derived from HTTP method semantics; `openWorldHint` mirrors the
/// gateway's open-world flag.
pub fn annotations_for_method(method: HttpMethod, open_world: bool) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method {
        HttpMethod::Get | HttpMethod::Head | HttpMethod::Options => (Some(true), Some(false), Some(true)),
        HttpMethod::Post => (Some(false), Some(false), Some(false)),
        HttpMethod::Put | HttpMethod::Delete => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent.
        HttpMethod::Patch => (Some(false), Some(true), None),
        HttpMethod::Trace => (None, None, None),
    };
    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(open_world),
    }
}

#[derive(Debug, Clone)]
pub struct VerbTool {
    pub method: HttpMethod,
    pub open_world: bool,
}

impl VerbTool {
    pub fn new(method: HttpMethod, open_world: bool) -> Self {
        Self { method, open_world }
    }

    pub fn name(&self) -> &'static str {
        self.method.as_str()
    }

    pub fn description(&self) -> String {
        format!("Execute a {} request on a URL", self.method)
    }

    pub fn input_schema(&self) -> JsonObject {
        input_schema(self.method)
    }

    pub fn annotations(&self) -> ToolAnnotations {
        annotations_for_method(self.method, self.open_world)
    }

    /// The MCP tool definition advertised to clients.
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(self.name(), self.description(), Arc::new(self.input_schema()));
        tool.annotations = Some(self.annotations());
        tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_exposes_body_only_for_body_verbs() {
        let get = VerbTool::new(HttpMethod::Get, false).input_schema();
        let properties = get["properties"].as_object().unwrap();
        assert!(properties.contains_key("url"));
        assert!(properties.contains_key("params"));
        assert!(!properties.contains_key("body"));
        assert_eq!(get["required"], json!(["url"]));

        let post = VerbTool::new(HttpMethod::Post, false).input_schema();
        assert!(post["properties"].as_object().unwrap().contains_key("body"));
    }

    #[test]
    fn test_annotations_follow_method_semantics() {
        let get = annotations_for_method(HttpMethod::Get, false);
        assert_eq!(get.read_only_hint, Some(true));
        assert_eq!(get.open_world_hint, Some(false));

        let delete = annotations_for_method(HttpMethod::Delete, true);
        assert_eq!(delete.destructive_hint, Some(true));
        assert_eq!(delete.idempotent_hint, Some(true));
        assert_eq!(delete.open_world_hint, Some(true));

        let patch = annotations_for_method(HttpMethod::Patch, true);
        assert_eq!(patch.idempotent_hint, None);

        let post = annotations_for_method(HttpMethod::Post, false);
        assert_eq!(post.idempotent_hint, Some(false));
        assert_eq!(post.destructive_hint, Some(false));
    }

    #[test]
    fn test_tool_definition() {
        let tool = VerbTool::new(HttpMethod::Put, true).to_tool();
        assert_eq!(tool.name, "PUT");
        assert_eq!(tool.description.as_deref(), Some("Execute a PUT request on a URL"));
        assert_eq!(tool.annotations.and_then(|a| a.open_world_hint), Some(true));
    }

    #[test]
    fn test_argument_parsing() {
        let args = BodyArgs::parse(json!({"url": "/pets", "body": {"name": "Rex"}}).as_object().cloned()).unwrap();
        assert_eq!(args.url, "/pets");
        assert!(args.params.is_none());
        assert_eq!(args.body.unwrap()["name"], "Rex");

        assert!(BodyArgs::parse(None).is_err());
        assert!(BodyArgs::parse(json!({"url": 5}).as_object().cloned()).is_err());
    }
}
