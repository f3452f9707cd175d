use std::collections::{BTreeSet, HashMap};

use serde_json::{json, Map, Value};

use crate::openapi::HttpMethod;
use crate::routing::extract_parameter_names;
use crate::utils::Result as GatewayResult;

pub const JSON_MIME_TYPE: &str = "application/json";

/// Merged `{openapi, paths: {path: {method: fragment}}}` view shared by
/// resources and templates.
#[derive(Debug, Clone, PartialEq)]
struct MergedSchema {
    path: String,
    methods: Vec<HttpMethod>,
    tags: BTreeSet<String>,
    document: Value,
}

impl MergedSchema {
    fn new(openapi_version: &str, path: &str) -> Self {
        Self {
            path: path.to_string(),
            methods: Vec::new(),
            tags: BTreeSet::new(),
            document: json!({
                "openapi": openapi_version,
                "paths": { path: {} },
            }),
        }
    }

    /// Returns false when `method` was already merged; nothing changes then.
    fn add_method(&mut self, method: HttpMethod, fragment: Value, tags: &BTreeSet<String>) -> bool {
        if self.methods.contains(&method) {
            return false;
        }
        self.methods.push(method);
        self.tags.extend(tags.iter().cloned());
        if let Some(operations) = self.document["paths"][&self.path].as_object_mut() {
            operations.insert(method.as_key(), fragment);
        }
        true
    }

    fn render(&self) -> GatewayResult<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}

/// A concrete URL across all its HTTP methods.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResource {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    schema: MergedSchema,
}

impl GatewayResource {
    pub fn new(uri: impl Into<String>, path: &str, openapi_version: &str) -> Self {
        Self {
            uri: uri.into(),
            name: format!("resource_{}", path.replace('/', "_")),
            description: format!("Resource for {}", path),
            mime_type: JSON_MIME_TYPE.to_string(),
            schema: MergedSchema::new(openapi_version, path),
        }
    }

    pub fn add_method(&mut self, method: HttpMethod, fragment: Value, tags: &BTreeSet<String>) -> bool {
        self.schema.add_method(method, fragment, tags)
    }

    pub fn path(&self) -> &str {
        &self.schema.path
    }

    pub fn methods(&self) -> &[HttpMethod] {
        &self.schema.methods
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.schema.tags
    }

    pub fn schema(&self) -> &Value {
        &self.schema.document
    }

    /// The merged schema as pretty-printed JSON.
    pub fn read(&self) -> GatewayResult<String> {
        self.schema.render()
    }
}

/// A parameterized URL family such as `https://api/pets/{petId}`.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayTemplate {
    pub uri_template: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub parameters: Value,
    schema: MergedSchema,
}

impl GatewayTemplate {
    pub fn new(uri_template: impl Into<String>, path: &str, openapi_version: &str) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: format!("template_{}", path.replace('/', "_").replace(['{', '}'], "")),
            description: format!("Resource template for {}", path),
            mime_type: JSON_MIME_TYPE.to_string(),
            parameters: build_parameter_schema(path),
            schema: MergedSchema::new(openapi_version, path),
        }
    }

    pub fn add_method(&mut self, method: HttpMethod, fragment: Value, tags: &BTreeSet<String>) -> bool {
        self.schema.add_method(method, fragment, tags)
    }

    pub fn path(&self) -> &str {
        &self.schema.path
    }

    pub fn methods(&self) -> &[HttpMethod] {
        &self.schema.methods
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.schema.tags
    }

    pub fn schema(&self) -> &Value {
        &self.schema.document
    }

    pub fn read(&self) -> GatewayResult<String> {
        self.schema.render()
    }

    /// A concrete resource bound to `uri`. The template itself is left untouched.
    pub fn instantiate(&self, uri: &str, params: &HashMap<String, String>) -> GatewayResource {
        // Declared order keeps instance names stable.
        let mut parts: Vec<String> = extract_parameter_names(self.path())
            .into_iter()
            .filter_map(|name| params.get(&name).map(|value| format!("{}={}", name, value)))
            .collect();
        let mut extra: Vec<String> = params
            .iter()
            .filter(|(name, _)| !self.path().contains(&format!("{{{}}}", name)))
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        extra.sort();
        parts.extend(extra);

        GatewayResource {
            uri: uri.to_string(),
            name: format!("{}-{}", self.name, parts.join("-")),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            schema: self.schema.clone(),
        }
    }
}

/// `{type: object, properties: {name: {type: string}}, required: [...]}` for
/// every `{name}` in `path`; an empty object when there are none.
pub fn build_parameter_schema(path: &str) -> Value {
    let mut names = extract_parameter_names(path);
    let mut seen = BTreeSet::new();
    names.retain(|name| seen.insert(name.clone()));
    if names.is_empty() {
        return Value::Object(Map::new());
    }

    let properties: Map<String, Value> = names
        .iter()
        .map(|name| (name.clone(), json!({"type": "string"})))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": names,
    })
}

/// One registry slot: either a concrete resource or a template.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEntry {
    Resource(GatewayResource),
    Template(GatewayTemplate),
}

impl RegistryEntry {
    pub fn uri(&self) -> &str {
        match self {
            RegistryEntry::Resource(r) => &r.uri,
            RegistryEntry::Template(t) => &t.uri_template,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            RegistryEntry::Resource(r) => r.path(),
            RegistryEntry::Template(t) => t.path(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RegistryEntry::Resource(r) => &r.name,
            RegistryEntry::Template(t) => &t.name,
        }
    }

    pub fn methods(&self) -> &[HttpMethod] {
        match self {
            RegistryEntry::Resource(r) => r.methods(),
            RegistryEntry::Template(t) => t.methods(),
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, RegistryEntry::Template(_))
    }

    pub fn add_method(&mut self, method: HttpMethod, fragment: Value, tags: &BTreeSet<String>) -> bool {
        match self {
            RegistryEntry::Resource(r) => r.add_method(method, fragment, tags),
            RegistryEntry::Template(t) => t.add_method(method, fragment, tags),
        }
    }

    pub fn read(&self) -> GatewayResult<String> {
        match self {
            RegistryEntry::Resource(r) => r.read(),
            RegistryEntry::Template(t) => t.read(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resource_naming() {
        let resource = GatewayResource::new("https://api.example.com/pets", "/pets", "3.0.0");
        assert_eq!(resource.name, "resource__pets");
        assert_eq!(resource.description, "Resource for /pets");
        assert_eq!(resource.mime_type, "application/json");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut resource = GatewayResource::new("https://api.example.com/pets", "/pets", "3.0.0");
        assert!(resource.add_method(HttpMethod::Get, json!({"operationId": "listPets"}), &tags(&["pets"])));
        assert!(resource.add_method(HttpMethod::Post, json!({"operationId": "createPet"}), &tags(&["write"])));
        assert!(!resource.add_method(HttpMethod::Get, json!({"operationId": "other"}), &tags(&["ignored"])));

        assert_eq!(resource.methods(), &[HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(resource.tags(), &tags(&["pets", "write"]));
        assert_eq!(resource.schema()["paths"]["/pets"]["get"]["operationId"], "listPets");

        let rendered: Value = serde_json::from_str(&resource.read().unwrap()).unwrap();
        assert_eq!(rendered["paths"]["/pets"]["post"]["operationId"], "createPet");
        assert_eq!(rendered["openapi"], "3.0.0");
    }

    #[test]
    fn test_parameter_schema() {
        assert_eq!(
            build_parameter_schema("/users/{userId}/posts/{postId}"),
            json!({
                "type": "object",
                "properties": {"userId": {"type": "string"}, "postId": {"type": "string"}},
                "required": ["userId", "postId"]
            })
        );
        assert_eq!(build_parameter_schema("/users"), json!({}));
    }

    #[test]
    fn test_parameter_schema_keeps_punctuated_names() {
        assert_eq!(
            build_parameter_schema("/users/{user-id}/{api.version}/{user-id}"),
            json!({
                "type": "object",
                "properties": {"user-id": {"type": "string"}, "api.version": {"type": "string"}},
                "required": ["user-id", "api.version"]
            })
        );
    }

    #[test]
    fn test_template_naming() {
        let template = GatewayTemplate::new(
            "https://api.example.com/users/{userId}/posts/{postId}",
            "/users/{userId}/posts/{postId}",
            "3.0.0",
        );
        assert_eq!(template.name, "template__users_userId_posts_postId");
        assert_eq!(template.description, "Resource template for /users/{userId}/posts/{postId}");
        assert_eq!(template.parameters["required"], json!(["userId", "postId"]));
    }

    #[test]
    fn test_instantiate_does_not_mutate_template() {
        let mut template = GatewayTemplate::new(
            "https://api.example.com/users/{userId}/posts/{postId}",
            "/users/{userId}/posts/{postId}",
            "3.0.0",
        );
        template.add_method(HttpMethod::Get, json!({"operationId": "getPost"}), &tags(&["posts"]));
        template.add_method(HttpMethod::Delete, json!({"operationId": "deletePost"}), &BTreeSet::new());
        let before = template.clone();

        let params: HashMap<String, String> = [
            ("postId".to_string(), "7".to_string()),
            ("userId".to_string(), "42".to_string()),
        ]
        .into();
        let mut instance = template.instantiate("https://api.example.com/users/42/posts/7", &params);

        assert_eq!(instance.uri, "https://api.example.com/users/42/posts/7");
        assert_eq!(instance.name, "template__users_userId_posts_postId-userId=42-postId=7");
        assert_eq!(instance.methods(), &[HttpMethod::Get, HttpMethod::Delete]);
        assert_eq!(instance.tags(), &tags(&["posts"]));
        assert_eq!(instance.schema(), template.schema());

        instance.add_method(HttpMethod::Put, json!({}), &tags(&["new"]));
        assert_eq!(template, before);
    }

    #[test]
    fn test_registry_entry_dispatches_to_variant() {
        let mut entry = RegistryEntry::Template(GatewayTemplate::new(
            "https://api.example.com/pets/{petId}",
            "/pets/{petId}",
            "3.1.0",
        ));
        assert!(entry.is_template());
        assert_eq!(entry.uri(), "https://api.example.com/pets/{petId}");
        assert_eq!(entry.path(), "/pets/{petId}");
        entry.add_method(HttpMethod::Get, json!({"operationId": "showPet"}), &BTreeSet::new());
        assert_eq!(entry.methods(), &[HttpMethod::Get]);
        assert!(entry.read().unwrap().contains("showPet"));
    }
}
