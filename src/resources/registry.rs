//! One registry entry per URI, built once from the spec index.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use super::component::{GatewayResource, GatewayTemplate, RegistryEntry};
use crate::openapi::{build_full_uri, extract_path_from_url, SpecIndex};
use crate::routing::{Classifier, ComponentKind};
use crate::utils::Result as GatewayResult;

pub struct Registry {
    base_url: String,
    entries: IndexMap<String, RegistryEntry>,
}

impl Registry {
    /// Classifies every indexed path and creates or merges its entry.
    pub fn populate(
        index: &SpecIndex,
        classifier: &Classifier,
        base_url: &str,
    ) -> GatewayResult<Self> {
        let mut entries: IndexMap<String, RegistryEntry> = IndexMap::new();

        for path in index.iter_paths() {
            let Some(path_entry) = index.entry(path) else {
                continue;
            };
            let kind = classifier.classify(index, path);
            let uri = build_full_uri(base_url, path);

            let entry = entries.entry(uri.clone()).or_insert_with(|| match kind {
                ComponentKind::Resource => {
                    RegistryEntry::Resource(GatewayResource::new(&uri, path, index.openapi_version()))
                }
                ComponentKind::ResourceTemplate => {
                    RegistryEntry::Template(GatewayTemplate::new(&uri, path, index.openapi_version()))
                }
            });

            for method in &path_entry.methods {
                let schema = index.get_operation_schema(path, Some(&[*method]))?;
                let fragment = schema["paths"][path]
                    .as_object()
                    .and_then(|ops| ops.values().next().cloned())
                    .unwrap_or(Value::Object(Default::default()));
                if entry.add_method(*method, fragment, &path_entry.tags) {
                    debug!("Registered {} {} on {}", method, path, uri);
                }
            }
        }

        info!(
            "Registry populated with {} resources and {} templates",
            entries.values().filter(|e| !e.is_template()).count(),
            entries.values().filter(|e| e.is_template()).count()
        );

        Ok(Self {
            base_url: base_url.to_string(),
            entries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in population order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> + '_ {
        self.entries.values()
    }

    pub fn get(&self, uri: &str) -> Option<&RegistryEntry> {
        self.entries.get(uri)
    }

    pub fn resource(&self, uri: &str) -> Option<&GatewayResource> {
        match self.entries.get(uri)? {
            RegistryEntry::Resource(resource) => Some(resource),
            RegistryEntry::Template(_) => None,
        }
    }

    pub fn template(&self, uri: &str) -> Option<&GatewayTemplate> {
        match self.entries.get(uri)? {
            RegistryEntry::Template(template) => Some(template),
            RegistryEntry::Resource(_) => None,
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = &GatewayResource> + '_ {
        self.entries.values().filter_map(|entry| match entry {
            RegistryEntry::Resource(resource) => Some(resource),
            RegistryEntry::Template(_) => None,
        })
    }

    pub fn templates(&self) -> impl Iterator<Item = &GatewayTemplate> + '_ {
        self.entries.values().filter_map(|entry| match entry {
            RegistryEntry::Template(template) => Some(template),
            RegistryEntry::Resource(_) => None,
        })
    }

    /// The entry registered for a document path.
    pub fn for_path(&self, path: &str) -> Option<&RegistryEntry> {
        self.entries.get(&build_full_uri(&self.base_url, path))
    }

    /// Resolves a concrete URI: an exact entry first, then the template whose
    /// path matches, instantiated for that URI.
    pub fn resolve_uri(&self, index: &SpecIndex, uri: &str) -> Option<RegistryEntry> {
        if let Some(entry) = self.entries.get(uri) {
            return Some(entry.clone());
        }

        let path = extract_path_from_url(uri, &self.base_url);
        let found = index.find_matching_paths(&path, false).into_iter().next()?;
        match self.for_path(&found.spec_path)? {
            RegistryEntry::Template(template) => Some(RegistryEntry::Resource(
                template.instantiate(uri, &found.params),
            )),
            resource @ RegistryEntry::Resource(_) => Some(resource.clone()),
        }
    }

    /// Up to `limit` registered URIs, for error messages.
    pub fn sample_uris(&self, limit: usize) -> Vec<String> {
        self.entries.keys().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi::HttpMethod;
    use crate::routing::{McpType, MethodFilter, RouteRule};
    use serde_json::json;

    const BASE: &str = "https://api.example.com";

    fn document() -> Value {
        json!({
            "openapi": "3.0.0",
            "servers": [{"url": BASE}],
            "paths": {
                "/pets": {
                    "get": {"operationId": "listPets", "tags": ["pets"]},
                    "post": {"operationId": "createPet", "tags": ["admin"]}
                },
                "/pets/{petId}": {
                    "get": {"operationId": "showPetById"},
                    "put": {"operationId": "updatePet"}
                },
                "/users/{userId}/posts/{postId}": {
                    "get": {"operationId": "getPost"}
                },
                "/health": {"get": {"operationId": "health"}},
                "/empty": {"summary": "nothing declared"}
            }
        })
    }

    fn registry() -> (SpecIndex, Registry) {
        let index = SpecIndex::new(document()).unwrap();
        let registry = Registry::populate(&index, &Classifier::default(), BASE).unwrap();
        (index, registry)
    }

    #[test]
    fn test_one_entry_per_path() {
        let (_, registry) = registry();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.resources().count(), 2);
        assert_eq!(registry.templates().count(), 2);
        assert!(registry.get("https://api.example.com/empty").is_none());

        let uris: Vec<&str> = registry.iter().map(RegistryEntry::uri).collect();
        assert_eq!(
            uris,
            vec![
                "https://api.example.com/pets",
                "https://api.example.com/pets/{petId}",
                "https://api.example.com/users/{userId}/posts/{postId}",
                "https://api.example.com/health",
            ]
        );
    }

    #[test]
    fn test_methods_are_merged_onto_one_resource() {
        let (_, registry) = registry();
        let pets = registry.resource("https://api.example.com/pets").unwrap();
        assert_eq!(pets.methods(), &[HttpMethod::Get, HttpMethod::Post]);
        assert!(pets.tags().contains("pets") && pets.tags().contains("admin"));

        let schema: Value = serde_json::from_str(&pets.read().unwrap()).unwrap();
        assert_eq!(schema["paths"]["/pets"]["get"]["operationId"], "listPets");
        assert_eq!(schema["paths"]["/pets"]["post"]["operationId"], "createPet");
    }

    #[test]
    fn test_template_lookup() {
        let (_, registry) = registry();
        let template = registry.template("https://api.example.com/pets/{petId}").unwrap();
        assert_eq!(template.methods(), &[HttpMethod::Get, HttpMethod::Put]);
        assert!(registry.resource("https://api.example.com/pets/{petId}").is_none());
        assert!(registry.template("https://api.example.com/pets").is_none());
    }

    #[test]
    fn test_resolve_uri_instantiates_templates() {
        let (index, registry) = registry();

        let exact = registry.resolve_uri(&index, "https://api.example.com/health").unwrap();
        assert_eq!(exact.name(), "resource__health");

        let instance = registry
            .resolve_uri(&index, "https://api.example.com/users/5/posts/9")
            .unwrap();
        assert!(!instance.is_template());
        assert_eq!(instance.uri(), "https://api.example.com/users/5/posts/9");
        assert_eq!(instance.name(), "template__users_userId_posts_postId-userId=5-postId=9");

        assert!(registry.resolve_uri(&index, "https://api.example.com/nothing").is_none());
    }

    #[test]
    fn test_custom_rules_override_parameter_heuristic() {
        let index = SpecIndex::new(document()).unwrap();
        let rules = vec![
            RouteRule::new(MethodFilter::Any, "/health", McpType::ResourceTemplate).unwrap(),
            RouteRule::new(MethodFilter::Any, ".*", McpType::Resource).unwrap(),
        ];
        let classifier = Classifier::new(rules).unwrap();
        let registry = Registry::populate(&index, &classifier, BASE).unwrap();

        assert_eq!(registry.len(), 4);
        assert!(registry.template("https://api.example.com/health").is_some());
        assert!(registry.resource("https://api.example.com/pets/{petId}").is_some());
    }

    #[test]
    fn test_sample_uris_is_capped() {
        let (_, registry) = registry();
        assert_eq!(registry.sample_uris(2).len(), 2);
        assert_eq!(registry.sample_uris(10).len(), 4);
    }
}
