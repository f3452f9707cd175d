//! Read-only index over a parsed OpenAPI document.

use std::collections::BTreeSet;

use percent_encoding::percent_decode_str;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::cache::{SchemaCache, SchemaCacheKey};
use super::HttpMethod;
use crate::routing::{PathMatch, PathMatcher};
use crate::utils::{GatewayError, Result as GatewayResult};

const DEFAULT_OPENAPI_VERSION: &str = "3.0.0";

/// One path item of the document, captured at construction time.
#[derive(Debug, Clone)]
pub struct PathEntry {
    pub path: String,
    /// Declared methods in document order.
    pub methods: Vec<HttpMethod>,
    pub tags: BTreeSet<String>,
    /// Operation fragments keyed by the key used in the document (`get`, `Post`, ...).
    pub operations: Map<String, Value>,
}

impl PathEntry {
    fn from_item(path: &str, item: &Map<String, Value>) -> Self {
        let mut methods = Vec::new();
        let mut tags = BTreeSet::new();
        let mut operations = Map::new();

        for (key, operation) in item {
            let Some(method) = HttpMethod::from_key(key) else {
                continue;
            };
            if !methods.contains(&method) {
                methods.push(method);
            }
            if let Some(op_tags) = operation.get("tags").and_then(Value::as_array) {
                tags.extend(op_tags.iter().filter_map(Value::as_str).map(str::to_string));
            }
            operations.insert(key.clone(), operation.clone());
        }

        Self {
            path: path.to_string(),
            methods,
            tags,
            operations,
        }
    }

    pub fn declares(&self, method: HttpMethod) -> bool {
        self.methods.contains(&method)
    }
}

pub struct SpecIndex {
    document: Value,
    openapi_version: String,
    entries: Vec<PathEntry>,
    matcher: PathMatcher,
    schema_cache: SchemaCache,
}

impl SpecIndex {
    pub fn new(document: Value) -> GatewayResult<Self> {
        let root = document.as_object().ok_or_else(|| {
            GatewayError::OpenApiSpec("OpenAPI document must be a JSON object".to_string())
        })?;

        let openapi_version = root
            .get("openapi")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_OPENAPI_VERSION)
            .to_string();

        let paths = root.get("paths").and_then(Value::as_object);
        let declared: Vec<String> = paths
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();
        let entries: Vec<PathEntry> = paths
            .into_iter()
            .flat_map(|p| p.iter())
            .filter_map(|(path, item)| item.as_object().map(|obj| PathEntry::from_item(path, obj)))
            .collect();

        debug!(
            "Indexed {} paths ({} with operations) from OpenAPI {}",
            declared.len(),
            entries.iter().filter(|e| !e.methods.is_empty()).count(),
            openapi_version
        );

        Ok(Self {
            matcher: PathMatcher::new(declared),
            document,
            openapi_version,
            entries,
            schema_cache: SchemaCache::default(),
        })
    }

    pub fn openapi_version(&self) -> &str {
        &self.openapi_version
    }

    pub fn entry(&self, path: &str) -> Option<&PathEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Methods and tag union for `path`; an unknown path yields empty values.
    pub fn get_path_info(&self, path: &str) -> (Vec<HttpMethod>, BTreeSet<String>) {
        self.entry(path)
            .map(|e| (e.methods.clone(), e.tags.clone()))
            .unwrap_or_default()
    }

    /// Paths declaring at least one HTTP method, in document order.
    pub fn iter_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|e| !e.methods.is_empty())
            .map(|e| e.path.as_str())
    }

    /// A minimal document holding only `path` and the selected methods.
    /// `None` or an empty selection means every declared method.
    pub fn get_operation_schema(
        &self,
        path: &str,
        methods: Option<&[HttpMethod]>,
    ) -> GatewayResult<Value> {
        let key = SchemaCacheKey::new(path, methods);
        self.schema_cache
            .get_or_try_insert(key, |key| self.build_operation_schema(key))
    }

    fn build_operation_schema(&self, key: &SchemaCacheKey) -> GatewayResult<Value> {
        let entry = self
            .entry(key.path())
            .ok_or_else(|| GatewayError::PathNotFound(key.path().to_string()))?;

        let fragments: Map<String, Value> = entry
            .operations
            .iter()
            .filter(|(doc_key, _)| match key.methods() {
                None => true,
                Some(selected) => HttpMethod::from_key(doc_key)
                    .map(|m| selected.contains(&m))
                    .unwrap_or(false),
            })
            .map(|(doc_key, op)| (doc_key.clone(), op.clone()))
            .collect();

        Ok(json!({
            "openapi": self.openapi_version,
            "paths": { key.path(): fragments },
        }))
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    fn server_urls(&self) -> Option<Vec<String>> {
        let servers = self.document.get("servers")?.as_array()?;
        if servers.is_empty() {
            return None;
        }
        Some(
            servers
                .iter()
                .filter_map(|s| s.get("url").and_then(Value::as_str))
                .map(|url| url.trim_end_matches('/').to_string())
                .collect(),
        )
    }

    /// Resolves the base URL against the document's `servers` list.
    pub fn determine_base_url(&self, client_base_url: Option<&str>) -> GatewayResult<String> {
        let client = client_base_url
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string());

        let Some(server_urls) = self.server_urls() else {
            return client.ok_or_else(|| {
                GatewayError::Configuration(
                    "No servers defined in OpenAPI spec and client has no base_url. \
                     Either define servers in the spec or provide a client with base_url."
                        .to_string(),
                )
            });
        };

        if server_urls.is_empty() {
            return match client {
                Some(url) => {
                    warn!(
                        "OpenAPI servers have no usable url; falling back to client base_url {}",
                        url
                    );
                    Ok(url)
                }
                None => Err(GatewayError::Configuration(
                    "Invalid server definitions in OpenAPI spec".to_string(),
                )),
            };
        }

        if let Some(url) = client {
            if server_urls.contains(&url) {
                return Ok(url);
            }
            return Err(GatewayError::Configuration(format!(
                "Client base_url '{}' does not match any OpenAPI server. Available servers: {}",
                client_base_url.unwrap_or_default(),
                server_urls.join(", ")
            )));
        }

        if server_urls.len() > 1 {
            warn!(
                "Multiple servers defined in OpenAPI spec but no client base_url specified. \
                 Using first server: {}. Available servers: {}",
                server_urls[0],
                server_urls.join(", ")
            );
        }
        Ok(server_urls[0].clone())
    }

    pub fn find_matching_paths(&self, candidate: &str, prefix_match: bool) -> Vec<PathMatch> {
        self.matcher.find_matching_paths(candidate, prefix_match)
    }
}

/// Joins `base` and `path` with exactly one slash. Braces are kept verbatim.
pub fn build_full_uri(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn decoded_path(url: &str) -> String {
    let raw = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // No scheme: treat as a bare path, dropping query and fragment.
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

/// `path` without `prefix`, only when the prefix ends on a segment boundary.
fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Whether `url` addresses something under `base_url`: same scheme, host and
/// port, and a path inside the base path. Relative URLs always qualify since
/// they are joined onto the base before sending.
pub fn is_within_base_url(url: &str, base_url: &str) -> bool {
    let Ok(target) = Url::parse(url) else {
        return true;
    };
    let Ok(base) = Url::parse(base_url) else {
        return false;
    };
    if target.scheme() != base.scheme()
        || target.host_str() != base.host_str()
        || target.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }

    let base_path = decoded_path(base_url);
    let base_path = base_path.trim_end_matches('/');
    base_path.is_empty() || strip_segment_prefix(&decoded_path(url), base_path).is_some()
}

/// The document path addressed by `url`, with the base URL's own path prefix removed.
pub fn extract_path_from_url(url: &str, base_url: &str) -> String {
    let mut path = decoded_path(url);
    let base_path = decoded_path(base_url);
    let base_path = base_path.trim_end_matches('/');

    if let Some(rest) = strip_segment_prefix(&path, base_path) {
        path = rest.to_string();
    }
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    path
}
