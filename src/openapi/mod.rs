use openapiv3::OpenAPI;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::utils::{GatewayError, Result as GatewayResult};

pub mod cache;
pub mod index;
pub mod method;

pub use cache::{SchemaCache, SchemaCacheKey, DEFAULT_SCHEMA_CACHE_CAPACITY};
pub use index::{build_full_uri, extract_path_from_url, is_within_base_url, PathEntry, SpecIndex};
pub use method::HttpMethod;

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn looks_like_yaml(location: &str) -> bool {
    let location = location.split('?').next().unwrap_or(location);
    location.ends_with(".yaml") || location.ends_with(".yml")
}

fn parse_document(content: &str, yaml: bool) -> GatewayResult<Value> {
    if yaml {
        serde_yaml::from_str(content)
            .map_err(|e| GatewayError::OpenApiSpec(format!("YAML parsing error: {}", e)))
    } else {
        serde_json::from_str(content).map_err(GatewayError::Json)
    }
}

/// Loads an OpenAPI document from a file path or an `http(s)` URL. JSON and
/// YAML are both accepted; the format follows the file extension.
pub async fn load_openapi_spec(location: &str) -> GatewayResult<Value> {
    info!("Loading OpenAPI specification from: {}", location);

    let content = if is_remote(location) {
        let response = reqwest::get(location).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::OpenApiSpec(format!(
                "Failed to fetch {}: HTTP {}",
                location, status
            )));
        }
        response.text().await?
    } else {
        tokio::fs::read_to_string(Path::new(location)).await?
    };

    let document = parse_document(&content, looks_like_yaml(location))?;
    validate_openapi_spec(&document)?;
    debug!("Successfully loaded and validated OpenAPI specification");

    Ok(document)
}

/// Structural check through `openapiv3`. A document with no paths is valid.
pub fn validate_openapi_spec(document: &Value) -> GatewayResult<OpenAPI> {
    let version = document
        .get("openapi")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Validation("OpenAPI version is required".to_string()))?;

    if !version.starts_with("3.") {
        return Err(GatewayError::Validation(format!(
            "Unsupported OpenAPI version: {}. Only 3.x is supported",
            version
        )));
    }

    let spec: OpenAPI = serde_json::from_value(document.clone())
        .map_err(|e| GatewayError::OpenApiSpec(format!("Invalid OpenAPI document: {}", e)))?;

    if spec.info.title.is_empty() {
        return Err(GatewayError::Validation("API title is required".to_string()));
    }

    debug!("OpenAPI specification validation passed");
    Ok(spec)
}
