use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Path {0} not found in OpenAPI spec")]
    PathNotFound(String),

    #[error("URL '{url}' does not match any known resource. Known resources: {}", list_or_none(known))]
    UnknownResource { url: String, known: Vec<String> },

    #[error("Method {method} not supported for {url}. Available methods: {}", available.join(", "))]
    MethodNotSupported {
        method: String,
        url: String,
        available: Vec<String>,
    },

    #[error("No resources found matching URL {url}. Available resources: {}", list_or_none(available))]
    NoResourcesFound { url: String, available: Vec<String> },

    #[error("HTTP error {status}: {reason}{}", body.as_deref().map(|b| format!(" - {b}")).unwrap_or_default())]
    HttpStatus {
        status: u16,
        reason: String,
        body: Option<String>,
    },

    #[error("Request error: {0}")]
    Request(String),

    #[error("OpenAPI specification error: {0}")]
    OpenApiSpec(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),
}

impl GatewayError {
    /// True when the upstream refused the verb itself rather than the request.
    pub fn is_method_unsupported(&self) -> bool {
        match self {
            GatewayError::MethodNotSupported { .. } => true,
            GatewayError::HttpStatus { status, .. } => *status == 405,
            _ => false,
        }
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        GatewayError::Request(error.to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message_includes_body() {
        let error = GatewayError::HttpStatus {
            status: 404,
            reason: "Not Found".to_string(),
            body: Some(r#"{"detail":"missing"}"#.to_string()),
        };
        assert_eq!(
            error.to_string(),
            r#"HTTP error 404: Not Found - {"detail":"missing"}"#
        );

        let bare = GatewayError::HttpStatus {
            status: 500,
            reason: "Internal Server Error".to_string(),
            body: None,
        };
        assert_eq!(bare.to_string(), "HTTP error 500: Internal Server Error");
    }

    #[test]
    fn test_method_not_supported_lists_methods() {
        let error = GatewayError::MethodNotSupported {
            method: "PATCH".to_string(),
            url: "https://api.example.com/items".to_string(),
            available: vec!["GET".to_string(), "POST".to_string()],
        };
        let message = error.to_string();
        assert!(message.contains("Method PATCH not supported"));
        assert!(message.contains("Available methods: GET, POST"));
        assert!(error.is_method_unsupported());
    }
}
