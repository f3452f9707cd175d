use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const CONFIG_STEM: &str = "mcp-web-gateway";
const ENV_PREFIX: &str = "MCP_WEB_GATEWAY_";

/// A route rule as written in a config file. `kind` is one of `resource` or
/// `resource_template`; `methods` absent or containing `*` means any method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRuleConfig {
    #[serde(default)]
    pub methods: Option<Vec<String>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spec_path: Option<String>,
    pub base_url: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_seconds: Option<u64>,
    pub name: Option<String>,
    pub open_world: bool,
    pub add_rest_tools: bool,
    pub route_rules: Vec<RouteRuleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec_path: None,
            base_url: None,
            headers: HashMap::new(),
            timeout_seconds: Some(30),
            name: None,
            open_world: false,
            add_rest_tools: true,
            route_rules: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the layered configuration from the working directory and the
    /// `MCP_WEB_GATEWAY_*` environment.
    pub fn load(spec_path: Option<&str>) -> Result<Self> {
        Self::load_from(Path::new("."), spec_path)
    }

    pub fn load_from(dir: &Path, spec_path: Option<&str>) -> Result<Self> {
        let mut config: Config = Self::figment(dir)
            .extract()
            .context("Failed to read gateway configuration")?;

        if let Some(path) = spec_path {
            config.spec_path = Some(path.to_string());
        }

        Ok(config)
    }

    fn figment(dir: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(dir.join(format!("{CONFIG_STEM}.toml"))))
            .merge(Json::file(dir.join(format!("{CONFIG_STEM}.json"))))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds.unwrap_or(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_files() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path(), None).unwrap();

        assert_eq!(config.timeout_seconds, Some(30));
        assert!(config.add_rest_tools);
        assert!(!config.open_world);
        assert!(config.route_rules.is_empty());
        assert!(config.spec_path.is_none());
    }

    #[test]
    fn test_toml_file_and_spec_override() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("mcp-web-gateway.toml"),
            r#"
spec_path = "from-file.yaml"
base_url = "https://api.example.com"
open_world = true
timeout_seconds = 5

[headers]
X-Api-Version = "2"

[[route_rules]]
pattern = "/reports"
methods = ["GET"]
kind = "resource_template"
"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path(), Some("cli.json")).unwrap();
        assert_eq!(config.spec_path.as_deref(), Some("cli.json"));
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert!(config.open_world);
        assert!(config.add_rest_tools);
        assert_eq!(config.timeout(), std::time::Duration::from_secs(5));
        assert_eq!(config.headers.get("X-Api-Version").map(String::as_str), Some("2"));
        assert_eq!(config.route_rules.len(), 1);
        assert_eq!(config.route_rules[0].kind, "resource_template");
        assert!(config.route_rules[0].tags.is_empty());
    }

    #[test]
    fn test_json_file_overrides_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mcp-web-gateway.toml"), "name = \"from-toml\"\n").unwrap();
        fs::write(
            dir.path().join("mcp-web-gateway.json"),
            r#"{"name": "from-json", "add_rest_tools": false}"#,
        )
        .unwrap();

        let config = Config::load_from(dir.path(), None).unwrap();
        assert_eq!(config.name.as_deref(), Some("from-json"));
        assert!(!config.add_rest_tools);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mcp-web-gateway.toml"), "open_world = \"sometimes\"\n").unwrap();
        assert!(Config::load_from(dir.path(), None).is_err());
    }
}
