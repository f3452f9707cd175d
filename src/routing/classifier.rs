//! Ordered route rules deciding whether a path becomes a resource or a template.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RouteRuleConfig;
use crate::openapi::{HttpMethod, SpecIndex};
use crate::utils::{GatewayError, Result as GatewayResult};

/// Component kinds a route rule may name. Only the two resource kinds are
/// accepted by the gateway; the others exist so a rule naming them can be
/// rejected instead of silently reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpType {
    Tool,
    Resource,
    ResourceTemplate,
    Exclude,
}

impl fmt::Display for McpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            McpType::Tool => "TOOL",
            McpType::Resource => "RESOURCE",
            McpType::ResourceTemplate => "RESOURCE_TEMPLATE",
            McpType::Exclude => "EXCLUDE",
        };
        f.write_str(name)
    }
}

impl FromStr for McpType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "tool" => Ok(McpType::Tool),
            "resource" => Ok(McpType::Resource),
            "resource_template" | "template" => Ok(McpType::ResourceTemplate),
            "exclude" => Ok(McpType::Exclude),
            other => Err(GatewayError::Configuration(format!(
                "Unknown route rule kind: {}",
                other
            ))),
        }
    }
}

/// The two kinds a classified path can end up as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Resource,
    ResourceTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(BTreeSet<HttpMethod>),
}

impl MethodFilter {
    fn admits(&self, methods: &[HttpMethod]) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(allowed) => methods.iter().any(|m| allowed.contains(m)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub methods: MethodFilter,
    pub pattern: Regex,
    pub tags: BTreeSet<String>,
    pub target: McpType,
}

impl RouteRule {
    /// `pattern` is matched at the start of the path, like `re.match`.
    pub fn new(methods: MethodFilter, pattern: &str, target: McpType) -> GatewayResult<Self> {
        let anchored = format!("^(?:{})", pattern);
        let pattern = Regex::new(&anchored).map_err(|e| {
            GatewayError::Configuration(format!("Invalid route pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            methods,
            pattern,
            tags: BTreeSet::new(),
            target,
        })
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, path: &str, methods: &[HttpMethod], tags: &BTreeSet<String>) -> bool {
        self.methods.admits(methods) && self.pattern.is_match(path) && self.tags.is_subset(tags)
    }
}

impl TryFrom<&RouteRuleConfig> for RouteRule {
    type Error = GatewayError;

    fn try_from(config: &RouteRuleConfig) -> Result<Self, Self::Error> {
        let methods = match &config.methods {
            None => MethodFilter::Any,
            Some(list) if list.iter().any(|m| m == "*") => MethodFilter::Any,
            Some(list) => MethodFilter::Only(
                list.iter()
                    .map(|m| m.parse::<HttpMethod>())
                    .collect::<GatewayResult<_>>()?,
            ),
        };
        let target = config.kind.parse::<McpType>()?;
        let pattern = config.pattern.as_deref().unwrap_or(".*");
        Ok(RouteRule::new(methods, pattern, target)?.with_tags(config.tags.iter().cloned()))
    }
}

/// Paths with `{param}` segments become templates, everything else a resource.
pub fn default_route_rules() -> Vec<RouteRule> {
    vec![
        RouteRule::new(MethodFilter::Any, r".*\{[^}]+\}.*", McpType::ResourceTemplate)
            .expect("default template rule is valid"),
        RouteRule::new(MethodFilter::Any, ".*", McpType::Resource)
            .expect("default resource rule is valid"),
    ]
}

pub struct Classifier {
    rules: Vec<RouteRule>,
}

impl Classifier {
    pub fn new(rules: Vec<RouteRule>) -> GatewayResult<Self> {
        if let Some(rule) = rules
            .iter()
            .find(|r| !matches!(r.target, McpType::Resource | McpType::ResourceTemplate))
        {
            return Err(GatewayError::Configuration(format!(
                "McpWebGateway only supports RESOURCE and RESOURCE_TEMPLATE types, got {} in route map",
                rule.target
            )));
        }
        Ok(Self { rules })
    }

    pub fn from_config(rules: &[RouteRuleConfig]) -> GatewayResult<Self> {
        if rules.is_empty() {
            return Ok(Self::default());
        }
        let rules = rules
            .iter()
            .map(RouteRule::try_from)
            .collect::<GatewayResult<Vec<_>>>()?;
        Self::new(rules)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn classify_with(
        &self,
        path: &str,
        methods: &[HttpMethod],
        tags: &BTreeSet<String>,
    ) -> ComponentKind {
        let target = self
            .rules
            .iter()
            .find(|rule| rule.matches(path, methods, tags))
            .map(|rule| rule.target)
            .unwrap_or(McpType::Resource);

        debug!("Classified {} as {}", path, target);
        match target {
            McpType::ResourceTemplate => ComponentKind::ResourceTemplate,
            _ => ComponentKind::Resource,
        }
    }

    pub fn classify(&self, index: &SpecIndex, path: &str) -> ComponentKind {
        let (methods, tags) = index.get_path_info(path);
        self.classify_with(path, &methods, &tags)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            rules: default_route_rules(),
        }
    }
}
