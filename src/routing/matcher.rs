//! Matching of request paths against the declared OpenAPI path set.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// A declared path that matched a candidate, with the captured `{param}` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub spec_path: String,
    pub params: HashMap<String, String>,
}

impl PathMatch {
    fn literal(spec_path: &str) -> Self {
        Self {
            spec_path: spec_path.to_string(),
            params: HashMap::new(),
        }
    }
}

struct CompiledTemplate {
    spec_path: String,
    regex: Regex,
    /// Placeholder name for each capture group, in group order.
    param_names: Vec<String>,
}

/// Precompiled view over a fixed set of declared paths.
pub struct PathMatcher {
    paths: Vec<String>,
    templates: Vec<CompiledTemplate>,
}

static PARAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}/]+)\}").expect("static parameter pattern is valid"));

pub fn has_path_parameters(path: &str) -> bool {
    path.contains('{') && path.contains('}')
}

/// Names of the `{name}` placeholders in `path`, in order of appearance.
pub fn extract_parameter_names(path: &str) -> Vec<String> {
    PARAMETER
        .captures_iter(path)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub fn normalize_path(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// Builds an anchored regex where each `{name}` captures exactly one segment.
/// Groups are positional so names like `user-id` or `api.version` need no
/// sanitizing. Literal text between placeholders is escaped.
fn template_regex(spec_path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
    let mut pattern = String::from("^");
    let mut names = Vec::new();
    let mut last = 0;

    for caps in PARAMETER.captures_iter(spec_path) {
        let whole = caps.get(0).expect("group 0 always present");
        pattern.push_str(&regex::escape(&spec_path[last..whole.start()]));
        pattern.push_str("([^/]+)");
        names.push(caps[1].to_string());
        last = whole.end();
    }
    pattern.push_str(&regex::escape(&spec_path[last..]));
    pattern.push('$');

    Ok((Regex::new(&pattern)?, names))
}

impl PathMatcher {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let templates = paths
            .iter()
            .filter(|path| has_path_parameters(path))
            .filter_map(|path| match template_regex(path) {
                Ok((regex, param_names)) => Some(CompiledTemplate {
                    spec_path: path.clone(),
                    regex,
                    param_names,
                }),
                Err(e) => {
                    warn!("Skipping unmatchable path template {}: {}", path, e);
                    None
                }
            })
            .collect();

        Self { paths, templates }
    }

    /// Exact lookup first, then the first template whose pattern matches.
    pub fn match_exact(&self, candidate: &str) -> Option<PathMatch> {
        if self.paths.iter().any(|p| p == candidate) {
            return Some(PathMatch::literal(candidate));
        }

        self.templates.iter().find_map(|template| {
            let caps = template.regex.captures(candidate)?;
            let mut params = HashMap::new();
            for (group, name) in template.param_names.iter().enumerate() {
                if let Some(value) = caps.get(group + 1) {
                    // A repeated name keeps its first value.
                    params
                        .entry(name.clone())
                        .or_insert_with(|| value.as_str().to_string());
                }
            }
            Some(PathMatch {
                spec_path: template.spec_path.clone(),
                params,
            })
        })
    }

    /// Every declared path under `prefix`, breadth-first: fewer slashes first,
    /// then lexicographic.
    pub fn match_prefix(&self, prefix: &str) -> Vec<PathMatch> {
        let prefix = normalize_path(prefix);
        let mut matches: Vec<PathMatch> = self
            .paths
            .iter()
            .filter(|path| normalize_path(path).starts_with(prefix))
            .map(|path| PathMatch::literal(path))
            .collect();

        matches.sort_by(|a, b| {
            let depth_a = a.spec_path.matches('/').count();
            let depth_b = b.spec_path.matches('/').count();
            depth_a.cmp(&depth_b).then_with(|| a.spec_path.cmp(&b.spec_path))
        });
        matches
    }

    pub fn find_matching_paths(&self, candidate: &str, prefix_match: bool) -> Vec<PathMatch> {
        if prefix_match {
            self.match_prefix(candidate)
        } else {
            self.match_exact(candidate).into_iter().collect()
        }
    }
}
