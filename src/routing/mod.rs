pub mod classifier;
pub mod matcher;

pub use classifier::{default_route_rules, Classifier, ComponentKind, McpType, MethodFilter, RouteRule};
pub use matcher::{extract_parameter_names, has_path_parameters, PathMatch, PathMatcher};
