pub mod component;
pub mod registry;

pub use component::{build_parameter_schema, GatewayResource, GatewayTemplate, RegistryEntry};
pub use registry::Registry;
