pub mod client;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod openapi;
pub mod resources;
pub mod routing;
pub mod server;
pub mod utils;

pub use client::{HttpTransport, InProcessTransport, OutboundRequest, ReqwestTransport, TransportResponse};
pub use config::Config;
pub use dispatch::{DispatchOutcome, DispatchRequest};
pub use gateway::{GatewayOptions, HostApplication, McpWebGateway};
pub use openapi::{load_openapi_spec, HttpMethod, SpecIndex};
pub use server::GatewayMcpServer;
pub use utils::{GatewayError, Result};
