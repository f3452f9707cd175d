use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use mcp_web_gateway::{
    load_openapi_spec, Config, GatewayMcpServer, GatewayOptions, McpWebGateway, ReqwestTransport,
};

#[derive(Parser)]
#[command(name = "mcp-web-gateway")]
#[command(about = "Expose an OpenAPI-described web API to MCP agents as resources and REST verbs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// OpenAPI document, as a file path or http(s) URL
    #[arg(long, global = true)]
    spec_path: Option<String>,

    /// Base URL of the target API (must match one of the document's servers if any)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Let the REST tools reach URLs outside the documented paths
    #[arg(long, global = true)]
    open_world: bool,

    /// Do not register the GET/POST/PUT/PATCH/DELETE/OPTIONS tools
    #[arg(long, global = true)]
    no_rest_tools: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio (default)
    Run,
    /// Load the document and build the gateway without serving
    Validate,
    /// Print the resources and templates derived from the document
    ListResources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the MCP protocol
    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.parse()?),
        )
        .init();

    let mut config = Config::load(cli.spec_path.as_deref())?;
    if cli.base_url.is_some() {
        config.base_url = cli.base_url.clone();
    }
    if cli.open_world {
        config.open_world = true;
    }
    if cli.no_rest_tools {
        config.add_rest_tools = false;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Validate => validate(config).await,
        Commands::ListResources => list_resources(config).await,
    }
}

async fn build_gateway(config: &Config) -> Result<McpWebGateway> {
    let Some(spec_path) = config.spec_path.as_deref() else {
        bail!("No OpenAPI specification given. Pass --spec-path or set spec_path in mcp-web-gateway.toml");
    };

    let document = load_openapi_spec(spec_path).await?;
    let transport = ReqwestTransport::new(config, config.base_url.clone())?;
    let options = GatewayOptions::from_config(config)?;

    Ok(McpWebGateway::new(document, Arc::new(transport), options)?)
}

async fn run_server(config: Config) -> Result<()> {
    let gateway = build_gateway(&config).await?;
    info!("Serving {} at {}", gateway.name(), gateway.base_url());

    GatewayMcpServer::new(Arc::new(gateway)).serve_stdio().await
}

async fn validate(config: Config) -> Result<()> {
    info!("Validating gateway configuration");
    let gateway = build_gateway(&config).await?;

    println!("Configuration is valid.");
    println!("Name:       {}", gateway.name());
    println!("Base URL:   {}", gateway.base_url());
    println!("Open world: {}", gateway.open_world());
    println!("Resources:  {}", gateway.resources().count());
    println!("Templates:  {}", gateway.templates().count());
    println!("Tools:      {}", gateway.tools().len());

    Ok(())
}

async fn list_resources(config: Config) -> Result<()> {
    let gateway = build_gateway(&config).await?;

    let methods = |list: &[mcp_web_gateway::HttpMethod]| {
        list.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    };

    println!("Resources ({}):", gateway.resources().count());
    for resource in gateway.resources() {
        println!("  {} [{}]", resource.uri, methods(resource.methods()));
    }
    println!("Templates ({}):", gateway.templates().count());
    for template in gateway.templates() {
        println!("  {} [{}]", template.uri_template, methods(template.methods()));
    }

    Ok(())
}
