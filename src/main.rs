use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_gate::config::load_config;
use request_gate::http::routes::demo_routes;
use request_gate::lifecycle::spawn_signal_handler;
use request_gate::observability::{init_logging, init_metrics};
use request_gate::{HttpServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "request-gate", version, about = "Schema-validating, rate-limited HTTP service")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "APP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("request-gate: {err}");
            std::process::exit(1);
        }
    };

    init_logging(&config.observability, config.mode)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.mode,
        bind_address = %config.listener.bind_address(),
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let routes = demo_routes(&config);
    let server = HttpServer::new(config, routes);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
