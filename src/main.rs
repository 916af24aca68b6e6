//! Server-Timing demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ ServerTimingLayer ─▶ request hooks ─▶ handler
//!                                        │                    │              │
//!                                        │      Timing (request extension) records stages
//!                                        ▼
//!     Client Response ◀── Server-Timing header ◀── finalize (render, then allow gate)
//! ```
//!
//! Configuration is read from the TOML file named by `SERVER_TIMING_CONFIG`,
//! if set. `APP_ENV=production` turns timing off unless the file enables it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;

use tokio::net::TcpListener;

use server_timing::config::{self, AppConfig, Environment, TraceConfig};
use server_timing::http::{HttpServer, RequestContext};
use server_timing::observability::{logging, metrics};
use server_timing::AllowRule;

/// Environment variable naming the config file.
const CONFIG_VAR: &str = "SERVER_TIMING_CONFIG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app_config = match std::env::var_os(CONFIG_VAR) {
        Some(path) => config::load_config(Path::new(&path))?,
        None => AppConfig::default(),
    };

    logging::init_logging(&logging::default_filter(&app_config.observability.log_level));

    tracing::info!("server-timing v0.1.0 starting");

    for warning in config::warnings(&app_config.timing) {
        tracing::warn!(%warning, "Configuration warning");
    }

    let environment = Environment::from_env();
    let trace_config = TraceConfig::resolve(app_config.timing.clone(), environment);
    let trace_config = match app_config.timing.allow {
        Some(_) => trace_config,
        None => trace_config.with_allow(AllowRule::predicate(|ctx: RequestContext| async move {
            Ok::<_, Infallible>(ctx.path() != "/no-trace")
        })),
    };

    tracing::info!(
        bind_address = %app_config.server.bind_address,
        environment = ?environment,
        enabled = trace_config.enabled,
        allow = ?trace_config.allow,
        "Configuration loaded"
    );

    if app_config.observability.metrics_enabled {
        match app_config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %app_config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&app_config.server.bind_address).await?;

    let server = HttpServer::new(trace_config);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
