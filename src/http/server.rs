//! Demo HTTP server.
//!
//! # Responsibilities
//! - Create the Axum Router with demo handlers
//! - Wire up middleware (tracing, Server-Timing, request hooks)
//! - Serve until Ctrl+C
//!
//! Each handler times its own stages through the [`Timing`] extractor:
//! - `GET /`: request hook `init`, before-handle `a` and `b`, handler `demo`, one after-handle
//! - `GET /no-trace`: handler `hi`, meant to be excluded by an allow predicate
//! - `POST /echo`: parse stage reading the body, handler `echo`
//! - `GET /fail`: handler `fail` followed by an error stage

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::TraceConfig;
use crate::http::layer::ServerTimingLayer;
use crate::http::timing::Timing;
use crate::trace::Stage;

/// Largest body `/echo` accepts.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// HTTP server exposing the demo routes.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given timing configuration.
    pub fn new(config: TraceConfig) -> Self {
        Self {
            router: Self::build_router(config),
        }
    }

    fn build_router(config: TraceConfig) -> Router {
        Router::new()
            .route("/", get(demo_handler))
            .route("/no-trace", get(no_trace_handler))
            .route("/echo", post(echo_handler))
            .route("/fail", get(fail_handler))
            .layer(middleware::from_fn(request_hooks))
            .layer(ServerTimingLayer::new(config))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn delay() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Request-stage hooks shared by every route.
async fn request_hooks(timing: Timing, request: Request<Body>, next: Next) -> Response {
    let mut stage = timing.stage(Stage::Request);
    stage.child(Some("init"), delay()).await;
    stage.finish();

    next.run(request).await
}

async fn demo_handler(timing: Timing) -> &'static str {
    let mut before = timing.stage(Stage::BeforeHandle);
    before.child(Some("a"), delay()).await;
    before.child(Some("b"), delay()).await;
    before.finish();

    let body = timing.handle("demo", async { "Server Timing" }).await;

    let mut after = timing.stage(Stage::AfterHandle);
    after.child(Some("afterHandle"), delay()).await;
    after.finish();

    body
}

async fn no_trace_handler(timing: Timing) -> &'static str {
    timing.handle("hi", async { "hi" }).await
}

async fn echo_handler(timing: Timing, body: Body) -> Result<String, StatusCode> {
    let mut parse = timing.stage(Stage::Parse);
    let bytes = parse
        .child(Some("text"), axum::body::to_bytes(body, MAX_BODY_BYTES))
        .await;
    parse.finish();

    let bytes = bytes.map_err(|e| {
        tracing::debug!(error = %e, "Failed to read request body");
        StatusCode::BAD_REQUEST
    })?;

    Ok(timing
        .handle("echo", async move { String::from_utf8_lossy(&bytes).into_owned() })
        .await)
}

async fn fail_handler(timing: Timing) -> (StatusCode, &'static str) {
    let outcome: Result<&'static str, &'static str> =
        timing.handle("fail", async { Err("upstream unavailable") }).await;

    match outcome {
        Ok(body) => (StatusCode::OK, body),
        Err(reason) => {
            let mut error = timing.stage(Stage::Error);
            error
                .child(Some("report"), async {
                    tracing::warn!(reason, "Handler failed");
                    delay().await;
                })
                .await;
            error.finish();
            (StatusCode::SERVICE_UNAVAILABLE, reason)
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
