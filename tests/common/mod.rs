//! Shared utilities for integration tests.

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use tower::ServiceExt;

use server_timing::config::{Environment, TimingOptions, TraceConfig};
use server_timing::http::HttpServer;
use server_timing::trace::parse_header;
use server_timing::SERVER_TIMING;

/// Resolve options as a development deployment would.
pub fn trace_config(options: TimingOptions) -> TraceConfig {
    TraceConfig::resolve(options, Environment::Development)
}

/// The demo server's router.
pub fn demo_app(config: TraceConfig) -> Router {
    HttpServer::new(config).router()
}

/// Send one request through the router.
pub async fn send(app: Router, method: Method, path: &str, body: &'static str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(format!("http://localhost:8080{}", path))
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, path: &str) -> Response<Body> {
    send(app, Method::GET, path, "").await
}

/// The Server-Timing value of a response, if any.
pub fn server_timing(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(SERVER_TIMING)
        .map(|value| value.to_str().unwrap().to_string())
}

/// Metric names in header order.
#[allow(dead_code)]
pub fn entry_names(value: &str) -> Vec<String> {
    parse_header(value).into_iter().map(|entry| entry.name).collect()
}
