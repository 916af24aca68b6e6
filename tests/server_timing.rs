//! End-to-end tests of the Server-Timing layer.

use std::convert::Infallible;

use axum::http::{Method, StatusCode};
use axum::routing::get as get_route;
use axum::Router;

use server_timing::config::{Environment, TimingOptions, TraceConfig, TraceFlags};
use server_timing::trace::parse_header;
use server_timing::{AllowRule, RequestContext, ServerTimingLayer, Stage, Timing};

mod common;

use common::{demo_app, entry_names, get, send, server_timing, trace_config};

fn handler_only_app(config: TraceConfig) -> Router {
    Router::new()
        .route(
            "/",
            get_route(|timing: Timing| async move {
                timing.handle("demo", async { "Server Timing" }).await
            }),
        )
        .route("/plain", get_route(|| async { "plain" }))
        .layer(ServerTimingLayer::new(config))
}

#[tokio::test]
async fn test_reports_every_stage() {
    let res = get(demo_app(trace_config(TimingOptions::default())), "/").await;
    assert_eq!(res.status(), StatusCode::OK);

    let timing = server_timing(&res).expect("Server-Timing missing");
    for expected in [
        "request;dur=",
        "request.0.init;dur=",
        "beforeHandle;dur=",
        "beforeHandle.0.a;dur=",
        "beforeHandle.1.b;dur=",
        "handle.demo;dur=",
        "afterHandle;dur=",
        "afterHandle.0.afterHandle;dur=",
        "total;dur=",
    ] {
        assert!(timing.contains(expected), "{} not in {}", expected, timing);
    }
}

#[tokio::test]
async fn test_entries_follow_stage_order() {
    let res = get(demo_app(trace_config(TimingOptions::default())), "/").await;
    let timing = server_timing(&res).unwrap();

    assert_eq!(
        entry_names(&timing),
        [
            "request",
            "request.0.init",
            "beforeHandle",
            "beforeHandle.0.a",
            "beforeHandle.1.b",
            "handle.demo",
            "afterHandle",
            "afterHandle.0.afterHandle",
            "total",
        ]
    );
    assert!(!timing.ends_with(','));
    for entry in parse_header(&timing) {
        let dur = entry.dur.expect("every entry carries dur");
        assert!(dur >= 0.0, "{} has negative duration", entry.name);
    }
}

#[tokio::test]
async fn test_handler_metric_formatting() {
    let res = get(handler_only_app(trace_config(TimingOptions::default())), "/").await;
    let timing = server_timing(&res).unwrap();

    let entries = parse_header(&timing);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "handle.demo");
    assert!(entries[0].dur.is_some());
    assert_eq!(entries[1].name, "total");
    assert!(entries[1].dur.is_some());
}

#[tokio::test]
async fn test_handler_metric_formatting_without_total() {
    let options = TimingOptions {
        trace: TraceFlags {
            total: false,
            ..TraceFlags::default()
        },
        ..TimingOptions::default()
    };
    let res = get(handler_only_app(trace_config(options)), "/").await;
    let timing = server_timing(&res).unwrap();

    assert_eq!(entry_names(&timing), ["handle.demo"]);
    assert!(timing.starts_with("handle.demo;dur="));
}

#[tokio::test]
async fn test_untimed_route_has_no_header() {
    let res = get(handler_only_app(trace_config(TimingOptions::default())), "/plain").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(server_timing(&res).is_none());
}

#[tokio::test]
async fn test_excludes_disabled_stages() {
    let options = TimingOptions {
        trace: TraceFlags {
            request: false,
            before_handle: false,
            total: false,
            ..TraceFlags::default()
        },
        ..TimingOptions::default()
    };
    let res = get(demo_app(trace_config(options)), "/").await;
    let timing = server_timing(&res).unwrap();

    assert!(!timing.contains("request;dur="));
    assert!(!timing.contains("request.0.init;dur="));
    assert!(!timing.contains("beforeHandle;dur="));
    assert!(!timing.contains("beforeHandle.0.a;dur="));
    assert!(!timing.contains("beforeHandle.1.b;dur="));
    assert!(timing.contains("handle.demo;dur="));
    assert!(timing.contains("afterHandle;dur="));
    assert!(timing.contains("afterHandle.0.afterHandle;dur="));
    assert!(!timing.contains("total;dur="));
}

#[tokio::test]
async fn test_get_without_parse_request_or_total() {
    let options = TimingOptions {
        trace: TraceFlags {
            parse: false,
            request: false,
            total: false,
            ..TraceFlags::default()
        },
        ..TimingOptions::default()
    };
    let res = get(demo_app(trace_config(options)), "/").await;
    let timing = server_timing(&res).unwrap();

    assert_eq!(
        entry_names(&timing),
        [
            "beforeHandle",
            "beforeHandle.0.a",
            "beforeHandle.1.b",
            "handle.demo",
            "afterHandle",
            "afterHandle.0.afterHandle",
        ]
    );
    assert!(!timing.contains("request"));
    assert!(!timing.contains("parse"));
    assert!(!timing.contains("total"));
}

#[tokio::test]
async fn test_parse_stage_depends_on_method() {
    let app = demo_app(trace_config(TimingOptions::default()));
    let res = send(app, Method::POST, "/echo", "hello").await;
    assert_eq!(res.status(), StatusCode::OK);
    let timing = server_timing(&res).unwrap();
    let names = entry_names(&timing);
    assert_eq!(names[2..5], ["parse", "parse.0.text", "handle.echo"]);

    let options = TimingOptions {
        trace: TraceFlags {
            parse: false,
            ..TraceFlags::default()
        },
        ..TimingOptions::default()
    };
    let res = send(demo_app(trace_config(options)), Method::POST, "/echo", "hello").await;
    assert!(!server_timing(&res).unwrap().contains("parse"));
}

#[tokio::test]
async fn test_error_stage() {
    let res = get(demo_app(trace_config(TimingOptions::default())), "/fail").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let names = entry_names(&server_timing(&res).unwrap());
    let handle = names.iter().position(|name| name == "handle.fail").unwrap();
    let error = names.iter().position(|name| name == "error").unwrap();
    assert!(handle < error);
    assert_eq!(names[error + 1], "error.0.report");
}

#[tokio::test]
async fn test_respects_allow_predicate() {
    let config = trace_config(TimingOptions::default()).with_allow(AllowRule::predicate(
        |ctx: RequestContext| async move { Ok::<_, Infallible>(ctx.path() != "/no-trace") },
    ));
    let app = demo_app(config);

    let res = get(app.clone(), "/no-trace").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(server_timing(&res).is_none());

    let res = get(app, "/").await;
    assert!(server_timing(&res).unwrap().contains("handle.demo;dur="));
}

#[tokio::test]
async fn test_fixed_and_deferred_allow() {
    let options = TimingOptions {
        allow: Some(false),
        ..TimingOptions::default()
    };
    let res = get(demo_app(trace_config(options)), "/").await;
    assert!(server_timing(&res).is_none());

    let config = trace_config(TimingOptions::default()).with_allow(AllowRule::deferred(async {
        tokio::task::yield_now().await;
        true
    }));
    let res = get(demo_app(config), "/").await;
    assert!(server_timing(&res).is_some());
}

#[tokio::test]
async fn test_failing_predicate_omits_header() {
    let config = trace_config(TimingOptions::default()).with_allow(AllowRule::predicate(
        |_ctx: RequestContext| async move { Err::<bool, _>("policy store unreachable") },
    ));
    let res = get(demo_app(config), "/").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(server_timing(&res).is_none());
}

#[tokio::test]
async fn test_disabled_passthrough() {
    let options = TimingOptions {
        enabled: Some(false),
        ..TimingOptions::default()
    };
    let res = get(demo_app(trace_config(options)), "/").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(server_timing(&res).is_none());

    let production = TraceConfig::resolve(TimingOptions::default(), Environment::Production);
    let res = get(demo_app(production), "/").await;
    assert!(server_timing(&res).is_none());
}

#[tokio::test]
async fn test_fixed_precision() {
    let options = TimingOptions {
        precision: Some(3),
        ..TimingOptions::default()
    };
    let res = get(demo_app(trace_config(options)), "/").await;
    let timing = server_timing(&res).unwrap();

    for metric in timing.split(',') {
        let (_, dur) = metric.split_once(";dur=").unwrap();
        let (_, fraction) = dur.split_once('.').unwrap();
        assert_eq!(fraction.len(), 3, "{}", metric);
    }
}

#[tokio::test]
async fn test_concurrent_children_keep_declaration_order() {
    let app = Router::new()
        .route(
            "/",
            get_route(|timing: Timing| async move {
                let mut before = timing.stage(Stage::BeforeHandle);
                let slow = before.declare(Some("slow"));
                let fast = before.declare(Some("fast"));
                tokio::join!(
                    async move {
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        slow.finish();
                    },
                    async move {
                        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                        fast.finish();
                    },
                );
                before.finish();
                timing.handle("demo", async { "ok" }).await
            }),
        )
        .layer(ServerTimingLayer::new(trace_config(TimingOptions::default())));

    let res = get(app, "/").await;
    assert_eq!(
        entry_names(&server_timing(&res).unwrap()),
        [
            "beforeHandle",
            "beforeHandle.0.slow",
            "beforeHandle.1.fast",
            "handle.demo",
            "total",
        ]
    );
}
