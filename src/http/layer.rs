//! Tower middleware attaching the `Server-Timing` header.
//!
//! # Responsibilities
//! - Insert a [`Timing`] recorder into every request's extensions
//! - Record the terminal `mapResponse` anchor once the inner service responds
//! - Finalize the trace and set the header when a value is produced
//!
//! # Design Decisions
//! - Globally disabled config means full passthrough, no per-request state
//! - A request dropped before the response never produces a header
//! - A failing allow predicate is logged and the header omitted; the
//!   response itself is never affected

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue, Request, Response};
use tower::{Layer, Service};

use crate::config::TraceConfig;
use crate::http::context::RequestContext;
use crate::http::timing::Timing;
use crate::trace::{Clock, Stage, TraceAssembler};

/// Response header carrying the rendered trace.
pub const SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

/// Layer wrapping services with Server-Timing instrumentation.
#[derive(Debug, Clone)]
pub struct ServerTimingLayer {
    assembler: TraceAssembler,
}

impl ServerTimingLayer {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            assembler: TraceAssembler::new(config),
        }
    }

    pub fn from_shared(config: Arc<TraceConfig>) -> Self {
        Self {
            assembler: TraceAssembler::from_shared(config),
        }
    }
}

impl<S> Layer<S> for ServerTimingLayer {
    type Service = ServerTimingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerTimingService {
            inner,
            assembler: self.assembler.clone(),
        }
    }
}

/// Service produced by [`ServerTimingLayer`].
#[derive(Debug, Clone)]
pub struct ServerTimingService<S> {
    inner: S,
    assembler: TraceAssembler,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ServerTimingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if !self.assembler.config().enabled {
            return Box::pin(inner.call(request));
        }

        let context = RequestContext::from_request(&request);
        let (timing, mut feed) = Timing::channel(Clock::start());
        request.extensions_mut().insert(timing.clone());
        let assembler = self.assembler.clone();

        Box::pin(async move {
            let mut response = inner.call(request).await?;

            timing.stage(Stage::MapResponse).skip();
            drop(timing);

            let request_id = context.id();
            let mut handle = assembler.new_trace(context);
            feed.drain_into(&mut handle);

            match handle.finalize().await {
                Ok(Some(report)) => match HeaderValue::from_str(report.as_str()) {
                    Ok(value) => {
                        response.headers_mut().insert(SERVER_TIMING, value);
                    }
                    Err(e) => {
                        tracing::warn!(
                            request_id = %request_id,
                            error = %e,
                            "Server-Timing value is not a valid header"
                        );
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        request_id = %request_id,
                        error = %e,
                        "Allow rule failed, Server-Timing omitted"
                    );
                }
            }

            Ok(response)
        })
    }
}
