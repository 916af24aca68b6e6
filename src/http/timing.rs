//! Handler-facing recording API.
//!
//! [`Timing`] is inserted into request extensions by the Server-Timing layer
//! and extracted by handlers and middleware to time their stages:
//!
//! ```ignore
//! async fn demo(timing: Timing) -> &'static str {
//!     let mut before = timing.stage(Stage::BeforeHandle);
//!     before.child(Some("auth"), check_auth()).await;
//!     before.finish();
//!
//!     timing.handle("demo", async { "ok" }).await
//! }
//! ```
//!
//! Without the layer (or with it disabled) every call is a no-op.

use std::convert::Infallible;
use std::future::Future;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tokio::sync::mpsc;

use crate::trace::{stage_channel, Clock, Stage, StageProbe, StageTracker, TraceHandle};

type StageSender = mpsc::UnboundedSender<(Stage, StageTracker)>;

/// Per-request recorder handle. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Timing {
    sink: Option<Sink>,
}

#[derive(Debug, Clone)]
struct Sink {
    clock: Clock,
    stages: StageSender,
}

impl Timing {
    /// Create a recorder and the feed its stages arrive on.
    pub fn channel(clock: Clock) -> (Timing, StageFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timing = Timing {
            sink: Some(Sink { clock, stages: tx }),
        };
        (timing, StageFeed { stages: rx })
    }

    /// A recorder that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Open a stage, beginning now.
    pub fn stage(&self, stage: Stage) -> StageScope {
        let Some(active) = self.open(stage) else {
            return StageScope::inactive();
        };
        active.probe.begin(active.clock.now());
        StageScope {
            active: Some(active),
            next_child: 0,
            skip: false,
        }
    }

    /// Time the route handler itself under the given name.
    pub async fn handle<F>(&self, name: &str, handler: F) -> F::Output
    where
        F: Future,
    {
        let Some(active) = self.open(Stage::Handle) else {
            return handler.await;
        };
        active.probe.begin_named(name, active.clock.now());
        let output = handler.await;
        active.probe.end(active.clock.now());
        output
    }

    fn open(&self, stage: Stage) -> Option<ActiveStage> {
        let sink = self.sink.as_ref()?;
        let (probe, tracker) = stage_channel(stage);
        if sink.stages.send((stage, tracker)).is_err() {
            tracing::trace!(stage = %stage, "Trace already finalized, stage not recorded");
            return None;
        }
        Some(ActiveStage {
            probe,
            clock: sink.clock,
        })
    }
}

impl<S> FromRequestParts<S> for Timing
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Timing>().cloned().unwrap_or_default())
    }
}

/// Receiving end of the stages opened through a [`Timing`].
#[derive(Debug)]
pub struct StageFeed {
    stages: mpsc::UnboundedReceiver<(Stage, StageTracker)>,
}

impl StageFeed {
    /// Attach every stage opened so far, in the order they were opened.
    pub fn drain_into(&mut self, handle: &mut TraceHandle) {
        while let Ok((stage, tracker)) = self.stages.try_recv() {
            handle.attach_stage(stage, tracker);
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveStage {
    probe: StageProbe,
    clock: Clock,
}

/// An open stage. Dropping it ends the stage.
#[derive(Debug)]
pub struct StageScope {
    active: Option<ActiveStage>,
    next_child: usize,
    skip: bool,
}

impl StageScope {
    fn inactive() -> Self {
        Self {
            active: None,
            next_child: 0,
            skip: false,
        }
    }

    /// Declare the next child, beginning now.
    ///
    /// The child's position is fixed here, so children that run concurrently
    /// render in declaration order whatever order they finish in.
    pub fn declare(&mut self, name: Option<&str>) -> ChildScope {
        let index = self.next_child;
        self.next_child += 1;
        if let Some(active) = &self.active {
            active.probe.child_begin(index, name, active.clock.now());
        }
        ChildScope {
            active: self.active.clone(),
            index,
            skip: false,
        }
    }

    /// Run one child to completion.
    pub async fn child<F>(&mut self, name: Option<&str>, work: F) -> F::Output
    where
        F: Future,
    {
        let child = self.declare(name);
        let output = work.await;
        child.finish();
        output
    }

    /// End the stage now.
    pub fn finish(self) {
        drop(self);
    }

    /// End the stage, flagging that it did no work.
    pub fn skip(mut self) {
        self.skip = true;
    }
}

impl Drop for StageScope {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let at = active.clock.now();
            if self.skip {
                active.probe.skip(at);
            } else {
                active.probe.end(at);
            }
        }
    }
}

/// A declared child of a stage. Dropping it ends the child.
#[derive(Debug)]
pub struct ChildScope {
    active: Option<ActiveStage>,
    index: usize,
    skip: bool,
}

impl ChildScope {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn finish(self) {
        drop(self);
    }

    /// End the child, flagging that it did no work.
    pub fn skip(mut self) {
        self.skip = true;
    }
}

impl Drop for ChildScope {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let at = active.clock.now();
            if self.skip {
                active.probe.child_skip(self.index, at);
            } else {
                active.probe.child_end(self.index, at);
            }
        }
    }
}
