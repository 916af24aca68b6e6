//! Per-stage event capture.
//!
//! # Data Flow
//! ```text
//! pipeline stage
//!     → StageProbe (begin / child begin / child end / end events)
//!     → unbounded mpsc channel
//!     → StageTracker::capture (buffers children by declared index)
//!     → StageRecord
//! ```
//!
//! # Design Decisions
//! - Children are keyed by the index assigned when they were declared, so a
//!   child finishing early never jumps ahead of its siblings
//! - Nothing is produced until the stage's end event arrives
//! - A probe dropped before the end event yields no record

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::trace::span::{Span, ANONYMOUS};

/// A named phase of request processing, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Request,
    Parse,
    Transform,
    BeforeHandle,
    Handle,
    AfterHandle,
    Error,
    MapResponse,
}

impl Stage {
    /// Every stage in the order it is rendered.
    pub const ALL: [Stage; 8] = [
        Stage::Request,
        Stage::Parse,
        Stage::Transform,
        Stage::BeforeHandle,
        Stage::Handle,
        Stage::AfterHandle,
        Stage::Error,
        Stage::MapResponse,
    ];

    /// Name used in the `Server-Timing` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Parse => "parse",
            Stage::Transform => "transform",
            Stage::BeforeHandle => "beforeHandle",
            Stage::Handle => "handle",
            Stage::AfterHandle => "afterHandle",
            Stage::Error => "error",
            Stage::MapResponse => "mapResponse",
        }
    }

    /// Position in [`Stage::ALL`].
    pub fn ordinal(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by a pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    Begin {
        at: f64,
        name: Option<String>,
    },
    ChildBegin {
        index: usize,
        name: Option<String>,
        at: f64,
    },
    ChildEnd {
        index: usize,
        at: f64,
        skip: bool,
    },
    End {
        at: f64,
        skip: bool,
    },
}

/// Finalized timing data for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub stage: Stage,
    pub root: Span,
    /// Children in declaration order.
    pub children: Vec<Span>,
}

impl StageRecord {
    /// A stage renders nothing when skipped or when it took no time at all.
    ///
    /// The handle stage only honours the explicit skip flag.
    pub fn is_skipped(&self) -> bool {
        if self.root.is_skipped() {
            return true;
        }
        self.stage != Stage::Handle && self.root.begin() == self.root.end()
    }
}

/// Create a connected probe/tracker pair for one stage.
pub fn stage_channel(stage: Stage) -> (StageProbe, StageTracker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        StageProbe { stage, events: tx },
        StageTracker { stage, events: rx },
    )
}

/// Producer side of a stage: the pipeline reports what it observes here.
#[derive(Debug, Clone)]
pub struct StageProbe {
    stage: Stage,
    events: mpsc::UnboundedSender<StageEvent>,
}

impl StageProbe {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn begin(&self, at: f64) {
        self.send(StageEvent::Begin { at, name: None });
    }

    /// Begin a stage carrying its own name (the handler name for `handle`).
    pub fn begin_named(&self, name: impl Into<String>, at: f64) {
        self.send(StageEvent::Begin {
            at,
            name: Some(name.into()),
        });
    }

    pub fn child_begin(&self, index: usize, name: Option<&str>, at: f64) {
        self.send(StageEvent::ChildBegin {
            index,
            name: name.map(str::to_owned),
            at,
        });
    }

    pub fn child_end(&self, index: usize, at: f64) {
        self.send(StageEvent::ChildEnd {
            index,
            at,
            skip: false,
        });
    }

    pub fn child_skip(&self, index: usize, at: f64) {
        self.send(StageEvent::ChildEnd {
            index,
            at,
            skip: true,
        });
    }

    pub fn end(&self, at: f64) {
        self.send(StageEvent::End { at, skip: false });
    }

    /// End the stage, flagging that it executed no work.
    pub fn skip(&self, at: f64) {
        self.send(StageEvent::End { at, skip: true });
    }

    fn send(&self, event: StageEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!(stage = %self.stage, "Stage tracker dropped, event discarded");
        }
    }
}

/// Consumer side of a stage.
#[derive(Debug)]
pub struct StageTracker {
    stage: Stage,
    events: mpsc::UnboundedReceiver<StageEvent>,
}

impl StageTracker {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Wait for the stage to end and build its record.
    ///
    /// Returns `None` if every probe was dropped before the end event, or if
    /// the stage ended without ever beginning.
    pub async fn capture(mut self) -> Option<StageRecord> {
        let mut begin: Option<(f64, Option<String>)> = None;
        let mut pending: BTreeMap<usize, (Option<String>, f64)> = BTreeMap::new();
        let mut resolved: BTreeMap<usize, Span> = BTreeMap::new();

        while let Some(event) = self.events.recv().await {
            match event {
                StageEvent::Begin { at, name } => {
                    begin = Some((at, name));
                }
                StageEvent::ChildBegin { index, name, at } => {
                    pending.insert(index, (name, at));
                }
                StageEvent::ChildEnd { index, at, skip } => match pending.remove(&index) {
                    Some((name, started)) => {
                        let name = name.unwrap_or_else(|| ANONYMOUS.to_string());
                        resolved.insert(index, Span::new(name, started, at).skipped(skip));
                    }
                    None => {
                        tracing::warn!(stage = %self.stage, index, "Child ended without beginning");
                    }
                },
                StageEvent::End { at, skip } => {
                    let Some((started, name)) = begin else {
                        tracing::warn!(stage = %self.stage, "Stage ended without beginning");
                        return None;
                    };
                    if !pending.is_empty() {
                        tracing::warn!(
                            stage = %self.stage,
                            unresolved = pending.len(),
                            "Stage ended with unresolved children"
                        );
                    }

                    let name = name.unwrap_or_else(|| self.stage.as_str().to_string());
                    let record = StageRecord {
                        stage: self.stage,
                        root: Span::new(name, started, at).skipped(skip),
                        children: resolved.into_values().collect(),
                    };
                    self.check_clock(&record);
                    return Some(record);
                }
            }
        }

        tracing::debug!(stage = %self.stage, "Stage source closed before completion");
        None
    }

    fn check_clock(&self, record: &StageRecord) {
        let faults = std::iter::once(&record.root)
            .chain(record.children.iter())
            .filter(|span| !span.is_consistent());
        for span in faults {
            tracing::warn!(
                stage = %self.stage,
                span = span.name(),
                begin = span.begin(),
                end = span.end(),
                "Span ends before it begins, clamping duration to zero"
            );
            metrics::record_clock_fault(self.stage);
        }
    }
}
