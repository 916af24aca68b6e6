//! Timed intervals and the per-request clock.

use std::time::Instant;

/// Name given to spans whose producer supplied none.
pub const ANONYMOUS: &str = "anon";

/// A single timed unit of work, immutable once finalized.
///
/// Timestamps are milliseconds relative to the request's [`Clock`] origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    name: String,
    begin: f64,
    end: f64,
    skip: bool,
}

impl Span {
    /// Create a finalized span.
    pub fn new(name: impl Into<String>, begin: f64, end: f64) -> Self {
        Self {
            name: name.into(),
            begin,
            end,
            skip: false,
        }
    }

    /// Mark the span as having performed no meaningful work.
    pub fn skipped(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn begin(&self) -> f64 {
        self.begin
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    /// Returns false when the end timestamp precedes the begin timestamp.
    pub fn is_consistent(&self) -> bool {
        self.end >= self.begin
    }

    /// Elapsed milliseconds, clamped to zero for inconsistent spans.
    pub fn elapsed(&self) -> f64 {
        if self.is_consistent() {
            self.end - self.begin
        } else {
            0.0
        }
    }
}

/// Monotonic millisecond clock anchored at the start of a request.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    /// Start a clock at the current instant.
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock started.
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1_000.0
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}
