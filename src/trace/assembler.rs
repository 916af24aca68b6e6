//! Per-request trace assembly.
//!
//! # Data Flow
//! ```text
//! TraceAssembler (shared, one per app)
//!     → new_trace(ctx) → TraceHandle (one per request)
//!     → attach_stage(stage, tracker) as stages start
//!     → finalize():
//!         1. capture every stage, strictly in stage order
//!         2. render the full value
//!         3. ask the allow gate whether to expose it
//! ```
//!
//! # Design Decisions
//! - Rendering always runs to completion before the gate is consulted
//! - A stage that never completes is treated like a disabled one
//! - A dropped handle never produces a value

use std::sync::Arc;

use crate::config::TraceConfig;
use crate::error::TimingError;
use crate::http::RequestContext;
use crate::observability::metrics;
use crate::trace::render::{render, TraceReport};
use crate::trace::stage::{Stage, StageTracker};

/// Creates traces sharing one immutable configuration.
#[derive(Debug, Clone)]
pub struct TraceAssembler {
    config: Arc<TraceConfig>,
}

impl TraceAssembler {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn from_shared(config: Arc<TraceConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Start a trace for one request.
    pub fn new_trace(&self, context: RequestContext) -> TraceHandle {
        TraceHandle {
            config: Arc::clone(&self.config),
            context,
            stages: Default::default(),
        }
    }
}

/// Single-owner trace state for one request.
#[derive(Debug)]
pub struct TraceHandle {
    config: Arc<TraceConfig>,
    context: RequestContext,
    stages: [Option<StageTracker>; Stage::ALL.len()],
}

impl TraceHandle {
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Register the event source for a stage. The first registration wins.
    pub fn attach_stage(&mut self, stage: Stage, tracker: StageTracker) {
        let slot = &mut self.stages[stage.ordinal()];
        if slot.is_some() {
            tracing::debug!(
                request_id = %self.context.id(),
                stage = %stage,
                "Stage already attached, ignoring duplicate"
            );
            return;
        }
        *slot = Some(tracker);
    }

    /// Wait for every attached stage, render, then apply the allow gate.
    ///
    /// Returns `Ok(None)` when nothing was rendered or the gate said no.
    pub async fn finalize(self) -> Result<Option<TraceReport>, TimingError> {
        let mut records = Vec::new();
        for tracker in self.stages.into_iter().flatten() {
            if let Some(record) = tracker.capture().await {
                records.push(record);
            }
        }

        let value = render(
            &records,
            &self.config.trace,
            self.context.method(),
            self.config.format,
        );

        let allowed = match self.config.allow.decide(&self.context).await {
            Ok(allowed) => allowed,
            Err(e) => {
                metrics::record_report("failed");
                return Err(e);
            }
        };

        if value.is_empty() {
            metrics::record_report("empty");
            return Ok(None);
        }
        if !allowed {
            tracing::debug!(request_id = %self.context.id(), "Server-Timing suppressed by allow rule");
            metrics::record_report("suppressed");
            return Ok(None);
        }

        tracing::trace!(
            request_id = %self.context.id(),
            stages = records.len(),
            value = %value,
            "Server-Timing assembled"
        );
        metrics::record_report("attached");
        Ok(Some(TraceReport::new(value)))
    }
}
