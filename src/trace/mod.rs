//! Trace aggregation and formatting.
//!
//! # Data Flow
//! ```text
//! stage events
//!     → stage.rs (StageTracker → StageRecord)
//!     → assembler.rs (fixed stage order, one handle per request)
//!     → render.rs (Server-Timing value)
//!     → gate (attach or suppress)
//! ```

pub mod assembler;
pub mod render;
pub mod span;
pub mod stage;

pub use assembler::{TraceAssembler, TraceHandle};
pub use render::{is_bodiless, parse_header, render, DurationFormat, TimingEntry, TraceReport};
pub use span::{Clock, Span};
pub use stage::{stage_channel, Stage, StageEvent, StageProbe, StageRecord, StageTracker};
