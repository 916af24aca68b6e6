//! Server-Timing trace aggregation for request pipelines.
//!
//! Pipeline stages report begin/end events (and those of their children);
//! each request's events are assembled in fixed stage order into a single
//! `Server-Timing` value, which an allow rule then exposes or suppresses.

pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod observability;
pub mod trace;

pub use config::{Environment, TraceConfig};
pub use error::TimingError;
pub use gate::AllowRule;
pub use http::{RequestContext, ServerTimingLayer, Timing, SERVER_TIMING};
pub use trace::{Stage, TraceAssembler, TraceReport};
