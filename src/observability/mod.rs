//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! trace / http subsystems produce:
//!     → logging.rs (structured log events, request_id correlated)
//!     → metrics.rs (outcome and clock-fault counters)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
