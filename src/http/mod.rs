//! HTTP adapter subsystem.
//!
//! # Data Flow
//! ```text
//! incoming request
//!     → layer.rs (RequestContext, Timing in extensions)
//!     → handlers record stages via timing.rs
//!     → layer.rs (terminal anchor, finalize, Server-Timing header)
//!     → response to client
//! ```

pub mod context;
pub mod layer;
pub mod server;
pub mod timing;

pub use context::RequestContext;
pub use layer::{ServerTimingLayer, ServerTimingService, SERVER_TIMING};
pub use server::HttpServer;
pub use timing::{ChildScope, StageFeed, StageScope, Timing};
