//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, defaults for missing keys)
//!     → validation.rs (merge over defaults, collect warnings)
//!     → TraceConfig (resolved, immutable)
//!     → shared via Arc by every request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved
//! - All fields have defaults to allow minimal configs
//! - Unknown keys are ignored rather than rejected

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AppConfig, ObservabilityConfig, ServerConfig, TimingOptions, TraceFlags};
pub use validation::{warnings, ConfigWarning, Environment, TraceConfig};
