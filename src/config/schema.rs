//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section is optional and unknown keys are ignored.

use serde::{Deserialize, Serialize};

use crate::trace::Stage;

/// Root configuration for the demo server binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener settings.
    pub server: ServerConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Server-Timing options.
    pub timing: TimingOptions,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Caller-supplied Server-Timing options, before defaults are resolved.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TimingOptions {
    /// Push reports to the client as server-sent events. Accepted but unused.
    pub report: bool,

    /// Master switch. Unset means "on unless running in production".
    pub enabled: Option<bool>,

    /// Fixed allow decision. Unset means always attach.
    pub allow: Option<bool>,

    /// Decimal places for durations. Unset keeps full precision.
    pub precision: Option<u8>,

    /// Per-stage inclusion flags.
    pub trace: TraceFlags,
}

/// Which stages are included in the rendered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraceFlags {
    pub request: bool,
    pub parse: bool,
    pub transform: bool,
    pub before_handle: bool,
    pub handle: bool,
    pub after_handle: bool,
    pub error: bool,
    pub map_response: bool,
    /// Append a `total` entry spanning the whole trace.
    pub total: bool,
}

impl TraceFlags {
    /// Whether the given stage's block is rendered.
    pub fn includes(&self, stage: Stage) -> bool {
        match stage {
            Stage::Request => self.request,
            Stage::Parse => self.parse,
            Stage::Transform => self.transform,
            Stage::BeforeHandle => self.before_handle,
            Stage::Handle => self.handle,
            Stage::AfterHandle => self.after_handle,
            Stage::Error => self.error,
            Stage::MapResponse => self.map_response,
        }
    }

    /// True when no stage block can ever be rendered.
    pub fn all_stages_disabled(&self) -> bool {
        Stage::ALL.iter().all(|stage| !self.includes(*stage))
    }
}

impl Default for TraceFlags {
    fn default() -> Self {
        Self {
            request: true,
            parse: true,
            transform: true,
            before_handle: true,
            handle: true,
            after_handle: true,
            error: true,
            map_response: true,
            total: true,
        }
    }
}
