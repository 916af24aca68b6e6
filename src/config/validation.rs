//! Option resolution and validation.
//!
//! # Responsibilities
//! - Merge caller options over defaults into an immutable [`TraceConfig`]
//! - Resolve the environment-derived `enabled` default once
//! - Report non-fatal oddities; nothing here ever rejects a config
//!
//! # Design Decisions
//! - Resolution is a pure function of the options and the environment
//! - The environment is read by the caller and passed in

use std::fmt;

use crate::config::schema::{TimingOptions, TraceFlags};
use crate::gate::AllowRule;
use crate::trace::DurationFormat;

/// Deployment environment, used only to pick the `enabled` default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl Environment {
    /// Environment variable holding the deployment environment name.
    pub const VAR: &'static str = "APP_ENV";

    /// Read the environment from [`Environment::VAR`].
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(Self::VAR).ok().as_deref())
    }

    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(value) if value.trim().eq_ignore_ascii_case("production") => {
                Environment::Production
            }
            _ => Environment::Development,
        }
    }
}

/// Resolved, immutable Server-Timing configuration shared by all requests.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub enabled: bool,
    pub trace: TraceFlags,
    pub allow: AllowRule,
    pub format: DurationFormat,
}

impl TraceConfig {
    /// Merge options over defaults.
    pub fn resolve(options: TimingOptions, env: Environment) -> Self {
        Self {
            enabled: options
                .enabled
                .unwrap_or(env != Environment::Production),
            trace: options.trace,
            allow: options.allow.map(AllowRule::Fixed).unwrap_or_default(),
            format: options
                .precision
                .map(DurationFormat::Fixed)
                .unwrap_or_default(),
        }
    }

    /// Replace the allow rule, e.g. with a predicate.
    pub fn with_allow(mut self, allow: AllowRule) -> Self {
        self.allow = allow;
        self
    }
}

/// Non-fatal configuration findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    ReportUnsupported,
    NoStagesEnabled,
    ExcessivePrecision(u8),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::ReportUnsupported => {
                write!(f, "report is not supported and will be ignored")
            }
            ConfigWarning::NoStagesEnabled => {
                write!(f, "every stage is disabled, no Server-Timing value will be produced")
            }
            ConfigWarning::ExcessivePrecision(places) => {
                write!(f, "precision of {} decimal places exceeds clock resolution", places)
            }
        }
    }
}

/// Collect every warning for the given options.
pub fn warnings(options: &TimingOptions) -> Vec<ConfigWarning> {
    let mut found = Vec::new();
    if options.report {
        found.push(ConfigWarning::ReportUnsupported);
    }
    if options.trace.all_stages_disabled() {
        found.push(ConfigWarning::NoStagesEnabled);
    }
    if let Some(places) = options.precision.filter(|places| *places > 9) {
        found.push(ConfigWarning::ExcessivePrecision(places));
    }
    found
}
