//! `Server-Timing` value rendering and parsing.
//!
//! Entry layout, in stage order:
//! ```text
//! <stage>;dur=<ms>                      parent entry
//! <stage>.<index>.<child>;dur=<ms>      one per child, declaration order
//! handle.<handler>;dur=<ms>             handle stage, no children
//! total;dur=<ms>                        optional, always last
//! ```
//! Entries are joined with `,` and the value never ends with a comma.

use std::fmt;

use axum::http::Method;
use serde::Serialize;

use crate::config::TraceFlags;
use crate::trace::stage::{Stage, StageRecord};

/// How durations are written after `dur=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationFormat {
    /// Shortest decimal that round-trips the raw value.
    #[default]
    Full,
    /// Fixed number of decimal places.
    Fixed(u8),
}

impl DurationFormat {
    pub fn write(&self, millis: f64) -> String {
        match self {
            DurationFormat::Full => format!("{}", millis),
            DurationFormat::Fixed(places) => format!("{:.*}", *places as usize, millis),
        }
    }
}

/// Methods that never carry a request body, so there is nothing to parse.
pub fn is_bodiless(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::TRACE)
}

/// Render captured stage records into a `Server-Timing` value.
///
/// Returns an empty string when no stage block qualifies; `total` is only
/// appended after at least one stage block.
pub fn render(
    records: &[StageRecord],
    flags: &TraceFlags,
    method: &Method,
    format: DurationFormat,
) -> String {
    let mut ordered: Vec<&StageRecord> = records.iter().collect();
    ordered.sort_by_key(|record| record.stage.ordinal());

    let mut entries = Vec::new();
    for record in &ordered {
        if !flags.includes(record.stage) || record.is_skipped() {
            continue;
        }
        if record.stage == Stage::Parse && is_bodiless(method) {
            continue;
        }

        let stage = record.stage.as_str();
        if record.stage == Stage::Handle {
            entries.push(format!(
                "{}.{};dur={}",
                stage,
                record.root.name(),
                format.write(record.root.elapsed())
            ));
            continue;
        }

        entries.push(format!("{};dur={}", stage, format.write(record.root.elapsed())));
        for (index, child) in record.children.iter().enumerate() {
            if child.is_skipped() {
                continue;
            }
            entries.push(format!(
                "{}.{}.{};dur={}",
                stage,
                index,
                child.name(),
                format.write(child.elapsed())
            ));
        }
    }

    if entries.is_empty() {
        return String::new();
    }

    if flags.total {
        if let Some(total) = total_elapsed(&ordered) {
            entries.push(format!("total;dur={}", format.write(total)));
        }
    }

    entries.join(",")
}

/// Terminal stage end minus the earliest captured begin.
fn total_elapsed(ordered: &[&StageRecord]) -> Option<f64> {
    let start = ordered
        .iter()
        .map(|record| record.root.begin())
        .reduce(f64::min)?;
    let end = match ordered.iter().find(|record| record.stage == Stage::MapResponse) {
        Some(terminal) => terminal.root.end(),
        None => ordered
            .iter()
            .map(|record| record.root.end())
            .reduce(f64::max)?,
    };

    if end < start {
        tracing::warn!(start, end, "Trace ends before it begins, clamping total to zero");
        return Some(0.0);
    }
    Some(end - start)
}

/// Fully rendered timing value for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceReport(String);

impl TraceReport {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Parsed entries of this report.
    pub fn entries(&self) -> Vec<TimingEntry> {
        parse_header(&self.0)
    }
}

impl fmt::Display for TraceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One metric of a `Server-Timing` value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingEntry {
    pub name: String,
    pub dur: Option<f64>,
}

/// Parse a `Server-Timing` header value into its entries.
///
/// Parameters other than `dur` are ignored, as are empty metrics.
pub fn parse_header(value: &str) -> Vec<TimingEntry> {
    value
        .split(',')
        .filter_map(|metric| {
            let mut parts = metric.split(';').map(str::trim);
            let name = parts.next().filter(|name| !name.is_empty())?;
            let dur = parts
                .filter_map(|param| param.split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("dur"))
                .and_then(|(_, value)| value.trim().trim_matches('"').parse().ok());
            Some(TimingEntry {
                name: name.to_string(),
                dur,
            })
        })
        .collect()
}
