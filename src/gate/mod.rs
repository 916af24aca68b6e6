//! Allow gate.
//!
//! Runs strictly after the timing value has been rendered; it only decides
//! whether the value is exposed on the response.

pub mod allow;

pub use allow::AllowRule;
