//! Core functionality for the classification agent.
//!
//! This module contains:
//! - Frame parsing of `label:score` device lines
//! - Time-window aggregation and resolution
//! - The classification policy and sink dispatch
//! - The cycle driver tying them together

pub mod driver;
pub mod parser;
pub mod policy;
pub mod window;

// Re-export commonly used types
pub use driver::{Cycle, CycleDriver, RunOutcome};
pub use parser::{parse_line, ParseError, Reading};
pub use policy::{
    default_sentinels, Action, ClassificationEvent, ClassificationPolicy, Dispatcher,
    ANOMALY_LABEL, IDLE_LABEL,
};
pub use window::{Resolution, Window, WindowAggregator, WindowOutcome};
