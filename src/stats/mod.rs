//! Session statistics for the classification agent.
//!
//! Counters describe what the agent saw and did during the current process
//! lifetime. They are written out at exit and can be inspected with
//! `serial-class status`, but are never restored on startup.

pub mod session;

pub use session::{create_shared_stats, ClassificationStats, SharedStats, StatsSnapshot};
