//! Serial Class Agent - windowed aggregation of classifier readings.
//!
//! An edge classifier streams `label:score` lines over a serial link. This
//! library groups those readings into short fixed windows, picks the
//! winning label of each window, and hands it to a classification log and
//! a live display.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Serial Class Agent                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │   Source    │──▶│   Window    │──▶│   Policy    │         │
//! │  │ (serial rx) │   │ (100ms bins)│   │ (sentinels) │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │                                         │       │            │
//! │                                         ▼       ▼            │
//! │                                  ┌──────────┐ ┌──────────┐   │
//! │                                  │ Class log│ │ Display  │   │
//! │                                  └──────────┘ └──────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use serial_class_agent::{config::Config, source};
//!
//! let config = Config::default();
//! let _device = source::open_serial(&config.serial_settings())
//!     .expect("Failed to open serial port");
//! ```

pub mod config;
pub mod core;
pub mod sink;
pub mod source;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use crate::core::{
    parse_line, ClassificationEvent, ClassificationPolicy, CycleDriver, Dispatcher, ParseError,
    Reading, RunOutcome, WindowAggregator,
};
pub use sink::{ClassLog, Display, DisplayStyle, FileClassLog, TerminalDisplay};
pub use source::{ChannelLineSource, LineSource, SourceError};
pub use stats::{ClassificationStats, SharedStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
