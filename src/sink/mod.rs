//! Output sinks for resolved classifications.
//!
//! The classification log receives one label per line. The display is a
//! fire-and-forget surface; nothing in the pipeline waits on it.

pub mod display;
pub mod log;

use serde::{Deserialize, Serialize};
use std::io;

pub use self::display::{render_message, TerminalDisplay};
pub use self::log::FileClassLog;

/// How the display should present a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    /// Nothing of interest (e.g. `idle`)
    Neutral,
    /// Needs attention (e.g. `anomaly`)
    Alert,
    /// A regular classification
    Normal,
}

/// Append-only store of classified labels.
pub trait ClassLog {
    /// Append `label` followed by a newline.
    fn append_label(&mut self, label: &str) -> io::Result<()>;
}

/// A live display surface.
pub trait Display {
    /// Show `text`. Must not block the caller.
    fn show_message(&self, text: &str, style: DisplayStyle);
}
