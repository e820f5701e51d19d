//! Classification policy: what to do with a resolved window.
//!
//! Sentinel labels are display-only and never reach the classification
//! log. The sentinel table is plain data so new sentinels can be added from
//! configuration without touching parsing or aggregation.

use crate::core::window::Resolution;
use crate::sink::{ClassLog, Display, DisplayStyle};
use crate::stats::SharedStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Label the device reports when nothing is happening.
pub const IDLE_LABEL: &str = "idle";
/// Label the device reports for out-of-distribution input.
pub const ANOMALY_LABEL: &str = "anomaly";

/// The built-in sentinel table.
pub fn default_sentinels() -> BTreeMap<String, DisplayStyle> {
    BTreeMap::from([
        (IDLE_LABEL.to_string(), DisplayStyle::Neutral),
        (ANOMALY_LABEL.to_string(), DisplayStyle::Alert),
    ])
}

/// The externally visible effect of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Empty window; touch nothing
    Skip,
    /// Sentinel label; show it but keep it out of the log
    DisplayOnly { label: String, style: DisplayStyle },
    /// Regular label; log it and show it
    LogAndDisplay { label: String },
}

/// One classification decision, emitted per resolved window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEvent {
    pub label: String,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    /// Value of the classification counter after this event
    pub sequence: u64,
}

/// Maps resolutions to actions.
#[derive(Debug, Clone)]
pub struct ClassificationPolicy {
    sentinels: BTreeMap<String, DisplayStyle>,
}

impl ClassificationPolicy {
    pub fn new(sentinels: BTreeMap<String, DisplayStyle>) -> Self {
        Self { sentinels }
    }

    pub fn is_sentinel(&self, label: &str) -> bool {
        self.sentinels.contains_key(label)
    }

    pub fn decide(&self, resolution: &Resolution) -> Action {
        let Some(reading) = resolution else {
            return Action::Skip;
        };
        match self.sentinels.get(&reading.label) {
            Some(style) => Action::DisplayOnly {
                label: reading.label.clone(),
                style: *style,
            },
            None => Action::LogAndDisplay {
                label: reading.label.clone(),
            },
        }
    }
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self::new(default_sentinels())
    }
}

/// Applies policy decisions to the sinks.
///
/// This is the only writer of the display and the log.
pub struct Dispatcher<L, D> {
    policy: ClassificationPolicy,
    log: L,
    display: D,
    stats: SharedStats,
}

impl<L: ClassLog, D: Display> Dispatcher<L, D> {
    pub fn new(policy: ClassificationPolicy, log: L, display: D, stats: SharedStats) -> Self {
        Self {
            policy,
            log,
            display,
            stats,
        }
    }

    /// Act on one resolution. Returns the event if the window resolved.
    ///
    /// A failed log write is reported and counted; the display is still
    /// updated.
    pub fn dispatch(&mut self, resolution: Resolution) -> Option<ClassificationEvent> {
        let action = self.policy.decide(&resolution);
        let reading = resolution?;

        let sequence = self.stats.record_classification();

        match &action {
            Action::Skip => {}
            Action::DisplayOnly { label, style } => {
                match style {
                    DisplayStyle::Neutral => self.stats.record_idle(),
                    DisplayStyle::Alert => {
                        self.stats.record_anomaly();
                        warn!(label = %label, score = reading.score, "sentinel alert");
                    }
                    DisplayStyle::Normal => {}
                }
                self.display.show_message(label, *style);
            }
            Action::LogAndDisplay { label } => {
                match self.log.append_label(label) {
                    Ok(()) => self.stats.record_label_logged(),
                    Err(e) => {
                        self.stats.record_log_failure();
                        error!(label = %label, error = %e, "could not write classification log");
                    }
                }
                self.display.show_message(label, DisplayStyle::Normal);
            }
        }

        info!(
            label = %reading.label,
            score = reading.score,
            total = sequence,
            "classified"
        );

        Some(ClassificationEvent {
            label: reading.label,
            score: reading.score,
            timestamp: Utc::now(),
            sequence,
        })
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
}
