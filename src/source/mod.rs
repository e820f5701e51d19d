//! Line sources for the classifier device.
//!
//! A line source yields decoded text lines, one per device frame. The
//! serial implementation and the replay implementation share the same
//! background-reader machinery in [`reader`].

pub mod reader;
pub mod serial;

use std::time::Duration;
use thiserror::Error;

pub use reader::ChannelLineSource;
pub use serial::{list_ports, open_replay, open_serial, PortSummary, SerialSettings};

/// A source of decoded text lines.
pub trait LineSource {
    /// Wait up to `timeout` for the next line.
    ///
    /// Returns `Ok(None)` when no line arrived in time. End of stream is
    /// reported as [`SourceError::Closed`].
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SourceError>;
}

/// Errors raised by a line source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The serial port could not be opened or configured
    #[error("could not open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// The replay input could not be opened
    #[error("could not open replay input {path}: {source}")]
    Replay {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The device link dropped while reading
    #[error("device connection lost: {0}")]
    Connection(#[from] std::io::Error),

    /// The stream ended
    #[error("line source closed")]
    Closed,
}

impl SourceError {
    /// Whether this error should terminate the process with a failure code.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::Closed)
    }
}
