//! Terminal display rendered on its own thread.

use super::{Display, DisplayStyle};
use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::io::{IsTerminal, Write};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

const DISPLAY_QUEUE: usize = 64;

struct DisplayMessage {
    text: String,
    style: DisplayStyle,
    shown_at: DateTime<Local>,
}

/// Prints classifications to stdout from a dedicated thread.
///
/// `show_message` only enqueues; when the queue is full the message is
/// dropped rather than stalling ingestion.
pub struct TerminalDisplay {
    sender: Option<Sender<DisplayMessage>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(DISPLAY_QUEUE);
        let color = std::io::stdout().is_terminal();

        let handle = thread::Builder::new()
            .name("display".into())
            .spawn(move || run_render_loop(receiver, color));

        match handle {
            Ok(handle) => Self {
                sender: Some(sender),
                thread_handle: Some(handle),
            },
            Err(e) => {
                error!(error = %e, "could not start display thread");
                Self {
                    sender: None,
                    thread_handle: None,
                }
            }
        }
    }

    /// Flush queued messages and stop the render thread.
    pub fn close(&mut self) {
        self.sender.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TerminalDisplay {
    fn show_message(&self, text: &str, style: DisplayStyle) {
        let Some(sender) = &self.sender else {
            return;
        };
        let message = DisplayMessage {
            text: text.to_string(),
            style,
            shown_at: Local::now(),
        };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => debug!(text = %m.text, "display queue full, dropping"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_render_loop(receiver: Receiver<DisplayMessage>, color: bool) {
    let stdout = std::io::stdout();
    for message in receiver {
        let line = render_message(&message.text, message.style, &message.shown_at, color);
        let mut out = stdout.lock();
        if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
            break;
        }
    }
}

/// Format one display line.
pub fn render_message(
    text: &str,
    style: DisplayStyle,
    shown_at: &DateTime<Local>,
    color: bool,
) -> String {
    let time = shown_at.format("%H:%M:%S");
    let body = match style {
        DisplayStyle::Normal => format!("> {text}"),
        DisplayStyle::Neutral => format!("  {text}"),
        DisplayStyle::Alert => format!("! {}", text.to_uppercase()),
    };

    if !color {
        return format!("[{time}] {body}");
    }

    let ansi = match style {
        DisplayStyle::Normal => "\x1b[1;32m",
        DisplayStyle::Neutral => "\x1b[2m",
        DisplayStyle::Alert => "\x1b[1;31m",
    };
    format!("[{time}] {ansi}{body}\x1b[0m")
}
