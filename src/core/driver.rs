//! The aggregate-then-dispatch cycle.

use crate::core::policy::{ClassificationEvent, Dispatcher};
use crate::core::window::{WindowAggregator, WindowOutcome};
use crate::sink::{ClassLog, Display};
use crate::source::{LineSource, SourceError};
use std::sync::atomic::AtomicBool;
use tracing::{debug, info};

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Shutdown was requested
    Shutdown,
    /// The source reached end of stream
    SourceClosed,
}

/// Result of one window cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// The classification, if the window received any readings
    pub event: Option<ClassificationEvent>,
    /// Set when the run should stop after this cycle
    pub stop: Option<RunOutcome>,
}

/// Drives windows back to back until shutdown, end of stream or a fatal
/// source error.
pub struct CycleDriver<L, D> {
    aggregator: WindowAggregator,
    dispatcher: Dispatcher<L, D>,
}

impl<L: ClassLog, D: Display> CycleDriver<L, D> {
    pub fn new(aggregator: WindowAggregator, dispatcher: Dispatcher<L, D>) -> Self {
        Self {
            aggregator,
            dispatcher,
        }
    }

    /// Run one window and dispatch its resolution.
    ///
    /// A cancelled window dispatches nothing.
    pub fn run_cycle<S>(&mut self, source: &mut S, shutdown: &AtomicBool) -> Result<Cycle, SourceError>
    where
        S: LineSource + ?Sized,
    {
        let (resolution, stop) = match self.aggregator.run(source, shutdown)? {
            WindowOutcome::Elapsed(resolution) => (resolution, None),
            WindowOutcome::SourceClosed(resolution) => (resolution, Some(RunOutcome::SourceClosed)),
            WindowOutcome::Cancelled => {
                return Ok(Cycle {
                    event: None,
                    stop: Some(RunOutcome::Shutdown),
                })
            }
        };

        let event = self.dispatcher.dispatch(resolution);
        Ok(Cycle { event, stop })
    }

    /// Run cycles until the run ends.
    ///
    /// Connection errors are returned to the caller; there is no reconnect.
    pub fn run<S>(&mut self, source: &mut S, shutdown: &AtomicBool) -> Result<RunOutcome, SourceError>
    where
        S: LineSource + ?Sized,
    {
        info!(
            window_ms = self.aggregator.window_duration().as_millis() as u64,
            "classification loop started"
        );

        loop {
            let cycle = self.run_cycle(source, shutdown)?;
            if let Some(stop) = cycle.stop {
                debug!(?stop, "classification loop finished");
                return Ok(stop);
            }
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<L, D> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<L, D> {
        &mut self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::ClassificationPolicy;
    use crate::sink::DisplayStyle;
    use crate::source::ChannelLineSource;
    use crate::stats::create_shared_stats;
    use crossbeam_channel::bounded;
    use std::cell::RefCell;
    use std::io;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[derive(Default)]
    struct MemoryLog(Vec<String>);

    impl ClassLog for MemoryLog {
        fn append_label(&mut self, label: &str) -> io::Result<()> {
            self.0.push(label.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryDisplay(RefCell<Vec<(String, DisplayStyle)>>);

    impl Display for MemoryDisplay {
        fn show_message(&self, text: &str, style: DisplayStyle) {
            self.0.borrow_mut().push((text.to_string(), style));
        }
    }

    fn driver(window_ms: u64) -> CycleDriver<MemoryLog, MemoryDisplay> {
        let stats = create_shared_stats();
        CycleDriver::new(
            WindowAggregator::new(
                Duration::from_millis(window_ms),
                Duration::from_millis(5),
                stats.clone(),
            ),
            Dispatcher::new(
                ClassificationPolicy::default(),
                MemoryLog::default(),
                MemoryDisplay::default(),
                stats,
            ),
        )
    }

    #[test]
    fn test_silent_window_makes_no_sink_calls() {
        let (_sender, receiver) = bounded(4);
        let mut source = ChannelLineSource::from_receiver(receiver);
        let mut driver = driver(20);

        let cycle = driver.run_cycle(&mut source, &AtomicBool::new(false)).unwrap();

        assert_eq!(cycle, Cycle { event: None, stop: None });
        assert!(driver.dispatcher().log().0.is_empty());
        assert!(driver.dispatcher().display().0.borrow().is_empty());
    }

    #[test]
    fn test_run_until_source_closes() {
        let (sender, receiver) = bounded(4);
        sender.send(Ok("cat:0.9".to_string())).unwrap();
        sender.send(Ok("idle:0.2".to_string())).unwrap();
        drop(sender);

        let mut source = ChannelLineSource::from_receiver(receiver);
        let mut driver = driver(10_000);

        let outcome = driver.run(&mut source, &AtomicBool::new(false)).unwrap();

        assert_eq!(outcome, RunOutcome::SourceClosed);
        assert_eq!(driver.dispatcher().log().0, vec!["cat"]);
    }

    #[test]
    fn test_shutdown_writes_nothing() {
        let (sender, receiver) = bounded(4);
        sender.send(Ok("cat:0.9".to_string())).unwrap();
        let mut source = ChannelLineSource::from_receiver(receiver);
        let mut driver = driver(10_000);

        let shutdown = AtomicBool::new(false);
        shutdown.store(true, Ordering::SeqCst);
        let outcome = driver.run(&mut source, &shutdown).unwrap();

        assert_eq!(outcome, RunOutcome::Shutdown);
        assert!(driver.dispatcher().log().0.is_empty());
        drop(sender);
    }

    /// Yields its lines, then raises the shutdown flag on the next read.
    struct Interrupting<'a> {
        lines: Vec<&'static str>,
        shutdown: &'a AtomicBool,
    }

    impl LineSource for Interrupting<'_> {
        fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, SourceError> {
            if self.lines.is_empty() {
                self.shutdown.store(true, Ordering::SeqCst);
                return Ok(None);
            }
            Ok(Some(self.lines.remove(0).to_string()))
        }
    }

    #[test]
    fn test_shutdown_mid_window_makes_no_sink_calls() {
        let shutdown = AtomicBool::new(false);
        let mut source = Interrupting {
            lines: vec!["cat:0.9", "anomaly:0.5"],
            shutdown: &shutdown,
        };
        let mut driver = driver(10_000);

        let cycle = driver.run_cycle(&mut source, &shutdown).unwrap();
        assert_eq!(
            cycle,
            Cycle {
                event: None,
                stop: Some(RunOutcome::Shutdown)
            }
        );
        assert!(driver.dispatcher().log().0.is_empty());
        assert!(driver.dispatcher().display().0.borrow().is_empty());

        let outcome = driver.run(&mut source, &shutdown).unwrap();
        assert_eq!(outcome, RunOutcome::Shutdown);
        assert!(driver.dispatcher().log().0.is_empty());
    }

    #[test]
    fn test_connection_loss_is_returned() {
        let (sender, receiver) = bounded(4);
        sender
            .send(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")))
            .unwrap();
        let mut source = ChannelLineSource::from_receiver(receiver);
        let mut driver = driver(10_000);

        let err = driver.run(&mut source, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, SourceError::Connection(_)));
    }
}
