//! Time-window aggregation of device readings.
//!
//! Readings are collected into a fixed-duration window (default 100ms).
//! Within a window each label keeps only its most recent score, and the
//! window resolves to the label with the highest score.

use crate::core::parser::{parse_line, Reading};
use crate::source::{LineSource, SourceError};
use crate::stats::SharedStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The winning reading of a window, if it received any.
pub type Resolution = Option<Reading>;

/// An open accumulation window.
#[derive(Debug, Clone)]
pub struct Window {
    /// When the window opened
    start: Instant,
    /// How long the window stays open
    duration: Duration,
    /// Latest score per label, in first-seen order
    scores: Vec<Reading>,
}

impl Window {
    /// Open a new empty window now.
    pub fn open(duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            duration,
            scores: Vec::new(),
        }
    }

    /// Record a reading, replacing any earlier score for the same label.
    ///
    /// A replaced label keeps its original position.
    pub fn record(&mut self, reading: Reading) {
        match self.scores.iter_mut().find(|r| r.label == reading.label) {
            Some(existing) => existing.score = reading.score,
            None => self.scores.push(reading),
        }
    }

    /// Latest score recorded for `label`.
    pub fn score(&self, label: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|r| r.label == label)
            .map(|r| r.score)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Number of distinct labels seen.
    pub fn label_count(&self) -> usize {
        self.scores.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.duration
    }

    /// Pick the highest-scoring label. Ties go to the label seen first.
    pub fn resolve(&self) -> Resolution {
        let mut best: Option<&Reading> = None;
        for reading in &self.scores {
            if best.map_or(true, |b| reading.score > b.score) {
                best = Some(reading);
            }
        }
        best.cloned()
    }
}

/// How a window ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// The deadline passed
    Elapsed(Resolution),
    /// The source ended before the deadline
    SourceClosed(Resolution),
    /// Shutdown was requested; the partial window was discarded
    Cancelled,
}

/// Runs one window at a time against a [`LineSource`].
pub struct WindowAggregator {
    window_duration: Duration,
    poll_interval: Duration,
    stats: SharedStats,
}

impl WindowAggregator {
    pub fn new(window_duration: Duration, poll_interval: Duration, stats: SharedStats) -> Self {
        Self {
            window_duration,
            poll_interval,
            stats,
        }
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    /// Collect readings until the window deadline, then resolve.
    ///
    /// Each poll waits at most `min(poll_interval, remaining)`, so the
    /// window closes on time even when the device is silent. A connection
    /// failure is returned as an error; end of stream closes the window
    /// early with whatever it holds.
    pub fn run<S>(&self, source: &mut S, shutdown: &AtomicBool) -> Result<WindowOutcome, SourceError>
    where
        S: LineSource + ?Sized,
    {
        let mut window = Window::open(self.window_duration);

        loop {
            if shutdown.load(Ordering::SeqCst) {
                debug!(labels = window.label_count(), "window cancelled");
                return Ok(WindowOutcome::Cancelled);
            }

            let wait = window.remaining().min(self.poll_interval);
            match source.read_line(wait) {
                Ok(Some(line)) => self.ingest(&mut window, &line),
                Ok(None) => {}
                Err(SourceError::Closed) => {
                    debug!(labels = window.label_count(), "source closed mid-window");
                    return Ok(WindowOutcome::SourceClosed(window.resolve()));
                }
                Err(e) => return Err(e),
            }

            if window.is_expired() {
                return Ok(WindowOutcome::Elapsed(window.resolve()));
            }
        }
    }

    fn ingest(&self, window: &mut Window, line: &str) {
        self.stats.record_line_read();
        debug!(line, "read line");

        match parse_line(line) {
            Ok(Some(reading)) => {
                self.stats.record_reading_accepted();
                window.record(reading);
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.record_parse_error();
                warn!(error = %e, "skipping malformed line");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::create_shared_stats;
    use std::collections::VecDeque;

    #[test]
    fn test_last_write_wins() {
        let mut window = Window::open(Duration::from_millis(100));
        window.record(Reading::new("a", 1.0));
        window.record(Reading::new("a", 9.0));
        window.record(Reading::new("b", 5.0));

        assert_eq!(window.score("a"), Some(9.0));
        assert_eq!(window.label_count(), 2);
        assert_eq!(window.resolve(), Some(Reading::new("a", 9.0)));
    }

    #[test]
    fn test_overwrite_can_lower_a_score() {
        let mut window = Window::open(Duration::from_millis(100));
        window.record(Reading::new("a", 9.0));
        window.record(Reading::new("b", 5.0));
        window.record(Reading::new("a", 1.0));

        assert_eq!(window.resolve(), Some(Reading::new("b", 5.0)));
    }

    #[test]
    fn test_tie_goes_to_first_seen_label() {
        let mut window = Window::open(Duration::from_millis(100));
        window.record(Reading::new("z", 0.5));
        window.record(Reading::new("a", 0.5));
        window.record(Reading::new("z", 0.5));

        assert_eq!(window.resolve().unwrap().label, "z");
    }

    #[test]
    fn test_negative_scores_still_resolve() {
        let mut window = Window::open(Duration::from_millis(100));
        window.record(Reading::new("anomaly", -3.0));
        window.record(Reading::new("idle", -7.5));

        assert_eq!(window.resolve().unwrap().label, "anomaly");
    }

    #[test]
    fn test_empty_window_resolves_to_none() {
        let window = Window::open(Duration::from_millis(100));
        assert!(window.is_empty());
        assert_eq!(window.resolve(), None);
    }

    #[test]
    fn test_window_expiry() {
        let window = Window::open(Duration::ZERO);
        assert!(window.is_expired());
        assert_eq!(window.remaining(), Duration::ZERO);
    }

    /// Replays scripted poll results; a quiet poll sleeps for the full wait.
    enum Step {
        Line(&'static str),
        Quiet,
        Closed,
        Broken,
    }

    struct Scripted {
        steps: VecDeque<Step>,
        waits: Vec<Duration>,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                waits: Vec::new(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SourceError> {
            self.waits.push(timeout);
            match self.steps.pop_front().unwrap_or(Step::Quiet) {
                Step::Line(line) => Ok(Some(line.to_string())),
                Step::Quiet => {
                    std::thread::sleep(timeout);
                    Ok(None)
                }
                Step::Closed => Err(SourceError::Closed),
                Step::Broken => Err(SourceError::Connection(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "unplugged",
                ))),
            }
        }
    }

    fn aggregator(window_ms: u64) -> (WindowAggregator, SharedStats) {
        let stats = create_shared_stats();
        let agg = WindowAggregator::new(
            Duration::from_millis(window_ms),
            Duration::from_millis(5),
            stats.clone(),
        );
        (agg, stats)
    }

    #[test]
    fn test_run_resolves_after_deadline() {
        let (agg, stats) = aggregator(30);
        let mut source = Scripted::new(vec![
            Step::Line("a:1.0"),
            Step::Line("a:9.0"),
            Step::Line("b:5.0"),
        ]);

        let started = Instant::now();
        let outcome = agg.run(&mut source, &AtomicBool::new(false)).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(outcome, WindowOutcome::Elapsed(Some(Reading::new("a", 9.0))));
        assert_eq!(stats.snapshot().readings_accepted, 3);
    }

    #[test]
    fn test_poll_never_waits_past_interval() {
        let (agg, _) = aggregator(20);
        let mut source = Scripted::new(vec![]);

        let outcome = agg.run(&mut source, &AtomicBool::new(false)).unwrap();

        assert_eq!(outcome, WindowOutcome::Elapsed(None));
        assert!(source.waits.iter().all(|w| *w <= Duration::from_millis(5)));
    }

    #[test]
    fn test_bad_lines_do_not_abort_window() {
        let (agg, stats) = aggregator(20);
        let mut source = Scripted::new(vec![
            Step::Line("label_without_colon"),
            Step::Line("label:not_a_number"),
            Step::Line("cat:0.4"),
        ]);

        let outcome = agg.run(&mut source, &AtomicBool::new(false)).unwrap();

        assert_eq!(outcome, WindowOutcome::Elapsed(Some(Reading::new("cat", 0.4))));
        let snap = stats.snapshot();
        assert_eq!(snap.lines_read, 3);
        assert_eq!(snap.parse_errors, 1);
        assert_eq!(snap.readings_accepted, 1);
    }

    #[test]
    fn test_source_closed_ends_window_early() {
        let (agg, _) = aggregator(10_000);
        let mut source = Scripted::new(vec![Step::Line("dog:0.8"), Step::Closed]);

        let outcome = agg.run(&mut source, &AtomicBool::new(false)).unwrap();
        assert_eq!(
            outcome,
            WindowOutcome::SourceClosed(Some(Reading::new("dog", 0.8)))
        );
    }

    #[test]
    fn test_connection_error_propagates() {
        let (agg, _) = aggregator(10_000);
        let mut source = Scripted::new(vec![Step::Line("dog:0.8"), Step::Broken]);

        let err = agg.run(&mut source, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, SourceError::Connection(_)));
    }

    #[test]
    fn test_shutdown_cancels_window() {
        let (agg, _) = aggregator(10_000);
        let mut source = Scripted::new(vec![Step::Line("dog:0.8")]);

        let outcome = agg.run(&mut source, &AtomicBool::new(true)).unwrap();
        assert_eq!(outcome, WindowOutcome::Cancelled);
    }

    /// Yields its lines, then raises the shutdown flag on the next read.
    struct Interrupting<'a> {
        lines: VecDeque<&'static str>,
        shutdown: &'a AtomicBool,
    }

    impl LineSource for Interrupting<'_> {
        fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, SourceError> {
            match self.lines.pop_front() {
                Some(line) => Ok(Some(line.to_string())),
                None => {
                    self.shutdown.store(true, Ordering::SeqCst);
                    Ok(None)
                }
            }
        }
    }

    #[test]
    fn test_shutdown_mid_window_discards_readings() {
        let (agg, stats) = aggregator(10_000);
        let shutdown = AtomicBool::new(false);
        let mut source = Interrupting {
            lines: VecDeque::from(["cat:0.9", "dog:0.4"]),
            shutdown: &shutdown,
        };

        let outcome = agg.run(&mut source, &shutdown).unwrap();

        assert_eq!(outcome, WindowOutcome::Cancelled);
        assert_eq!(stats.snapshot().readings_accepted, 2);
    }
}
