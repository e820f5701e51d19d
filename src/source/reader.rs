//! Background line reader feeding a bounded channel.
//!
//! The reader thread owns the byte stream and blocks on it; the consumer
//! only ever waits on the channel, so a read can never hold the window
//! open past its deadline.

use super::{LineSource, SourceError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Capacity of the line channel between the reader thread and the driver.
pub const LINE_CHANNEL_CAPACITY: usize = 1024;

/// One message from the reader thread: a decoded line or the error that ended it.
pub type LineMessage = Result<String, io::Error>;

/// A [`LineSource`] backed by a reader thread and a crossbeam channel.
pub struct ChannelLineSource {
    receiver: Receiver<LineMessage>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ChannelLineSource {
    /// Spawn a reader thread over `stream`.
    pub fn spawn<R>(stream: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::spawn_paced(stream, Duration::ZERO)
    }

    /// Spawn a reader thread that waits `pace` after forwarding each line.
    ///
    /// Used to replay recorded device output at roughly device speed.
    pub fn spawn_paced<R>(stream: R, pace: Duration) -> Self
    where
        R: Read + Send + 'static,
    {
        let (sender, receiver) = bounded(LINE_CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));

        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name("line-reader".into())
            .spawn(move || {
                run_reader_loop(BufReader::new(stream), sender, &thread_running, pace);
                thread_running.store(false, Ordering::SeqCst);
            })
            .ok();

        if handle.is_none() {
            tracing::error!("could not spawn line reader thread");
            running.store(false, Ordering::SeqCst);
        }

        Self {
            receiver,
            running,
            thread_handle: handle,
        }
    }

    /// Wrap an existing channel. The source closes when every sender is dropped.
    pub fn from_receiver(receiver: Receiver<LineMessage>) -> Self {
        Self {
            receiver,
            running: Arc::new(AtomicBool::new(true)),
            thread_handle: None,
        }
    }

    /// Ask the reader thread to stop.
    ///
    /// A reader blocked on a stream without a read timeout (stdin) cannot be
    /// interrupted, so the thread is joined only if it already finished.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

impl LineSource for ChannelLineSource {
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>, SourceError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(SourceError::Connection(e)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Closed),
        }
    }
}

impl Drop for ChannelLineSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_reader_loop<R: BufRead>(
    mut stream: R,
    sender: Sender<LineMessage>,
    running: &AtomicBool,
    pace: Duration,
) {
    let mut buf = Vec::with_capacity(256);

    while running.load(Ordering::SeqCst) {
        match stream.read_until(b'\n', &mut buf) {
            Ok(0) if buf.is_empty() => break,
            Ok(_) => {
                let line = decode_line(&buf);
                buf.clear();
                if sender.send(Ok(line)).is_err() {
                    break;
                }
                if !pace.is_zero() {
                    thread::sleep(pace);
                }
            }
            // Serial ports report an idle line as a timed-out read. Bytes read
            // so far stay in `buf` and the line is completed on the next call.
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                let _ = sender.send(Err(e));
                break;
            }
        }
    }
}

/// Decode one raw frame, dropping the line terminator.
fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    while end > 0 && matches!(raw[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
