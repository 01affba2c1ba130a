//! Serial link to the probe line.
//!
//! Owns the physical connection and nothing else: discovery, connect with
//! indefinite retry, one-frame reads, and the consecutive-failure
//! escalation that tears the port down so the owner reconnects before the
//! next read. Frame content is decoded here but not interpreted.

pub mod codec;

use std::time::Duration;

use futures::stream::StreamExt;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::FramedRead;
use tracing::{info, warn};

pub use codec::RawPoint;
use codec::LineCodec;

#[cfg(unix)]
pub const DEFAULT_PATTERN: &str = "ttyUSB";

#[cfg(windows)]
pub const DEFAULT_PATTERN: &str = "COM";

/// Why a cycle yielded no readings.
#[derive(Error, Debug)]
pub enum FrameError {
    /// I/O or byte-level decode failure; counts toward reconnect escalation.
    #[error("no data, reason: {0}")]
    Transport(String),
    /// The line arrived intact but is not a reading frame.
    #[error("unexpected frame: {0}")]
    Content(String),
}

/// Counts consecutive transport failures up to a teardown threshold.
#[derive(Debug)]
struct FailureTracker {
    count: u32,
    max: u32,
}

impl FailureTracker {
    fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    /// Records one failure; true when the threshold is now exceeded.
    fn record(&mut self) -> bool {
        self.count += 1;
        self.count > self.max
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

pub struct Link<S = SerialStream>
where
    S: AsyncRead + Unpin,
{
    pattern: String,
    baud: u32,
    retry: Duration,
    failures: FailureTracker,
    reader: Option<FramedRead<S, LineCodec>>,
}

impl<S> Link<S>
where
    S: AsyncRead + Unpin,
{
    /// A link in the `Disconnected` state. `retry` paces reconnect
    /// attempts and bounds every read.
    pub fn new(pattern: &str, baud: u32, retry: Duration, max_failures: u32) -> Self {
        Self {
            pattern: pattern.to_string(),
            baud,
            retry,
            failures: FailureTracker::new(max_failures),
            reader: None,
        }
    }

    pub fn connected(&self) -> bool {
        self.reader.is_some()
    }

    pub(crate) fn attach(&mut self, stream: S) {
        self.reader = Some(FramedRead::new(stream, LineCodec));
        self.failures.reset();
    }

    /// Reads one newline-delimited frame, waiting at most one retry
    /// interval. A device that stays silent past that bound is a
    /// transport failure like any other.
    ///
    /// Transport failures are counted; past the configured maximum the
    /// port is dropped and `connected()` turns false, so the owner must
    /// call `connect()` before the next read attempt.
    pub async fn read_frame(&mut self) -> Result<Vec<RawPoint>, FrameError> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Err(FrameError::Transport("not connected".to_string())),
        };
        match tokio::time::timeout(self.retry, reader.next()).await {
            Ok(Some(Ok(line))) => {
                self.failures.reset();
                codec::parse_frame(line.trim()).map_err(FrameError::Content)
            }
            Ok(Some(Err(e))) => {
                self.note_failure();
                Err(FrameError::Transport(e.to_string()))
            }
            Ok(None) => {
                self.note_failure();
                Err(FrameError::Transport("stream closed".to_string()))
            }
            Err(_) => {
                self.note_failure();
                Err(FrameError::Transport("read timed out".to_string()))
            }
        }
    }

    fn note_failure(&mut self) {
        if self.failures.record() {
            warn!(
                "more than {} consecutive read failures, dropping the connection",
                self.failures.max
            );
            self.reader = None;
        }
    }
}

impl Link<SerialStream> {
    /// Enumerates serial devices and opens the first matching the expected
    /// name pattern. Never gives up: on no device or open failure it waits
    /// one retry interval and tries again.
    pub async fn connect(&mut self) {
        loop {
            match self.discover() {
                None => {
                    warn!(
                        "Could not find any serial device, retrying in {:?}",
                        self.retry
                    );
                }
                Some(name) => match tokio_serial::new(&name, self.baud).open_native_async() {
                    Ok(port) => {
                        #[cfg(unix)]
                        let port = {
                            let mut port = port;
                            if let Err(e) = port.set_exclusive(false) {
                                warn!("Unable to set {} non-exclusive: {}", name, e);
                            }
                            port
                        };
                        info!("Connected to probe line on {}", name);
                        self.attach(port);
                        return;
                    }
                    Err(e) => {
                        warn!("Failed to open {}: {}, retrying in {:?}", name, e, self.retry);
                    }
                },
            }
            tokio::time::sleep(self.retry).await;
        }
    }

    fn discover(&self) -> Option<String> {
        let ports = tokio_serial::available_ports().ok()?;
        ports
            .into_iter()
            .map(|p| p.port_name)
            .find(|name| name.contains(&self.pattern))
    }
}
