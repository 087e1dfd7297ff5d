//! Byte streams feeding the operator panel decoder
//!
//! The decoder only needs blocking single-byte reads. A source may also give
//! up waiting after a timeout and report [`ReadOutcome::Idle`]; the worker uses
//! those gaps to notice a stop request, which is what bounds shutdown latency.
//! Sources without a timeout keep the worker parked until the next byte or
//! until the stream closes.

use rppal::uart::{Parity, Uart};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Result of one read attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Byte(u8),
    /// No data arrived within the source's read timeout
    Idle,
    /// The stream ended; no more bytes will follow
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to open serial device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rppal::uart::Error,
    },

    #[error("Failed to configure serial device {path}: {source}")]
    Configure {
        path: PathBuf,
        #[source]
        source: rppal::uart::Error,
    },

    #[error("Byte source unusable: {0}")]
    Unusable(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Blocking byte stream consumed by the decoder thread
pub trait ByteSource: Send {
    /// Checks that the source can be read from before a worker is spawned
    fn validate(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<ReadOutcome>;

    /// Short label for log lines
    fn describe(&self) -> String;
}

/// Serial device opened through the UART driver, 8N1
pub struct SerialSource {
    uart: Uart,
    path: PathBuf,
}

impl SerialSource {
    /// Opens `path` at `baud_rate`; reads give up after `read_timeout` so the
    /// worker can observe stop requests. A zero timeout blocks indefinitely.
    ///
    /// The port counts the timeout in tenths of a second, so it is rounded up
    /// to the next tenth and capped at 25.5 s. Rounding down would turn a
    /// short timeout into a non-blocking poll.
    pub fn open(
        path: impl AsRef<Path>,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening serial device {} at {} baud", path.display(), baud_rate);

        let mut uart = Uart::with_path(&path, baud_rate, Parity::None, 8, 1).map_err(|source| {
            SourceError::Open {
                path: path.clone(),
                source,
            }
        })?;

        let read_timeout = port_read_timeout(read_timeout);
        let min_length = if read_timeout.is_zero() { 1 } else { 0 };
        uart.set_read_mode(min_length, read_timeout)
            .map_err(|source| SourceError::Configure {
                path: path.clone(),
                source,
            })?;

        info!("Serial device {} ready", path.display());
        Ok(Self { uart, path })
    }
}

fn port_read_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        return timeout;
    }
    let tenths = timeout.as_millis().div_ceil(100).min(255) as u64;
    Duration::from_millis(tenths * 100)
}

impl ByteSource for SerialSource {
    fn read_byte(&mut self) -> io::Result<ReadOutcome> {
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte) {
            Ok(0) => Ok(ReadOutcome::Idle),
            Ok(_) => Ok(ReadOutcome::Byte(byte[0])),
            Err(rppal::uart::Error::Io(e)) => Err(e),
            Err(e) => Err(io::Error::new(ErrorKind::Other, e.to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("serial {}", self.path.display())
    }
}

/// Adapts any [`Read`] implementation (pipes, files, in-memory streams)
///
/// End of stream maps to [`ReadOutcome::Closed`]; `WouldBlock`, `TimedOut`
/// and `Interrupted` map to [`ReadOutcome::Idle`].
pub struct ReaderSource<R> {
    reader: R,
    label: String,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader,
            label: label.into(),
        }
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    fn read_byte(&mut self) -> io::Result<ReadOutcome> {
        let mut byte = [0u8; 1];
        match self.reader.read(&mut byte) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(_) => Ok(ReadOutcome::Byte(byte[0])),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(ReadOutcome::Idle)
            }
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
