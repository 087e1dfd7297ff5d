//! Operator panel link worker
//!
//! Owns one byte source and drives it through a two-state machine:
//!
//! ```text
//! Validating ──validate()──► Decoding ──run()──► (thread exits)
//! ```
//!
//! Validation happens on the caller's thread so a bad source is reported
//! before any thread exists. [`OiLink::run`] is the body of the decoder
//! thread: it reads one byte at a time, feeds the [`FrameDecoder`] and
//! publishes every completed frame into the shared [`ChannelBuffer`].
//!
//! # Shutdown
//!
//! Cancellation is checked between reads. A read that is already blocked
//! finishes first, so shutdown waits for the next byte, the source's read
//! timeout, or the stream closing, whichever comes first.

use crate::input::byte_source::{ByteSource, ReadOutcome, SourceError};
use crate::input::channel_buffer::ChannelBuffer;
use crate::input::oi_frame::{FrameCounters, FrameDecoder};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Link statistics shared between the decoder thread and the hub
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OiStats {
    pub bytes_read: u64,
    pub frames: u64,
    pub short_frames: u64,
    pub overflow_bytes: u64,
    pub last_frame_at: Option<DateTime<Local>>,
}

impl OiStats {
    fn apply(&mut self, counters: FrameCounters) {
        self.frames = counters.frames;
        self.short_frames = counters.short_frames;
        self.overflow_bytes = counters.overflow_bytes;
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Validating,
    Decoding,
}

#[machine]
pub struct OiLink<S: LinkState> {
    source: Box<dyn ByteSource>,
    decoder: FrameDecoder,
    buffer: Arc<ChannelBuffer>,
    cancel: CancellationToken,
    stats: Arc<Mutex<OiStats>>,
}

impl OiLink<Validating> {
    pub fn create(
        source: Box<dyn ByteSource>,
        decoder: FrameDecoder,
        buffer: Arc<ChannelBuffer>,
        cancel: CancellationToken,
        stats: Arc<Mutex<OiStats>>,
    ) -> Self {
        assert_eq!(
            decoder.channel_count(),
            buffer.len(),
            "decoder and buffer disagree on channel count"
        );
        debug!("Creating OI link for {}", source.describe());
        Self::new(source, decoder, buffer, cancel, stats)
    }

    /// Checks the source and transitions to Decoding
    pub fn validate(mut self) -> Result<OiLink<Decoding>, SourceError> {
        if let Err(e) = self.source.validate() {
            error!("OI source {} unusable: {}", self.source.describe(), e);
            return Err(e);
        }
        info!("OI source {} validated", self.source.describe());
        Ok(self.transition())
    }
}

impl OiLink<Decoding> {
    /// Decoder thread body; returns when cancelled, on end of stream, or on a
    /// read error
    pub fn run(mut self) {
        let label = self.source.describe();
        info!("Starting OI decoder loop on {}", label);

        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);
        let mut frames_at_last_log = 0u64;

        while !self.cancel.is_cancelled() {
            match self.source.read_byte() {
                Ok(ReadOutcome::Byte(byte)) => self.handle_byte(byte),
                Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::Closed) => {
                    warn!("OI source {} closed", label);
                    break;
                }
                Err(e) => {
                    error!("Error reading OI source {}: {}", label, e);
                    break;
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                let frames = self.decoder.counters().frames;
                info!(
                    "OI decoder stats: {} frames in last {} seconds, {} total",
                    frames - frames_at_last_log,
                    log_interval.num_seconds(),
                    frames
                );
                frames_at_last_log = frames;
                last_log_time = now;
            }
        }

        info!("OI decoder loop on {} finished", label);
    }

    fn handle_byte(&mut self, byte: u8) {
        let frame = self.decoder.push(byte);

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.bytes_read += 1;
        if let Some(channels) = frame {
            self.buffer.publish(&channels);
            stats.apply(self.decoder.counters());
            stats.last_frame_at = Some(Local::now());
        }
    }
}
