//! Sentinel-delimited frame decoding for the operator panel link
//!
//! The panel streams its switch states as frames of up to [`PAYLOAD_BYTES`]
//! payload bytes terminated by [`SENTINEL`]. Channel `i` is bit `i % 8` of
//! payload byte `i / 8`, least significant bit first.
//!
//! ```text
//! ... b0 b1 b2 b3 0xFF b0 b1 b2 b3 0xFF ...
//!     └─ payload ─┘ └ publish
//! ```
//!
//! Misaligned frames are absorbed, not rejected:
//!
//! - more than [`PAYLOAD_BYTES`] bytes before a sentinel keep overwriting the
//!   last payload slot
//! - fewer bytes leave the unfilled slots holding whatever the previous frame
//!   wrote there, unless [`FrameDecoder::with_clear_on_sentinel`] is enabled
//!
//! Either way the stream realigns at the next complete frame.

use tracing::trace;

/// Frame terminator; never valid as a payload byte
pub const SENTINEL: u8 = 255;

/// Payload slots per frame, enough for 32 channels
pub const PAYLOAD_BYTES: usize = 4;

/// Highest channel count a frame can carry
pub const MAX_CHANNELS: usize = PAYLOAD_BYTES * 8;

/// Unpacks `channel_count` channels from `payload`, LSB first within each byte
///
/// Channels past the end of `payload` read as released.
pub fn unpack_channels(payload: &[u8], channel_count: usize) -> Vec<bool> {
    (0..channel_count)
        .map(|i| {
            payload
                .get(i / 8)
                .map_or(false, |byte| byte & (1 << (i % 8)) != 0)
        })
        .collect()
}

/// Protocol counters kept by a [`FrameDecoder`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCounters {
    /// Frames completed by a sentinel
    pub frames: u64,
    /// Frames that ended before every payload slot was written
    pub short_frames: u64,
    /// Payload bytes that landed on an already written last slot
    pub overflow_bytes: u64,
}

/// Byte-at-a-time frame assembler
#[derive(Clone, Debug)]
pub struct FrameDecoder {
    payload: [u8; PAYLOAD_BYTES],
    cursor: usize,
    received: usize,
    channel_count: usize,
    clear_on_sentinel: bool,
    counters: FrameCounters,
}

impl FrameDecoder {
    pub fn new(channel_count: usize) -> Self {
        Self {
            payload: [0; PAYLOAD_BYTES],
            cursor: 0,
            received: 0,
            channel_count,
            clear_on_sentinel: false,
            counters: FrameCounters::default(),
        }
    }

    /// Zero the payload after every frame so short frames read unfilled
    /// slots as released instead of repeating the previous frame's bytes.
    pub fn with_clear_on_sentinel(mut self, clear: bool) -> Self {
        self.clear_on_sentinel = clear;
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Raw payload slots as they will be unpacked at the next sentinel
    pub fn payload(&self) -> &[u8; PAYLOAD_BYTES] {
        &self.payload
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    /// Feeds one byte; returns the decoded channels when `byte` ends a frame
    pub fn push(&mut self, byte: u8) -> Option<Vec<bool>> {
        if byte == SENTINEL {
            return Some(self.finish_frame());
        }

        if self.received >= PAYLOAD_BYTES {
            self.counters.overflow_bytes += 1;
            trace!(byte, "payload overflow, overwriting last slot");
        }

        self.payload[self.cursor] = byte;
        if self.cursor < PAYLOAD_BYTES - 1 {
            self.cursor += 1;
        }
        self.received += 1;
        None
    }

    fn finish_frame(&mut self) -> Vec<bool> {
        if self.received < PAYLOAD_BYTES {
            self.counters.short_frames += 1;
            trace!(received = self.received, "short frame");
        }
        self.counters.frames += 1;

        let channels = unpack_channels(&self.payload, self.channel_count);

        self.cursor = 0;
        self.received = 0;
        if self.clear_on_sentinel {
            self.payload = [0; PAYLOAD_BYTES];
        }
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut FrameDecoder, bytes: &[u8]) -> Vec<Vec<bool>> {
        bytes.iter().filter_map(|&b| decoder.push(b)).collect()
    }

    #[test]
    fn single_bit_frame_sets_channel_zero_only() {
        let mut decoder = FrameDecoder::new(MAX_CHANNELS);
        let frames = feed(&mut decoder, &[0b0000_0001, 0, 0, 0, SENTINEL]);

        assert_eq!(frames.len(), 1);
        assert!(frames[0][0]);
        assert!(frames[0][1..].iter().all(|&c| !c));
    }

    #[test]
    fn bits_map_little_endian_within_each_byte() {
        let channels = unpack_channels(&[0b1000_0000, 0b0000_0010, 0, 0b0100_0000], 32);

        let set: Vec<usize> = channels
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| c.then_some(i))
            .collect();
        assert_eq!(set, vec![7, 9, 30]);
    }

    #[test]
    fn unpack_truncates_to_channel_count() {
        let channels = unpack_channels(&[0xFF, 0xFF, 0, 0], 12);
        assert_eq!(channels.len(), 12);
        assert!(channels.iter().all(|&c| c));
    }

    #[test]
    fn channels_beyond_payload_read_released() {
        let channels = unpack_channels(&[0xFF], 12);
        assert!(channels[..8].iter().all(|&c| c));
        assert!(channels[8..].iter().all(|&c| !c));
    }

    #[test]
    fn sentinel_only_input_publishes_empty_frames() {
        let mut decoder = FrameDecoder::new(24);
        let frames = feed(&mut decoder, &[SENTINEL, SENTINEL]);

        assert_eq!(frames.len(), 2);
        assert!(frames[1].iter().all(|&c| !c));
        assert_eq!(decoder.counters().short_frames, 2);
    }

    #[test]
    fn extra_bytes_overwrite_last_slot() {
        let mut decoder = FrameDecoder::new(MAX_CHANNELS);
        feed(&mut decoder, &[1, 2, 3, 4, 5]);
        assert_eq!(decoder.payload(), &[1, 2, 3, 5]);

        let frames = feed(&mut decoder, &[SENTINEL]);
        assert_eq!(frames[0], unpack_channels(&[1, 2, 3, 5], MAX_CHANNELS));
        assert_eq!(decoder.counters().overflow_bytes, 1);
    }

    #[test]
    fn short_frame_reuses_stale_slots() {
        let mut decoder = FrameDecoder::new(MAX_CHANNELS);
        feed(&mut decoder, &[0, 0, 0, 0b0000_0001, SENTINEL]);

        let frames = feed(&mut decoder, &[0b0000_0001, SENTINEL]);
        assert!(frames[0][0]);
        assert!(frames[0][24], "slot 3 keeps the previous frame's byte");
    }

    #[test]
    fn clear_on_sentinel_drops_stale_slots() {
        let mut decoder = FrameDecoder::new(MAX_CHANNELS).with_clear_on_sentinel(true);
        feed(&mut decoder, &[0, 0, 0, 0b0000_0001, SENTINEL]);

        let frames = feed(&mut decoder, &[0b0000_0001, SENTINEL]);
        assert!(frames[0][0]);
        assert!(!frames[0][24]);
    }

    #[test]
    fn misalignment_heals_at_next_full_frame() {
        let mut decoder = FrameDecoder::new(16);
        feed(&mut decoder, &[9, 9, 9, 9, 9, 9, SENTINEL]);

        let frames = feed(&mut decoder, &[0b0000_0100, 0, 0, 0, SENTINEL]);
        assert_eq!(frames[0], unpack_channels(&[0b0000_0100, 0], 16));
        assert_eq!(
            decoder.counters(),
            FrameCounters {
                frames: 2,
                short_frames: 0,
                overflow_bytes: 2,
            }
        );
    }
}
