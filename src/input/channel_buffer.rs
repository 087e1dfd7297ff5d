//! Double-buffered channel state with edge detection
//!
//! A [`ChannelBuffer`] holds a fixed number of boolean channels as a pair of
//! snapshots: the one published last (`current`) and the one before it
//! (`previous`). Edges are derived from that pair, so a reader can ask the same
//! question any number of times between two publishes and get the same answer.
//!
//! # Consistency
//!
//! Both vectors live behind a single mutex. [`ChannelBuffer::publish`] shifts
//! `current` into `previous` and installs the new snapshot inside one critical
//! section, so readers observe either the pair before the publish or the pair
//! after it, never a mix.
//!
//! # Contract
//!
//! Channel ids outside `0..len()` and snapshots of the wrong length are caller
//! bugs and panic immediately.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// A consistent copy of both snapshots of a [`ChannelBuffer`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelPair {
    pub previous: Vec<bool>,
    pub current: Vec<bool>,
}

impl ChannelPair {
    fn all_false(len: usize) -> Self {
        Self {
            previous: vec![false; len],
            current: vec![false; len],
        }
    }

    pub fn level(&self, id: usize) -> bool {
        self.current[id]
    }

    pub fn rising_edge(&self, id: usize) -> bool {
        self.current[id] && !self.previous[id]
    }

    pub fn falling_edge(&self, id: usize) -> bool {
        !self.current[id] && self.previous[id]
    }
}

/// Fixed-size set of boolean channels with previous/current snapshots
#[derive(Debug)]
pub struct ChannelBuffer {
    len: usize,
    pair: Mutex<ChannelPair>,
}

impl ChannelBuffer {
    /// Creates a buffer of `len` channels, all released
    pub fn new(len: usize) -> Self {
        Self {
            len,
            pair: Mutex::new(ChannelPair::all_false(len)),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current level of channel `id`
    pub fn level(&self, id: usize) -> bool {
        self.check_id(id);
        self.lock().level(id)
    }

    /// `true` when channel `id` went from released to pressed at the last publish
    pub fn rising_edge(&self, id: usize) -> bool {
        self.check_id(id);
        self.lock().rising_edge(id)
    }

    /// `true` when channel `id` went from pressed to released at the last publish
    pub fn falling_edge(&self, id: usize) -> bool {
        self.check_id(id);
        self.lock().falling_edge(id)
    }

    /// Installs a new snapshot, moving the current one into `previous`
    ///
    /// Each buffer has exactly one writer; concurrent readers see either the
    /// pair before this call or the pair after it.
    pub fn publish(&self, snapshot: &[bool]) {
        assert_eq!(
            snapshot.len(),
            self.len,
            "snapshot has {} channels, buffer has {}",
            snapshot.len(),
            self.len
        );

        let mut pair = self.lock();
        let ChannelPair { previous, current } = &mut *pair;
        previous.copy_from_slice(current);
        current.copy_from_slice(snapshot);
    }

    /// Copies both snapshots out under one lock
    pub fn snapshot(&self) -> ChannelPair {
        self.lock().clone()
    }

    /// Returns every channel to released, with no pending edges
    pub fn reset(&self) {
        *self.lock() = ChannelPair::all_false(self.len);
    }

    fn check_id(&self, id: usize) {
        assert!(
            id < self.len,
            "channel {} out of range (buffer has {} channels)",
            id,
            self.len
        );
    }

    // The pair is plain data, so a writer that panicked mid-publish still
    // leaves two valid snapshots behind.
    fn lock(&self) -> MutexGuard<'_, ChannelPair> {
        self.pair.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
