//! Keyboard substitute for a missing joystick
//!
//! When no stick is plugged in, each axis can be driven by a pair of keys.
//! The key state itself comes from whatever owns the window or terminal;
//! [`SharedKeyboard`] is the hand-off point for that.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    Up,
    Down,
    Left,
    Right,
}

/// Keys driving one axis towards -1.0 and +1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub negative: Key,
    pub positive: Key,
}

impl KeyPair {
    pub const fn new(negative: Key, positive: Key) -> Self {
        Self { negative, positive }
    }

    /// Discrete axis value; the negative key wins when both are held
    pub fn axis_value(&self, keyboard: &dyn KeyboardApi) -> f64 {
        if keyboard.is_key_pressed(self.negative) {
            -1.0
        } else if keyboard.is_key_pressed(self.positive) {
            1.0
        } else {
            0.0
        }
    }
}

pub trait KeyboardApi {
    fn is_key_pressed(&self, key: Key) -> bool;
}

/// Keyboard that never reports a pressed key
#[derive(Debug, Clone, Copy, Default)]
pub struct NullKeyboard;

impl KeyboardApi for NullKeyboard {
    fn is_key_pressed(&self, _key: Key) -> bool {
        false
    }
}

/// Key state shared between a UI thread that records presses and the
/// control loop that reads them
#[derive(Debug, Clone, Default)]
pub struct SharedKeyboard {
    pressed: Arc<Mutex<HashSet<Key>>>,
}

impl SharedKeyboard {
    pub fn press(&self, key: Key) {
        self.pressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }

    pub fn release(&self, key: Key) {
        self.pressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    pub fn release_all(&self) {
        self.pressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl KeyboardApi for SharedKeyboard {
    fn is_key_pressed(&self, key: Key) -> bool {
        self.pressed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}
