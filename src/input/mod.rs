//! Operator input subsystem
//!
//! Turns a polled gamepad and a serial operator panel into edge-aware
//! channels for the command dispatcher:
//!
//! 1. [`channel_buffer`] - double-buffered boolean channels with edge queries
//! 2. [`joystick`] - per-tick gamepad snapshot and normalized axes
//! 3. [`oi_frame`] / [`oi_link`] - panel frame decoding on a dedicated thread
//! 4. [`hub`] - lifecycle and the unified query API
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► JoystickAdapter ──► ChannelBuffer (joystick) ─┐
//!                                                            ├─► InputHub queries
//! Serial ───► OiLink/FrameDecoder ► ChannelBuffer (OI) ─────┘
//! ```

pub mod byte_source;
pub mod channel_buffer;
pub mod gamepad;
pub mod hub;
pub mod joystick;
pub mod keyboard;
pub mod oi_frame;
pub mod oi_link;

pub use byte_source::{ByteSource, ReadOutcome, ReaderSource, SerialSource, SourceError};
pub use channel_buffer::{ChannelBuffer, ChannelPair};
pub use gamepad::{GamepadApi, GamepadError, GilrsGamepad, StickAxis, BUTTONS_PER_STICK};
pub use hub::{Channel, HubError, InputHub};
pub use joystick::JoystickAdapter;
pub use keyboard::{Key, KeyPair, KeyboardApi, NullKeyboard, SharedKeyboard};
pub use oi_frame::{unpack_channels, FrameDecoder, PAYLOAD_BYTES, SENTINEL};
pub use oi_link::OiStats;
