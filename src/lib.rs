//! Operator input for a remote-control ground station
//!
//! Joystick buttons and operator panel switches become edge-aware channels,
//! joystick axes become normalized values. See [`input::InputHub`].

pub mod config;
pub mod input;

pub use config::{ConfigError, InputConfig};
pub use input::{Channel, InputHub, StickAxis};
