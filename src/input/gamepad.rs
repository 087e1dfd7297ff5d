//! Gamepad query backend
//!
//! [`GamepadApi`] is the polled view the joystick adapter needs: connection
//! state, raw axis positions in `-100..=100` with +Y pointing down, and
//! button levels by index. [`GilrsGamepad`] implements it on top of gilrs.

use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

/// Buttons addressed per stick; joystick channel ids are
/// `stick * BUTTONS_PER_STICK + button`
pub const BUTTONS_PER_STICK: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickAxis {
    X,
    Y,
}

pub trait GamepadApi {
    /// Refreshes device state; called once at the start of every tick
    fn poll(&mut self) {}

    fn is_connected(&self, stick: usize) -> bool;

    /// Raw position in `-100..=100`, +Y down
    fn axis_position(&self, stick: usize, axis: StickAxis) -> i32;

    fn is_button_pressed(&self, stick: usize, button: usize) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum GamepadError {
    #[error("Failed to initialize gamepad backend: {0}")]
    InitializationError(String),
}

// Index order follows the common Xbox layout: A B X Y LB RB Back Start Guide LS RS
const BUTTON_ORDER: [Button; BUTTONS_PER_STICK] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

/// gilrs-backed gamepads with stable stick slots
///
/// A pad keeps its slot until it disconnects; a newly connected pad takes the
/// lowest free slot.
pub struct GilrsGamepad {
    gilrs: Gilrs,
    slots: Vec<Option<GamepadId>>,
}

impl GilrsGamepad {
    pub fn new() -> Result<Self, GamepadError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(gilrs::Error::NotImplemented(dummy)) => {
                warn!("Gamepads not supported on this platform, sticks stay disconnected");
                dummy
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(GamepadError::InitializationError(e.to_string()));
            }
        };

        let mut gamepad = Self {
            gilrs,
            slots: Vec::new(),
        };
        let present: Vec<GamepadId> = gamepad.gilrs.gamepads().map(|(id, _)| id).collect();
        for id in present {
            gamepad.assign_slot(id);
        }
        Ok(gamepad)
    }

    fn assign_slot(&mut self, id: GamepadId) {
        if self.slots.contains(&Some(id)) {
            return;
        }
        let slot = match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = Some(id);
                free
            }
            None => {
                self.slots.push(Some(id));
                self.slots.len() - 1
            }
        };
        info!(
            "Gamepad {} ({}) assigned to stick {}",
            id,
            self.gilrs.gamepad(id).name(),
            slot
        );
    }

    fn release_slot(&mut self, id: GamepadId) {
        if let Some(slot) = self.slots.iter().position(|s| *s == Some(id)) {
            self.slots[slot] = None;
            info!("Gamepad {} released stick {}", id, slot);
        }
    }

    fn pad(&self, stick: usize) -> Option<gilrs::Gamepad<'_>> {
        self.slots
            .get(stick)
            .copied()
            .flatten()
            .and_then(|id| self.gilrs.connected_gamepad(id))
    }
}

impl GamepadApi for GilrsGamepad {
    fn poll(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => self.assign_slot(id),
                EventType::Disconnected => self.release_slot(id),
                _ => debug!("Gamepad {} event: {:?}", id, event),
            }
        }
    }

    fn is_connected(&self, stick: usize) -> bool {
        self.pad(stick).is_some()
    }

    fn axis_position(&self, stick: usize, axis: StickAxis) -> i32 {
        let Some(pad) = self.pad(stick) else {
            return 0;
        };
        // gilrs reports +Y as up
        let value = match axis {
            StickAxis::X => pad.value(Axis::LeftStickX),
            StickAxis::Y => -pad.value(Axis::LeftStickY),
        };
        (value.clamp(-1.0, 1.0) * 100.0).round() as i32
    }

    fn is_button_pressed(&self, stick: usize, button: usize) -> bool {
        match (self.pad(stick), BUTTON_ORDER.get(button)) {
            (Some(pad), Some(&b)) => pad.is_pressed(b),
            _ => false,
        }
    }
}
