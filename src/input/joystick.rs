//! Joystick adapter
//!
//! Turns the polled [`GamepadApi`] into normalized axes and a per-tick button
//! snapshot.
//!
//! # Tick discipline
//!
//! [`JoystickAdapter::tick`] is the only writer of the button buffer and must
//! run exactly once per control-loop iteration, on the control-loop thread.
//! That is the caller's responsibility; nothing here guards against a second
//! tick or a second thread. Between ticks every query is stable, so a dispatcher
//! may ask for the same edge as often as it likes.

use crate::config::JoystickConfig;
use crate::input::channel_buffer::ChannelBuffer;
use crate::input::gamepad::{GamepadApi, StickAxis, BUTTONS_PER_STICK};
use crate::input::keyboard::KeyboardApi;
use tracing::{debug, info};

pub struct JoystickAdapter {
    gamepad: Box<dyn GamepadApi>,
    keyboard: Box<dyn KeyboardApi>,
    settings: JoystickConfig,
    buttons: ChannelBuffer,
    connected: Vec<bool>,
}

impl JoystickAdapter {
    pub fn new(
        settings: JoystickConfig,
        gamepad: Box<dyn GamepadApi>,
        keyboard: Box<dyn KeyboardApi>,
    ) -> Self {
        debug!("Creating joystick adapter with settings: {:?}", settings);
        let buttons = ChannelBuffer::new(settings.stick_count * BUTTONS_PER_STICK);
        let connected = vec![false; settings.stick_count];
        Self {
            gamepad,
            keyboard,
            settings,
            buttons,
            connected,
        }
    }

    pub fn stick_count(&self) -> usize {
        self.settings.stick_count
    }

    pub fn is_connected(&self, stick: usize) -> bool {
        self.gamepad.is_connected(stick)
    }

    /// Axis position in `[-1.0, 1.0]`, +Y up
    ///
    /// An unplugged stick reads from its key pair when keyboard fallback is
    /// enabled and 0.0 otherwise.
    pub fn axis_value(&self, stick: usize, axis: StickAxis) -> f64 {
        if self.gamepad.is_connected(stick) {
            let raw = f64::from(self.gamepad.axis_position(stick, axis)) / 100.0;
            return match axis {
                StickAxis::X => raw,
                StickAxis::Y => -raw,
            };
        }

        if !self.settings.keyboard_fallback {
            return 0.0;
        }
        let keys = match axis {
            StickAxis::X => self.settings.x_keys,
            StickAxis::Y => self.settings.y_keys,
        };
        keys.axis_value(self.keyboard.as_ref())
    }

    /// Samples every button of every stick and publishes one snapshot
    pub fn tick(&mut self) {
        self.gamepad.poll();

        let mut snapshot = Vec::with_capacity(self.buttons.len());
        for stick in 0..self.settings.stick_count {
            let connected = self.gamepad.is_connected(stick);
            if connected != self.connected[stick] {
                if connected {
                    info!("Joystick {} connected", stick);
                } else {
                    info!("Joystick {} disconnected", stick);
                }
                self.connected[stick] = connected;
            }

            for button in 0..BUTTONS_PER_STICK {
                snapshot.push(connected && self.gamepad.is_button_pressed(stick, button));
            }
        }

        self.buttons.publish(&snapshot);
    }

    pub fn button(&self, stick: usize, button: usize) -> bool {
        self.buttons.level(self.channel(stick, button))
    }

    /// Pressed since the previous tick
    pub fn button_pressed(&self, stick: usize, button: usize) -> bool {
        self.buttons.rising_edge(self.channel(stick, button))
    }

    /// Released since the previous tick
    pub fn button_released(&self, stick: usize, button: usize) -> bool {
        self.buttons.falling_edge(self.channel(stick, button))
    }

    fn channel(&self, stick: usize, button: usize) -> usize {
        assert!(
            button < BUTTONS_PER_STICK,
            "button {} out of range (sticks have {} buttons)",
            button,
            BUTTONS_PER_STICK
        );
        assert!(
            stick < self.settings.stick_count,
            "stick {} out of range ({} configured)",
            stick,
            self.settings.stick_count
        );
        stick * BUTTONS_PER_STICK + button
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keyboard::{Key, KeyPair, NullKeyboard, SharedKeyboard};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Default)]
    struct PadState {
        connected: HashSet<usize>,
        x: i32,
        y: i32,
        pressed: HashSet<(usize, usize)>,
        polls: usize,
    }

    #[derive(Clone, Default)]
    struct FakePad(Rc<RefCell<PadState>>);

    impl GamepadApi for FakePad {
        fn poll(&mut self) {
            self.0.borrow_mut().polls += 1;
        }

        fn is_connected(&self, stick: usize) -> bool {
            self.0.borrow().connected.contains(&stick)
        }

        fn axis_position(&self, _stick: usize, axis: StickAxis) -> i32 {
            match axis {
                StickAxis::X => self.0.borrow().x,
                StickAxis::Y => self.0.borrow().y,
            }
        }

        fn is_button_pressed(&self, stick: usize, button: usize) -> bool {
            self.0.borrow().pressed.contains(&(stick, button))
        }
    }

    fn settings(stick_count: usize, keyboard_fallback: bool) -> JoystickConfig {
        JoystickConfig {
            stick_count,
            keyboard_fallback,
            ..JoystickConfig::default()
        }
    }

    fn adapter(pad: &FakePad, stick_count: usize) -> JoystickAdapter {
        JoystickAdapter::new(
            settings(stick_count, false),
            Box::new(pad.clone()),
            Box::new(NullKeyboard),
        )
    }

    #[test]
    fn axes_normalize_and_invert_y() {
        let pad = FakePad::default();
        pad.0.borrow_mut().connected.insert(0);
        let joystick = adapter(&pad, 1);

        pad.0.borrow_mut().x = 100;
        assert_eq!(joystick.axis_value(0, StickAxis::X), 1.0);
        pad.0.borrow_mut().x = -100;
        assert_eq!(joystick.axis_value(0, StickAxis::X), -1.0);
        pad.0.borrow_mut().y = 50;
        assert_eq!(joystick.axis_value(0, StickAxis::Y), -0.5);
    }

    #[test]
    fn unplugged_stick_reads_zero_without_fallback() {
        let pad = FakePad::default();
        pad.0.borrow_mut().x = 80;
        let keyboard = SharedKeyboard::default();
        keyboard.press(Key::D);
        let joystick =
            JoystickAdapter::new(settings(1, false), Box::new(pad), Box::new(keyboard));

        assert_eq!(joystick.axis_value(0, StickAxis::X), 0.0);
        assert!(!joystick.is_connected(0));
    }

    #[test]
    fn unplugged_stick_reads_keys_with_fallback() {
        let keyboard = SharedKeyboard::default();
        let joystick = JoystickAdapter::new(
            settings(1, true),
            Box::new(FakePad::default()),
            Box::new(keyboard.clone()),
        );

        keyboard.press(Key::W);
        assert_eq!(joystick.axis_value(0, StickAxis::Y), 1.0);
        keyboard.press(Key::S);
        assert_eq!(joystick.axis_value(0, StickAxis::Y), -1.0);
        keyboard.press(Key::D);
        assert_eq!(joystick.axis_value(0, StickAxis::X), 1.0);
        keyboard.release_all();
        assert_eq!(joystick.axis_value(0, StickAxis::X), 0.0);
    }

    #[test]
    fn custom_key_pairs_are_honoured() {
        let keyboard = SharedKeyboard::default();
        let mut config = settings(1, true);
        config.x_keys = KeyPair::new(Key::Left, Key::Right);
        let joystick = JoystickAdapter::new(
            config,
            Box::new(FakePad::default()),
            Box::new(keyboard.clone()),
        );

        keyboard.press(Key::D);
        assert_eq!(joystick.axis_value(0, StickAxis::X), 0.0);
        keyboard.press(Key::Left);
        assert_eq!(joystick.axis_value(0, StickAxis::X), -1.0);
    }

    #[test]
    fn connected_stick_ignores_keyboard() {
        let pad = FakePad::default();
        pad.0.borrow_mut().connected.insert(0);
        let keyboard = SharedKeyboard::default();
        keyboard.press(Key::A);
        let joystick = JoystickAdapter::new(settings(1, true), Box::new(pad), Box::new(keyboard));

        assert_eq!(joystick.axis_value(0, StickAxis::X), 0.0);
    }

    #[test]
    fn tick_publishes_button_edges() {
        let pad = FakePad::default();
        pad.0.borrow_mut().connected.insert(0);
        let mut joystick = adapter(&pad, 1);

        pad.0.borrow_mut().pressed.insert((0, 3));
        joystick.tick();
        assert!(joystick.button(0, 3));
        assert!(joystick.button_pressed(0, 3));
        assert!(joystick.button_pressed(0, 3), "stable until next tick");

        joystick.tick();
        assert!(joystick.button(0, 3));
        assert!(!joystick.button_pressed(0, 3));
        assert!(!joystick.button_released(0, 3));

        pad.0.borrow_mut().pressed.clear();
        joystick.tick();
        assert!(joystick.button_released(0, 3));
        assert_eq!(pad.0.borrow().polls, 3);
    }

    #[test]
    fn buttons_are_indexed_per_stick() {
        let pad = FakePad::default();
        pad.0.borrow_mut().connected.extend([0, 1]);
        pad.0.borrow_mut().pressed.insert((1, 0));
        let mut joystick = adapter(&pad, 2);

        joystick.tick();
        assert!(joystick.button(1, 0));
        assert!(!joystick.button(0, 0));
        assert_eq!(joystick.channel(1, 0), 11);
    }

    #[test]
    fn disconnect_releases_held_buttons() {
        let pad = FakePad::default();
        pad.0.borrow_mut().connected.insert(0);
        pad.0.borrow_mut().pressed.insert((0, 1));
        let mut joystick = adapter(&pad, 1);
        joystick.tick();

        pad.0.borrow_mut().connected.clear();
        joystick.tick();
        assert!(!joystick.button(0, 1));
        assert!(joystick.button_released(0, 1));
    }

    #[test]
    #[should_panic(expected = "button 11 out of range")]
    fn out_of_range_button_panics() {
        let joystick = adapter(&FakePad::default(), 1);
        joystick.button(0, 11);
    }

    #[test]
    #[should_panic(expected = "stick 1 out of range")]
    fn out_of_range_stick_panics() {
        let joystick = adapter(&FakePad::default(), 1);
        joystick.button_pressed(1, 0);
    }
}
