use color_eyre::{eyre::eyre, Result};
use operator_input::input::{GilrsGamepad, SharedKeyboard, BUTTONS_PER_STICK};
use operator_input::{Channel, InputConfig, InputHub, StickAxis};
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = InputConfig::load().map_err(|e| eyre!("Failed to load config: {}", e))?;
    let config = headless_config(config);
    info!("Starting operator input with config: {:?}", config);

    let gamepad = GilrsGamepad::new().map_err(|e| eyre!("Failed to set up gamepads: {}", e))?;
    // Nothing writes to it here; a windowed front end would share a clone
    let keyboard = SharedKeyboard::default();

    let mut hub = InputHub::new(&config, Box::new(gamepad), Box::new(keyboard));
    if let Err(e) = hub.start_serial() {
        warn!("Continuing without operator panel: {}", e);
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(config.control.tick_interval_ms));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_axes = (0.0, 0.0);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                hub.tick();
                last_axes = report_tick(&hub, config.control.stick, last_axes);
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    hub.shutdown();
    info!("Final OI stats: {:?}", hub.oi_stats());
    Ok(())
}

/// The binary has no key source, so the keyboard stand-in would only ever
/// report centred axes while looking active
fn headless_config(mut config: InputConfig) -> InputConfig {
    if config.joystick.keyboard_fallback {
        warn!("No keyboard source in headless mode, disabling keyboard fallback");
        config.joystick.keyboard_fallback = false;
    }
    config
}

// Logs everything a dispatcher would act on during one tick
fn report_tick(hub: &InputHub, stick: usize, last_axes: (f64, f64)) -> (f64, f64) {
    let axes = (
        hub.axis_value(stick, StickAxis::X),
        hub.axis_value(stick, StickAxis::Y),
    );
    if axes != last_axes {
        debug!("Stick {} axes: x={:.2} y={:.2}", stick, axes.0, axes.1);
    }

    for s in 0..hub.stick_count() {
        for button in 0..BUTTONS_PER_STICK {
            let channel = Channel::Joystick { stick: s, button };
            if hub.rising_edge(channel) {
                info!("Joystick {} button {} pressed", s, button);
            }
            if hub.falling_edge(channel) {
                info!("Joystick {} button {} released", s, button);
            }
        }
    }

    for id in 0..hub.oi_channel_count() {
        if hub.rising_edge(Channel::Oi(id)) {
            info!("OI channel {} on", id);
        }
        if hub.falling_edge(Channel::Oi(id)) {
            info!("OI channel {} off", id);
        }
    }

    axes
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_run_turns_keyboard_fallback_off() {
        let config = headless_config(InputConfig::default());
        assert!(!config.joystick.keyboard_fallback);

        let mut expected = InputConfig::default();
        expected.joystick.keyboard_fallback = false;
        assert_eq!(config, expected);
    }
}
