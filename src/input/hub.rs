//! Input hub - unified query surface over joystick and operator panel
//!
//! The hub owns both channel sets and the panel decoder thread. The control
//! loop calls [`InputHub::tick`] once per iteration and then queries levels and
//! edges through [`Channel`] references.
//!
//! # Threads
//!
//! ```text
//! control loop ──tick()──► JoystickAdapter ──► joystick buffer ◄── queries
//! decoder thread ─────────► FrameDecoder ───► OI buffer ◄──────── queries
//! ```
//!
//! The two buffers are independent: an OI frame may land at any point
//! relative to the joystick snapshot of the same tick.
//!
//! # Lifecycle
//!
//! A failed [`InputHub::start`] leaves the panel disabled with every OI channel
//! released; there is no retry. [`InputHub::stop`] only requests shutdown and
//! never blocks the control loop. [`InputHub::shutdown`] and `Drop` also join
//! the decoder thread, which can take until the source's next byte, read
//! timeout, or closure.

use crate::config::{InputConfig, OiConfig};
use crate::input::byte_source::{ByteSource, SerialSource, SourceError};
use crate::input::channel_buffer::ChannelBuffer;
use crate::input::gamepad::{GamepadApi, StickAxis};
use crate::input::joystick::JoystickAdapter;
use crate::input::keyboard::KeyboardApi;
use crate::input::oi_frame::FrameDecoder;
use crate::input::oi_link::{OiLink, OiStats};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A boolean input line in one of the two channel spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Joystick { stick: usize, button: usize },
    Oi(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("OI source error: {0}")]
    Source(#[from] SourceError),

    #[error("OI link is already running")]
    AlreadyRunning,

    /// `stop()` was requested but the decoder thread is still inside a read
    #[error("OI link is still stopping; call shutdown() to wait for it")]
    Stopping,

    #[error("Failed to spawn OI decoder thread: {0}")]
    Spawn(#[source] std::io::Error),
}

struct LinkWorker {
    cancel: CancellationToken,
    thread: JoinHandle<()>,
}

pub struct InputHub {
    joystick: JoystickAdapter,
    oi: Arc<ChannelBuffer>,
    oi_settings: OiConfig,
    stats: Arc<Mutex<OiStats>>,
    worker: Option<LinkWorker>,
}

impl InputHub {
    pub fn new(
        config: &InputConfig,
        gamepad: Box<dyn GamepadApi>,
        keyboard: Box<dyn KeyboardApi>,
    ) -> Self {
        info!(
            "Creating input hub: {} sticks, {} OI channels",
            config.joystick.stick_count, config.oi.channel_count
        );
        Self {
            joystick: JoystickAdapter::new(config.joystick.clone(), gamepad, keyboard),
            oi: Arc::new(ChannelBuffer::new(config.oi.channel_count)),
            oi_settings: config.oi.clone(),
            stats: Arc::new(Mutex::new(OiStats::default())),
            worker: None,
        }
    }

    /// Validates `source` and spawns the decoder thread on it
    ///
    /// On failure the panel stays disabled and all OI channels read released.
    /// A link that was stopped but whose thread has not exited yet yields
    /// [`HubError::Stopping`]; [`InputHub::shutdown`] waits it out.
    pub fn start(&mut self, source: impl ByteSource + 'static) -> Result<(), HubError> {
        self.reap_finished_worker();
        if let Some(worker) = &self.worker {
            if worker.cancel.is_cancelled() {
                warn!("Ignoring OI start request, previous link still stopping");
                return Err(HubError::Stopping);
            }
            warn!("Ignoring OI start request, link already running");
            return Err(HubError::AlreadyRunning);
        }

        self.oi.reset();
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = OiStats::default();

        let cancel = CancellationToken::new();
        let decoder = FrameDecoder::new(self.oi.len())
            .with_clear_on_sentinel(self.oi_settings.clear_on_sentinel);
        let link = OiLink::create(
            Box::new(source),
            decoder,
            Arc::clone(&self.oi),
            cancel.clone(),
            Arc::clone(&self.stats),
        );

        let link = match link.validate() {
            Ok(link) => link,
            Err(e) => {
                error!("OI disabled: {}", e);
                return Err(e.into());
            }
        };

        let thread = thread::Builder::new()
            .name("oi-decoder".to_string())
            .spawn(move || link.run())
            .map_err(|e| {
                error!("OI disabled, decoder thread failed to start: {}", e);
                HubError::Spawn(e)
            })?;

        info!("OI decoder thread started");
        self.worker = Some(LinkWorker { cancel, thread });
        Ok(())
    }

    /// Opens the configured serial device and starts the link on it
    pub fn start_serial(&mut self) -> Result<(), HubError> {
        let settings = &self.oi_settings;
        let source = match SerialSource::open(
            &settings.device_path,
            settings.baud_rate,
            settings.read_timeout(),
        ) {
            Ok(source) => source,
            Err(e) => {
                error!("OI disabled: {}", e);
                return Err(e.into());
            }
        };
        self.start(source)
    }

    /// Requests decoder shutdown without waiting for it
    pub fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            debug!("Requesting OI decoder shutdown");
            worker.cancel.cancel();
        }
    }

    /// Requests shutdown and joins the decoder thread
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.cancel();
            info!("Waiting for OI decoder thread to exit");
            if worker.thread.join().is_err() {
                error!("OI decoder thread panicked");
            }
        }
    }

    pub fn is_oi_running(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |w| !w.cancel.is_cancelled() && !w.thread.is_finished())
    }

    pub fn oi_stats(&self) -> OiStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn oi_channel_count(&self) -> usize {
        self.oi.len()
    }

    /// Refreshes the joystick snapshot; once per control-loop iteration,
    /// before that iteration's edge queries
    pub fn tick(&mut self) {
        self.joystick.tick();
    }

    pub fn level(&self, channel: Channel) -> bool {
        match channel {
            Channel::Joystick { stick, button } => self.joystick.button(stick, button),
            Channel::Oi(id) => self.oi.level(id),
        }
    }

    pub fn rising_edge(&self, channel: Channel) -> bool {
        match channel {
            Channel::Joystick { stick, button } => self.joystick.button_pressed(stick, button),
            Channel::Oi(id) => self.oi.rising_edge(id),
        }
    }

    pub fn falling_edge(&self, channel: Channel) -> bool {
        match channel {
            Channel::Joystick { stick, button } => self.joystick.button_released(stick, button),
            Channel::Oi(id) => self.oi.falling_edge(id),
        }
    }

    pub fn axis_value(&self, stick: usize, axis: StickAxis) -> f64 {
        self.joystick.axis_value(stick, axis)
    }

    pub fn is_connected(&self, stick: usize) -> bool {
        self.joystick.is_connected(stick)
    }

    pub fn stick_count(&self) -> usize {
        self.joystick.stick_count()
    }

    fn reap_finished_worker(&mut self) {
        if self.worker.as_ref().map_or(false, |w| w.thread.is_finished()) {
            self.shutdown();
        }
    }
}

impl Drop for InputHub {
    fn drop(&mut self) {
        self.shutdown();
    }
}
