//! Provisioning button.
//!
//! ## Hardware
//!
//! Momentary switch to 3V3 with the internal pull-down enabled, so a press
//! reads high.  The pin is sampled every [`POLL_INTERVAL_MS`], which also
//! debounces it; each press edge publishes [`EventId::Button`] on the
//! general channel for the network provisioning collaborator.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::bus::EventBus;
use crate::events::EventId;

/// Sampling period (also the debounce interval).
pub const POLL_INTERVAL_MS: u32 = 100;

/// Press-edge detector over successive samples.
pub struct ButtonEdge {
    last: bool,
}

impl ButtonEdge {
    /// `initial` is the level sampled at startup; a button held during
    /// boot does not count as a press.
    pub fn new(initial: bool) -> Self {
        Self { last: initial }
    }

    /// Feed one sample.  `true` on a released → pressed transition.
    pub fn update(&mut self, pressed: bool) -> bool {
        let edge = pressed && !self.last;
        self.last = pressed;
        edge
    }
}

/// Polling loop.
pub fn run<P: InputPin>(mut pin: P, bus: &EventBus, delay: &mut impl DelayNs) -> ! {
    let initial = pin.is_high().unwrap_or(false);
    let mut edge = ButtonEdge::new(initial);
    loop {
        match pin.is_high() {
            Ok(level) => {
                if edge.update(level) {
                    info!("button: pressed");
                    bus.publish(EventId::Button, None);
                }
            }
            Err(_) => warn!("button: read failed"),
        }
        delay.delay_ms(POLL_INTERVAL_MS);
    }
}
