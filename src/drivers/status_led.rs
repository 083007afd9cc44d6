//! Provisioning status LED.
//!
//! A single discrete LED that follows [`LedLevel`] events from the network
//! collaborator:
//!
//! | Level   | Output                       |
//! |---------|------------------------------|
//! | `Off`   | low                          |
//! | `Solid` | high                         |
//! | `Blink` | toggles every [`BLINK_HALF_PERIOD_MS`] |
//!
//! The bus callback only stores the requested level; the LED thread calls
//! [`StatusLed::tick`] and owns the pin.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::bus::EventBus;
use crate::events::{EventId, LedLevel};

/// Half period of the provisioning blink.
pub const BLINK_HALF_PERIOD_MS: u32 = 500;

/// Level requested through the bus; read by the LED thread.
#[derive(Default)]
pub struct LedRequest(AtomicU8);

impl LedRequest {
    pub fn set(&self, level: LedLevel) {
        self.0.store(level as u8, Ordering::Release);
    }

    pub fn get(&self) -> LedLevel {
        match self.0.load(Ordering::Acquire) {
            1 => LedLevel::Solid,
            2 => LedLevel::Blink,
            _ => LedLevel::Off,
        }
    }

    /// Follow [`EventId::LedState`] on the general channel.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let this = Arc::clone(self);
        bus.subscribe(EventId::LedState, move |ev| {
            if let Some(level) = ev.payload::<LedLevel>() {
                this.set(*level);
            }
        });
    }
}

pub struct StatusLed<P> {
    pin: P,
    request: Arc<LedRequest>,
    lit: bool,
    toggled_at_ms: u32,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P, request: Arc<LedRequest>) -> Self {
        Self {
            pin,
            request,
            lit: false,
            toggled_at_ms: 0,
        }
    }

    /// Drive the pin for the current request.  Call periodically.
    pub fn tick(&mut self, now_ms: u32) {
        let want = match self.request.get() {
            LedLevel::Off => false,
            LedLevel::Solid => true,
            LedLevel::Blink => {
                if now_ms.wrapping_sub(self.toggled_at_ms) >= BLINK_HALF_PERIOD_MS {
                    self.toggled_at_ms = now_ms;
                    !self.lit
                } else {
                    self.lit
                }
            }
        };
        if want != self.lit {
            let result = if want { self.pin.set_high() } else { self.pin.set_low() };
            if result.is_err() {
                warn!("status_led: pin write failed");
                return;
            }
            self.lit = want;
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }
}
