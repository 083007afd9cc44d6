//! Buzzer driver.
//!
//! Subscribed on the interrupt channel: the event's integer is the drive
//! level (0 = off, anything else = on).  Works with any `embedded-hal`
//! output; on ESP-IDF that is an `esp-idf-hal` `PinDriver`.

use std::sync::{Arc, Mutex, PoisonError};

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::bus::EventBus;
use crate::events::EventId;

pub struct Buzzer<P> {
    pin: Mutex<P>,
}

impl<P: OutputPin> Buzzer<P> {
    /// Take the pin and drive it low.
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            warn!("buzzer: initial set_low failed");
        }
        Self {
            pin: Mutex::new(pin),
        }
    }

    pub fn set_level(&self, level: i32) {
        let mut pin = self.pin.lock().unwrap_or_else(PoisonError::into_inner);
        let result = if level != 0 { pin.set_high() } else { pin.set_low() };
        if result.is_err() {
            warn!("buzzer: drive level {} failed", level);
        }
    }
}

impl<P: OutputPin + Send + 'static> Buzzer<P> {
    /// Follow [`EventId::Buzzer`] on the interrupt channel.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let this = Arc::clone(self);
        bus.subscribe_intr(EventId::Buzzer, move |level| this.set_level(level));
    }
}
