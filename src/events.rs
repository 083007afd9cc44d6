//! Event identifiers and payloads carried by the [`EventBus`](crate::bus::EventBus).
//!
//! Events are produced by:
//! - GPIO tasks (provisioning button)
//! - The network stack (link status, provisioning LED level)
//! - The broker adapter (remote notices, firmware-update requests)
//! - Sensor workers (alerts)
//!
//! ```text
//! ┌─────────────┐  publish()          ┌──────────────┐     ┌──────────────┐
//! │ Tasks       │────────────────────▶│ General chan │────▶│ worker (p2)  │
//! │             │                     └──────────────┘     └──────────────┘
//! │ ISR / cb    │  publish_from_isr() ┌──────────────┐     ┌──────────────┐
//! │             │────────────────────▶│ Intr chan    │────▶│ worker (p4)  │
//! └─────────────┘                     └──────────────┘     └──────────────┘
//! ```

use std::any::Any;
use std::sync::Arc;

/// Number of distinct [`EventId`] values; sizes the subscriber table.
pub const EVENT_ID_COUNT: usize = 6;

/// Event identifiers shared by every subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventId {
    /// Provisioning button released.
    Button = 0,
    /// Provisioning LED level changed (payload: [`LedLevel`]).
    LedState = 1,
    /// Network link status changed (payload: [`NetStatus`]).
    NetStatus = 2,
    /// A sensor worker raised an alert.
    SensorAlert = 3,
    /// Remote firmware-update request (payload: URL `String`).
    FirmwareUpdate = 4,
    /// Buzzer drive level (interrupt channel, integer payload).
    Buzzer = 5,
}

impl EventId {
    pub const ALL: [EventId; EVENT_ID_COUNT] = [
        Self::Button,
        Self::LedState,
        Self::NetStatus,
        Self::SensorAlert,
        Self::FirmwareUpdate,
        Self::Buzzer,
    ];

    /// Slot in the subscriber table.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Type-erased payload for the general channel.  The publisher keeps its own
/// handle; subscribers only ever see a borrow for the callback's duration.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A general-channel event as queued.
#[derive(Clone)]
pub struct Event {
    pub id: EventId,
    pub payload: Option<Payload>,
}

impl Event {
    pub fn new(id: EventId, payload: Option<Payload>) -> Self {
        Self { id, payload }
    }
}

impl core::fmt::Debug for Event {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

/// Borrowed view of an event handed to general-channel subscribers.
#[derive(Clone, Copy)]
pub struct EventRef<'a> {
    pub id: EventId,
    payload: Option<&'a (dyn Any + Send + Sync)>,
}

impl<'a> EventRef<'a> {
    pub(crate) fn from_event(event: &'a Event) -> Self {
        Self {
            id: event.id,
            payload: event.payload.as_deref(),
        }
    }

    /// Downcast the payload.  `None` if absent or of another type.
    pub fn payload<T: Any>(&self) -> Option<&'a T> {
        self.payload.and_then(|p| p.downcast_ref::<T>())
    }
}

/// An interrupt-channel event: identifier plus a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrEvent {
    pub id: EventId,
    pub value: i32,
}

// ── Payload types published by collaborators ──────────────────

/// Network link status carried by [`EventId::NetStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetStatus {
    NoIp,
    GotIp,
}

/// Provisioning LED level carried by [`EventId::LedState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedLevel {
    /// Off; provisioning finished.
    Off,
    /// Solid on; waiting for provisioning.
    Solid,
    /// Blinking; provisioning in progress.
    Blink,
}
