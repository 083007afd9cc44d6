//! Log-based report sink adapter.
//!
//! Implements [`ReportPort`] by writing every outbound report to the
//! ESP-IDF logger (UART / USB-CDC).  The broker client implements the same
//! trait; until it is wired up this sink stands in for it.
//!
//! The link flag follows [`NetStatus`] events from the bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::app::ports::{ReportError, ReportPort};
use crate::bus::EventBus;
use crate::events::{EventId, NetStatus};

/// Adapter that logs every report to the serial console.
pub struct LogReportSink {
    link_up: Arc<AtomicBool>,
}

impl Default for LogReportSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogReportSink {
    /// Starts with the link down.
    pub fn new() -> Self {
        Self {
            link_up: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Track link status from [`EventId::NetStatus`] events on `bus`.
    pub fn follow_link(&self, bus: &EventBus) {
        let link_up = Arc::clone(&self.link_up);
        bus.subscribe(EventId::NetStatus, move |ev| {
            if let Some(status) = ev.payload::<NetStatus>() {
                link_up.store(*status == NetStatus::GotIp, Ordering::Release);
                info!("REPORT | link {:?}", status);
            }
        });
    }

    pub fn set_link(&self, up: bool) {
        self.link_up.store(up, Ordering::Release);
    }
}

impl ReportPort for LogReportSink {
    fn is_connected(&self) -> bool {
        self.link_up.load(Ordering::Acquire)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ReportError> {
        if !self.is_connected() {
            return Err(ReportError::NotConnected);
        }
        let body = core::str::from_utf8(payload).map_err(|_| ReportError::Encode)?;
        info!("REPORT | {} | {}", topic, body);
        Ok(())
    }
}
