//! Port traits: the hexagonal boundary between the acquisition/report core
//! and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PpgPipeline / VitalsReporter (domain)
//! ```
//!
//! The sensor bus itself is not a port here: drivers take any
//! `embedded_hal::i2c::I2c`, which already is the seam.

// ───────────────────────────────────────────────────────────────
// Time port (driven adapter: monotonic clock → domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic microsecond clock.
pub trait TimePort {
    /// Microseconds since boot.
    fn uptime_us(&self) -> u64;

    /// Milliseconds since boot, truncated to 32 bits (wraps after ~49 days).
    fn uptime_ms(&self) -> u32 {
        (self.uptime_us() / 1_000) as u32
    }
}

// ───────────────────────────────────────────────────────────────
// Window timer port (driven adapter: periodic timer → acquisition)
// ───────────────────────────────────────────────────────────────

/// Periodic window-boundary timer.
///
/// The timer only raises a flag; the acquisition worker polls it once per
/// cycle and runs the estimator when it finds it set.
pub trait WindowTimer {
    /// Restart the period from now and clear a pending expiry.
    fn restart(&mut self);

    /// Return and clear the expiry flag.
    fn take_expired(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Report port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

/// Outbound message sink towards the broker.  Transport, QoS and
/// reconnection live behind the implementation.
pub trait ReportPort {
    /// Whether a broker session is currently up.
    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ReportError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ReportPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    /// No broker session.
    NotConnected,
    /// Report could not be serialised.
    Encode,
    /// Transport rejected the message.
    Transport,
}

impl core::fmt::Display for ReportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Encode => write!(f, "encode failed"),
            Self::Transport => write!(f, "transport error"),
        }
    }
}
