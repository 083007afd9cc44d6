//! Data-ready wake signal.
//!
//! The sensor's interrupt line does not carry data; it only tells the
//! acquisition worker that a FIFO slot is waiting.  A single-slot binary
//! signal models that: raising it twice before the worker wakes still
//! yields one wake.

use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;

/// Something the acquisition worker can block on with a timeout.
pub trait WakeSource {
    /// Block until raised or `timeout` elapses.  `true` if raised.
    fn wait(&mut self, timeout: Duration) -> bool;
}

/// Binary wake signal shared between threads.
///
/// Not for interrupt context: raising it wakes an executor's waker, which
/// may take a lock.  On the device the sensor's interrupt line uses a task
/// notification instead (see the binary's `PinWake`).
pub struct WakeSignal {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeSignal {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Raise the signal.  Never blocks.
    pub fn raise(&self) {
        self.signal.signal(());
    }

    /// Whether a raise is pending.
    pub fn is_raised(&self) -> bool {
        self.signal.signaled()
    }

    /// Block until raised or `timeout` elapses.  `true` if raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        future::block_on(future::or(
            async {
                self.signal.wait().await;
                true
            },
            async {
                async_io_mini::Timer::after(timeout).await;
                false
            },
        ))
    }
}

impl WakeSource for &WakeSignal {
    fn wait(&mut self, timeout: Duration) -> bool {
        self.wait_timeout(timeout)
    }
}

impl WakeSource for Arc<WakeSignal> {
    fn wait(&mut self, timeout: Duration) -> bool {
        self.wait_timeout(timeout)
    }
}
