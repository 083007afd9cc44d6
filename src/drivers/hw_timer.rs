//! Window-boundary timers.
//!
//! On ESP-IDF the period is an `esp_timer` whose callback (timer task
//! context, not ISR) only sets an atomic flag.  The acquisition worker
//! consumes the flag through [`WindowTimer::take_expired`].
//!
//! On every target [`DeadlineTimer`] offers the same contract driven by a
//! [`TimePort`] clock, for host simulation and tests.

use crate::app::ports::{TimePort, WindowTimer};

/// Periodic deadline checked against a clock on each poll.
pub struct DeadlineTimer<C> {
    clock: C,
    period_us: u64,
    deadline_us: u64,
}

impl<C: TimePort> DeadlineTimer<C> {
    pub fn new(clock: C, period_ms: u32) -> Self {
        let period_us = u64::from(period_ms.max(1)) * 1_000;
        let deadline_us = clock.uptime_us() + period_us;
        Self {
            clock,
            period_us,
            deadline_us,
        }
    }

    pub fn period_us(&self) -> u64 {
        self.period_us
    }
}

impl<C: TimePort> WindowTimer for DeadlineTimer<C> {
    fn restart(&mut self) {
        self.deadline_us = self.clock.uptime_us() + self.period_us;
    }

    fn take_expired(&mut self) -> bool {
        let now = self.clock.uptime_us();
        if now < self.deadline_us {
            return false;
        }
        // Periodic: missed periods collapse into one expiry.
        let behind = (now - self.deadline_us) / self.period_us + 1;
        self.deadline_us += behind * self.period_us;
        true
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspWindowTimer;

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use esp_idf_svc::sys::*;
    use log::{info, warn};

    use crate::app::ports::WindowTimer;

    unsafe extern "C" fn window_tick_cb(arg: *mut core::ffi::c_void) {
        // SAFETY: `arg` is the `AtomicBool` owned by the `Arc` in
        // `EspWindowTimer`, which deletes the timer before dropping it.
        let flag = unsafe { &*(arg as *const AtomicBool) };
        flag.store(true, Ordering::Release);
    }

    /// `esp_timer`-backed periodic window timer.
    pub struct EspWindowTimer {
        handle: esp_timer_handle_t,
        period_us: u64,
        expired: Arc<AtomicBool>,
    }

    // SAFETY: the handle is only used through `&mut self` and the
    // esp_timer API is thread-safe.
    unsafe impl Send for EspWindowTimer {}

    impl EspWindowTimer {
        /// Create and start the timer.
        pub fn start(period_ms: u32) -> Result<Self, EspError> {
            let expired = Arc::new(AtomicBool::new(false));
            let args = esp_timer_create_args_t {
                callback: Some(window_tick_cb),
                arg: Arc::as_ptr(&expired) as *mut core::ffi::c_void,
                dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                name: b"ppg-window\0".as_ptr() as *const _,
                skip_unhandled_events: true,
            };
            let mut handle: esp_timer_handle_t = core::ptr::null_mut();
            // SAFETY: `args` outlives the call; `handle` receives a fresh timer.
            esp!(unsafe { esp_timer_create(&args, &mut handle) })?;
            let period_us = u64::from(period_ms) * 1_000;
            // SAFETY: `handle` was just created.
            esp!(unsafe { esp_timer_start_periodic(handle, period_us) })?;
            info!("hw_timer: window timer started ({} ms)", period_ms);
            Ok(Self {
                handle,
                period_us,
                expired,
            })
        }
    }

    impl WindowTimer for EspWindowTimer {
        fn restart(&mut self) {
            // SAFETY: `handle` is valid for the lifetime of `self`.  Stopping
            // an idle timer returns ESP_ERR_INVALID_STATE, which is harmless.
            unsafe {
                esp_timer_stop(self.handle);
                if let Err(e) = esp!(esp_timer_start_periodic(self.handle, self.period_us)) {
                    warn!("hw_timer: window timer restart failed: {}", e);
                }
            }
            self.expired.store(false, Ordering::Release);
        }

        fn take_expired(&mut self) -> bool {
            self.expired.swap(false, Ordering::Acquire)
        }
    }

    impl Drop for EspWindowTimer {
        fn drop(&mut self) {
            // SAFETY: stop then delete; the callback can no longer run after
            // `esp_timer_delete` returns, so `expired` may be dropped.
            unsafe {
                esp_timer_stop(self.handle);
                esp_timer_delete(self.handle);
            }
        }
    }
}
