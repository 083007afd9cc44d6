//! PPG acquisition loop.
//!
//! ```text
//!  INT pin ──▶ WakeSource ──▶ wait(timeout) ──▶ INTR_STATUS_1 ──▶ FIFO slot
//!                                                                   │
//!                         ContactTracker ◀──────────────────────────┘
//!                          │ Contact          │ NoContact
//!                          ▼                  ▼
//!                     WindowBuffer      clear + restart timer/boundaries
//!                          │
//!          WindowTimer expired? ──▶ Estimator ──▶ Vitals
//! ```
//!
//! [`PpgPipeline`] owns every piece of sensor-side state.  Other threads
//! only see the shared [`Vitals`].

use core::time::Duration;
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use super::estimator::{Estimate, Estimator, EstimatorParams};
use super::max30102::{INTR_NEW_FIFO_DATA, LedAmplitudes, Max30102, SamplePair};
use super::vitals::Vitals;
use super::wake::WakeSource;
use super::window::{Admission, ContactState, ContactThresholds, ContactTracker, WindowBuffer};
use crate::app::ports::{TimePort, WindowTimer};
use crate::config::PpgConfig;
use crate::error::SensorError;

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Pairs appended to a window.
    pub samples: u32,
    /// Pairs rejected by the contact check.
    pub rejected: u32,
    /// Contact → no-contact transitions.
    pub contact_losses: u32,
    /// Window boundaries processed.
    pub windows: u32,
    /// Windows that produced an estimate.
    pub published: u32,
    /// Cycles skipped because of a bus error.
    pub bus_errors: u32,
    /// Waits that ended without a data-ready signal.
    pub wake_timeouts: u32,
}

/// Acquisition state for one MAX30102.
pub struct PpgPipeline<I2C, C, W> {
    sensor: Max30102<I2C>,
    config: PpgConfig,
    window: WindowBuffer,
    contact: ContactTracker,
    estimator: Estimator,
    vitals: Arc<Vitals>,
    clock: C,
    timer: W,
    stats: PipelineStats,
}

impl<I2C, C, W> PpgPipeline<I2C, C, W>
where
    I2C: I2c,
    C: TimePort,
    W: WindowTimer,
{
    pub fn new(
        sensor: Max30102<I2C>,
        config: &PpgConfig,
        vitals: Arc<Vitals>,
        clock: C,
        timer: W,
    ) -> Self {
        let start = clock.uptime_us();
        Self {
            sensor,
            contact: ContactTracker::new(ContactThresholds {
                red_floor: config.red_floor,
                ir_floor: config.ir_floor,
            }),
            estimator: Estimator::new(EstimatorParams::from(config), start),
            config: config.clone(),
            window: WindowBuffer::new(),
            vitals,
            clock,
            timer,
            stats: PipelineStats::default(),
        }
    }

    /// Wait for a genuine sensor, program it, and open the first window.
    pub fn setup(&mut self, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        let failures = self
            .sensor
            .wait_for_identity(delay, self.config.identity_retry_ms);
        if failures > 0 {
            info!("PPG: sensor found after {} failed identity reads", failures);
        }
        self.sensor.configure(LedAmplitudes {
            ir: self.config.ir_led_amplitude,
            red: self.config.red_led_amplitude,
        })?;

        let w = self.config.smoothing;
        if w.is_normalised() {
            info!("PPG: smoothing alpha={} beta={}", w.alpha, w.beta);
        } else {
            warn!(
                "PPG: smoothing alpha={} beta={} (sum {:.2}, values drift upward to the cap)",
                w.alpha,
                w.beta,
                w.alpha + w.beta
            );
        }

        self.open_window();
        Ok(())
    }

    /// One acquisition cycle after a wake (or wake timeout): read a slot if
    /// the sensor flagged one, then close the window if its timer expired.
    pub fn cycle(&mut self) -> Result<Option<Estimate>, SensorError> {
        let status = self.sensor.interrupt_status()?;
        if status & INTR_NEW_FIFO_DATA != 0 {
            let pair = self.sensor.read_fifo_slot()?;
            self.ingest(pair);
        }
        Ok(self.close_window_if_expired())
    }

    /// Validate one pair and update the window.
    pub fn ingest(&mut self, pair: SamplePair) -> Admission {
        let admission = self.contact.admit(pair, &mut self.window);
        match admission {
            Admission::Appended => self.stats.samples = self.stats.samples.wrapping_add(1),
            Admission::Rejected { transition } => {
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                if transition {
                    self.stats.contact_losses = self.stats.contact_losses.wrapping_add(1);
                    info!("PPG: contact lost");
                }
                self.timer.restart();
                self.estimator.restart(self.clock.uptime_us());
            }
        }
        admission
    }

    /// Run the estimator if the window timer has fired.
    pub fn close_window_if_expired(&mut self) -> Option<Estimate> {
        if !self.timer.take_expired() {
            return None;
        }
        let now = self.clock.uptime_us();
        let estimate = self.estimator.process(self.window.make_contiguous(), now);
        self.window.clear();
        self.stats.windows = self.stats.windows.wrapping_add(1);

        if let Some(e) = &estimate {
            self.vitals.publish(e.spo2, e.heart_rate);
            self.stats.published = self.stats.published.wrapping_add(1);
        }
        estimate
    }

    /// Acquisition loop.  Bus errors skip the cycle; nothing here returns.
    pub fn run(&mut self, wake: &mut impl WakeSource) -> ! {
        let timeout = Duration::from_millis(u64::from(self.config.wake_timeout_ms));
        loop {
            if !wake.wait(timeout) {
                self.stats.wake_timeouts = self.stats.wake_timeouts.wrapping_add(1);
            }
            if let Err(e) = self.cycle() {
                self.stats.bus_errors = self.stats.bus_errors.wrapping_add(1);
                warn!("PPG: cycle skipped: {}", e);
            }
        }
    }

    fn open_window(&mut self) {
        self.window.clear();
        self.timer.restart();
        self.estimator.restart(self.clock.uptime_us());
    }

    pub fn vitals(&self) -> &Arc<Vitals> {
        &self.vitals
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn contact_state(&self) -> ContactState {
        self.contact.state()
    }

    pub fn window(&self) -> &WindowBuffer {
        &self.window
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Give the bus handle back.
    pub fn release(self) -> I2C {
        self.sensor.release()
    }
}
