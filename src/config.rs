//! System configuration parameters
//!
//! All tunable parameters for the Pulseband firmware.  Defaults carry the
//! reference calibration of the wrist-worn prototype.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    pub ppg: PpgConfig,
    pub bus: BusConfig,
    pub tasks: TaskConfig,
    pub report: ReportConfig,
}

/// Weights of the cross-window SpO2 smoother:
/// `smoothed = smoothed * alpha + median * beta`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingWeights {
    pub alpha: f32,
    pub beta: f32,
}

impl SmoothingWeights {
    /// Normalised weighted average (weights sum to 1.0).
    pub const NORMALISED: Self = Self {
        alpha: 0.8,
        beta: 0.2,
    };

    /// Weights of the first prototype build.  They sum to 1.03, so the
    /// smoothed value drifts upward until the 100 % cap absorbs it.
    pub const LEGACY: Self = Self {
        alpha: 0.8,
        beta: 0.23,
    };

    pub fn is_normalised(&self) -> bool {
        (self.alpha + self.beta - 1.0).abs() < 1e-4
    }
}

/// PPG acquisition and estimation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpgConfig {
    // --- Contact detection ---
    /// Minimum red-channel magnitude for skin contact.
    pub red_floor: u32,
    /// Minimum infrared-channel magnitude for skin contact.
    pub ir_floor: u32,

    // --- Windowing ---
    /// Estimation window length (milliseconds).
    pub window_period_ms: u32,
    /// Bounded wait on the data-ready signal (milliseconds).
    pub wake_timeout_ms: u32,
    /// Delay between part-ID reads while the sensor is absent (milliseconds).
    pub identity_retry_ms: u32,

    // --- Estimator ---
    /// Half-width of the peak/trough comparison window.
    pub peak_radius: usize,
    /// Lower clamp for a channel's AC/DC ratio.
    pub ratio_min: f32,
    /// Upper clamp for a channel's AC/DC ratio.
    pub ratio_max: f32,
    /// SpO2 = `spo2_intercept - spo2_slope * R`.
    pub spo2_intercept: f32,
    pub spo2_slope: f32,
    /// Smoothed SpO2 before the first window completes.
    pub spo2_initial: f32,
    pub smoothing: SmoothingWeights,

    // --- Sensor calibration ---
    /// LED1 (infrared) pulse amplitude register value.
    pub ir_led_amplitude: u8,
    /// LED2 (red) pulse amplitude register value.
    pub red_led_amplitude: u8,
}

impl Default for PpgConfig {
    fn default() -> Self {
        Self {
            red_floor: 80_000,
            ir_floor: 60_000,

            window_period_ms: 10_000,
            wake_timeout_ms: 500,
            identity_retry_ms: 1_000,

            peak_radius: 2,
            ratio_min: 0.001,
            ratio_max: 0.0025,
            spo2_intercept: 110.0,
            spo2_slope: 25.0,
            spo2_initial: 97.0,
            smoothing: SmoothingWeights::NORMALISED,

            ir_led_amplitude: 0x6F,
            red_led_amplitude: 0x5F,
        }
    }
}

impl PpgConfig {
    /// Reject parameter combinations the estimator cannot work with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.peak_radius == 0 {
            return Err("peak_radius must be at least 1");
        }
        if !(self.ratio_min > 0.0 && self.ratio_min < self.ratio_max) {
            return Err("ratio band must satisfy 0 < ratio_min < ratio_max");
        }
        if self.window_period_ms == 0 || self.wake_timeout_ms == 0 {
            return Err("window and wake periods must be non-zero");
        }
        if self.smoothing.alpha < 0.0 || self.smoothing.beta <= 0.0 {
            return Err("smoothing weights must be positive");
        }
        Ok(())
    }
}

/// Event bus worker parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// FreeRTOS priority of the general-channel worker.
    pub general_priority: u8,
    /// FreeRTOS priority of the interrupt-channel worker.  Must exceed
    /// `general_priority`.
    pub intr_priority: u8,
    pub general_stack_kb: usize,
    pub intr_stack_kb: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            general_priority: 2,
            intr_priority: 4,
            general_stack_kb: 6,
            intr_stack_kb: 4,
        }
    }
}

/// Sensor worker parameters.  Both workers run on the application core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub ppg_priority: u8,
    pub ppg_stack_kb: usize,
    pub imu_priority: u8,
    pub imu_stack_kb: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            ppg_priority: 2,
            ppg_stack_kb: 6,
            imu_priority: 2,
            imu_stack_kb: 4,
        }
    }
}

/// Broker reporting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Topic for `{"spo2", "bpm"}` reports.
    pub vitals_topic: heapless::String<48>,
    /// Topic for accelerometer/gyroscope reports.
    pub motion_topic: heapless::String<48>,
    /// Reporter poll interval (milliseconds).
    pub poll_interval_ms: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let mut vitals_topic = heapless::String::new();
        let _ = vitals_topic.push_str("center/data_sensor_1");
        let mut motion_topic = heapless::String::new();
        let _ = motion_topic.push_str("center/data_sensor_2");
        Self {
            vitals_topic,
            motion_topic,
            poll_interval_ms: 100,
        }
    }
}
