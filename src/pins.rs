//! GPIO / peripheral pin assignments for the Pulseband board (ESP32).
//!
//! Single source of truth: drivers and `main` reference this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I²C bus (MAX30102 + MPU6050 share it)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 22;
pub const I2C_SCL_GPIO: i32 = 21;
/// Both sensors run at standard-mode speed.
pub const I2C_FREQ_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// MAX30102 active-low interrupt output (open drain, needs pull-up).
pub const PPG_INT_GPIO: i32 = 23;

// ---------------------------------------------------------------------------
// User I/O
// ---------------------------------------------------------------------------

/// Piezo buzzer, active high.
pub const BUZZER_GPIO: i32 = 18;
/// Provisioning status LED, active high.
pub const STATUS_LED_GPIO: i32 = 2;
/// Provisioning button to 3V3, pull-down enabled.
pub const BUTTON_GPIO: i32 = 5;
