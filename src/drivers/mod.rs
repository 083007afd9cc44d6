//! GPIO drivers, window timers and thread helpers.

pub mod button;
pub mod buzzer;
pub mod hw_timer;
pub mod status_led;
pub mod task_pin;
