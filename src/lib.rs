//! Pulseband firmware library.
//!
//! Exposes the acquisition, estimation, event and reporting modules for
//! integration testing and host simulation.  All ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod imu;
pub mod pins;
pub mod ppg;

pub mod adapters;
pub mod drivers;
