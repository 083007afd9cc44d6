//! Application core: what leaves and enters the device over the broker.
//!
//! All interaction with the platform happens through **port traits**
//! defined in [`ports`], keeping this layer testable without a network.

pub mod commands;
pub mod ports;
pub mod reporter;
