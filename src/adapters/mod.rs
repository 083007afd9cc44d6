//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to              |
//! |------------|--------------|--------------------------|
//! | `log_sink` | ReportPort   | Serial log output        |
//! | `time`     | TimePort     | ESP32 system timer       |

pub mod log_sink;
pub mod time;
