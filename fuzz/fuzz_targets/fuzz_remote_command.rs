//! Fuzz target: `commands::parse`
//!
//! Feeds arbitrary payloads to both inbound topics.  Decoding must never
//! panic, and an accepted firmware URL must respect the length bound.
//!
//! cargo fuzz run fuzz_remote_command

#![no_main]

use libfuzzer_sys::fuzz_target;
use pulseband::app::commands::{self, FIRMWARE_TOPIC, MAX_URL_LEN, NOTICE_TOPIC, RemoteCommand};

fuzz_target!(|data: &[u8]| {
    let _ = commands::parse(NOTICE_TOPIC, data);

    if let Ok(RemoteCommand::FirmwareUpdate(url)) = commands::parse(FIRMWARE_TOPIC, data) {
        assert!(!url.is_empty() && url.len() <= MAX_URL_LEN);
    }
});
