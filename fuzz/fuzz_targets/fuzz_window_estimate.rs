//! Fuzz target: FIFO decode, contact filtering and window estimation
//!
//! Treats the input as a stream of raw 6-byte FIFO slots, pushes them
//! through the contact tracker into a window and runs the estimator over
//! the result.  The estimator must never panic and never publish a
//! non-finite or out-of-range value.
//!
//! cargo fuzz run fuzz_window_estimate

#![no_main]

use libfuzzer_sys::fuzz_target;
use pulseband::ppg::estimator::{Estimator, EstimatorParams};
use pulseband::ppg::max30102::decode_fifo_slot;
use pulseband::ppg::window::{ContactThresholds, ContactTracker, WindowBuffer};

fuzz_target!(|data: &[u8]| {
    let params = EstimatorParams::default();
    let mut estimator = Estimator::new(params, 0);
    let mut tracker = ContactTracker::new(ContactThresholds {
        red_floor: 80_000,
        ir_floor: 60_000,
    });
    let mut window = WindowBuffer::new();

    let mut now_us = 0u64;
    for (n, chunk) in data.chunks_exact(6).enumerate() {
        let mut raw = [0u8; 6];
        raw.copy_from_slice(chunk);
        let _ = tracker.admit(decode_fifo_slot(&raw), &mut window);
        now_us += 10_000;

        // Close a window every 64 slots.
        if n % 64 == 63 {
            if let Some(e) = estimator.process(window.make_contiguous(), now_us) {
                assert!(e.spo2.is_finite() && e.spo2 <= 100.0, "spo2 {}", e.spo2);
                assert!(e.median.is_finite());
                assert!((1..=3).contains(&e.windows_combined));
            }
            window.clear();
        }
    }
});
