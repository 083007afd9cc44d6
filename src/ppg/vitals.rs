//! Published vitals.
//!
//! The acquisition worker is the only writer.  Display and network
//! collaborators read through `&self` accessors; every field is an atomic,
//! so no lock is ever taken on either side.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Point-in-time copy of the published values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalsSnapshot {
    pub spo2: f32,
    pub heart_rate: u32,
}

/// Latest SpO2 / heart-rate estimate plus an edge-triggered freshness flag.
pub struct Vitals {
    spo2_bits: AtomicU32,
    heart_rate: AtomicU32,
    fresh: AtomicBool,
}

impl Vitals {
    /// `initial_spo2` is reported until the first window completes;
    /// heart rate starts at 0.
    pub fn new(initial_spo2: f32) -> Self {
        Self {
            spo2_bits: AtomicU32::new(initial_spo2.to_bits()),
            heart_rate: AtomicU32::new(0),
            fresh: AtomicBool::new(false),
        }
    }

    /// Store a new estimate and raise the freshness flag.
    pub fn publish(&self, spo2: f32, heart_rate: u32) {
        self.spo2_bits.store(spo2.to_bits(), Ordering::Relaxed);
        self.heart_rate.store(heart_rate, Ordering::Relaxed);
        // Release: a reader that observes the flag also observes the values.
        self.fresh.store(true, Ordering::Release);
    }

    /// Smoothed SpO2 (%).
    pub fn spo2(&self) -> f32 {
        f32::from_bits(self.spo2_bits.load(Ordering::Relaxed))
    }

    /// Beats per minute.
    pub fn heart_rate(&self) -> u32 {
        self.heart_rate.load(Ordering::Relaxed)
    }

    /// `true` once per publish; clears on read.
    pub fn take_new_value(&self) -> bool {
        self.fresh.swap(false, Ordering::Acquire)
    }

    pub fn snapshot(&self) -> VitalsSnapshot {
        VitalsSnapshot {
            spo2: self.spo2(),
            heart_rate: self.heart_rate(),
        }
    }
}

impl Default for Vitals {
    fn default() -> Self {
        Self::new(97.0)
    }
}
