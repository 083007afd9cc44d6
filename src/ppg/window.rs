//! Window buffer and contact-state tracking.
//!
//! Samples accumulate between window boundaries in a fixed-capacity buffer.
//! At 100 samples/s with 8-sample averaging the sensor delivers 12.5 pairs
//! per second, i.e. ~125 per 10 s window; [`WINDOW_CAPACITY`] leaves ample
//! headroom for faster configurations.  When full, the oldest pair is
//! overwritten in place, so a push costs the same whatever the fill level.

use heapless::Vec;

use super::max30102::SamplePair;

/// Maximum pairs held in one window.
pub const WINDOW_CAPACITY: usize = 512;

/// Skin contact as judged from the last sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactState {
    Contact,
    NoContact,
}

/// Amplitude floors below which a sample means "no tissue on the sensor".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactThresholds {
    pub red_floor: u32,
    pub ir_floor: u32,
}

impl ContactThresholds {
    pub fn classify(&self, pair: SamplePair) -> ContactState {
        if pair.red >= self.red_floor && pair.ir >= self.ir_floor {
            ContactState::Contact
        } else {
            ContactState::NoContact
        }
    }
}

/// Outcome of offering one sample to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Sample appended.
    Appended,
    /// Sample below the floor; the window was cleared.
    /// `transition` is true when contact was present before this sample.
    Rejected { transition: bool },
}

/// Ordered sample pairs since the last window boundary.
///
/// A ring over a fixed array.  Until the first eviction `head` stays 0 and
/// the storage is already in arrival order.
pub struct WindowBuffer {
    samples: Vec<SamplePair, WINDOW_CAPACITY>,
    /// Index of the oldest pair once the buffer has wrapped.
    head: usize,
    dropped: u32,
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBuffer {
    pub const fn new() -> Self {
        Self {
            samples: Vec::new(),
            head: 0,
            dropped: 0,
        }
    }

    /// Append a pair, overwriting the oldest one when full.
    pub fn push(&mut self, pair: SamplePair) {
        if let Err(pair) = self.samples.push(pair) {
            self.samples[self.head] = pair;
            self.head = (self.head + 1) % WINDOW_CAPACITY;
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.head = 0;
    }

    /// Oldest-first contents as two slices, the second empty unless the
    /// buffer has wrapped.
    pub fn as_slices(&self) -> (&[SamplePair], &[SamplePair]) {
        let (newer, older) = self.samples.split_at(self.head);
        (older, newer)
    }

    /// Oldest-first iterator.
    pub fn iter(&self) -> impl Iterator<Item = &SamplePair> + '_ {
        let (a, b) = self.as_slices();
        a.iter().chain(b)
    }

    /// Rotate the storage into arrival order and borrow it as one slice.
    /// Only does work after a wrap; called once per window.
    pub fn make_contiguous(&mut self) -> &[SamplePair] {
        if self.head != 0 {
            self.samples.rotate_left(self.head);
            self.head = 0;
        }
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Pairs evicted by the drop-oldest policy since construction.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Per-sample contact state machine.  Owns the only transition in the
/// pipeline: any sub-floor sample clears the window.
pub struct ContactTracker {
    thresholds: ContactThresholds,
    state: ContactState,
}

impl ContactTracker {
    pub fn new(thresholds: ContactThresholds) -> Self {
        Self {
            thresholds,
            state: ContactState::NoContact,
        }
    }

    pub fn state(&self) -> ContactState {
        self.state
    }

    /// Validate `pair` and either append it to `window` or clear `window`.
    pub fn admit(&mut self, pair: SamplePair, window: &mut WindowBuffer) -> Admission {
        let next = self.thresholds.classify(pair);
        let prev = core::mem::replace(&mut self.state, next);
        match next {
            ContactState::Contact => {
                window.push(pair);
                Admission::Appended
            }
            ContactState::NoContact => {
                window.clear();
                Admission::Rejected {
                    transition: prev == ContactState::Contact,
                }
            }
        }
    }
}
