//! Beat and oximetry estimator.
//!
//! Runs once per window boundary over the samples gathered since the
//! previous boundary.  Per window:
//!
//! 1. Local extrema of the red channel within a `±radius` neighbourhood
//!    (strict comparison on every neighbour) classify centres as troughs
//!    or peaks.  Every peak is a beat.
//! 2. A peak that follows a remembered trough yields one SpO2 estimate from
//!    the ratio-of-ratios of the two channels' AC/DC components.  The trough
//!    is consumed.
//! 3. The median estimate feeds an exponential smoother capped at 100 %.
//! 4. Heart rate combines up to three windows of beat counts over the
//!    elapsed time since the oldest known boundary.
//!
//! Windows too short to hold one full neighbourhood, or without a single
//! trough→peak pair, publish nothing.  The boundary chain still advances.

use heapless::Vec;
use log::debug;

use super::max30102::SamplePair;
use super::window::WINDOW_CAPACITY;
use crate::config::{PpgConfig, SmoothingWeights};

const MICROS_PER_MINUTE: u64 = 60_000_000;

/// Classification of one centre index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Trough,
    Peak,
}

/// Classify `samples[i]` by comparing its red value against the `radius`
/// neighbours on each side.  `None` for non-extrema and for centres too
/// close to either edge.
pub fn classify(samples: &[SamplePair], i: usize, radius: usize) -> Option<Extremum> {
    if radius == 0 || i < radius || i + radius >= samples.len() {
        return None;
    }
    let centre = samples[i].red;
    let neighbours = samples[i - radius..=i + radius]
        .iter()
        .enumerate()
        .filter(|&(k, _)| k != radius)
        .map(|(_, s)| s.red);

    let mut below_all = true;
    let mut above_all = true;
    for n in neighbours {
        below_all &= centre < n;
        above_all &= centre > n;
    }
    match (below_all, above_all) {
        (true, _) => Some(Extremum::Trough),
        (_, true) => Some(Extremum::Peak),
        _ => None,
    }
}

/// All extrema of a window in index order.
pub fn extrema(
    samples: &[SamplePair],
    radius: usize,
) -> impl Iterator<Item = (usize, Extremum)> + '_ {
    let end = samples.len().saturating_sub(radius);
    (radius..end).filter_map(move |i| classify(samples, i, radius).map(|e| (i, e)))
}

/// Coefficients of the per-peak SpO2 computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorParams {
    pub radius: usize,
    pub ratio_min: f32,
    pub ratio_max: f32,
    pub intercept: f32,
    pub slope: f32,
    pub initial_spo2: f32,
    pub smoothing: SmoothingWeights,
}

impl From<&PpgConfig> for EstimatorParams {
    fn from(c: &PpgConfig) -> Self {
        Self {
            radius: c.peak_radius,
            ratio_min: c.ratio_min,
            ratio_max: c.ratio_max,
            intercept: c.spo2_intercept,
            slope: c.spo2_slope,
            initial_spo2: c.spo2_initial,
            smoothing: c.smoothing,
        }
    }
}

impl EstimatorParams {
    /// AC/DC ratio clamped to the configured band.  A zero mean only
    /// occurs for an all-zero channel and maps to the band floor.
    fn ac_ratio(&self, ac: f32, mean: f32) -> f32 {
        if mean > 0.0 {
            (ac / mean).clamp(self.ratio_min, self.ratio_max)
        } else {
            self.ratio_min
        }
    }
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self::from(&PpgConfig::default())
    }
}

/// Per-window result before history is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAnalysis {
    /// Peaks found in the window.
    pub beats: u32,
    /// Median of the per-peak SpO2 estimates; `None` if no peak had a
    /// preceding trough.
    pub median_spo2: Option<f32>,
    /// Number of per-peak estimates.
    pub estimates: usize,
}

/// Median of `values`; upper median for even counts.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f32::total_cmp);
    Some(values[values.len() / 2])
}

/// Single-window analysis: beat count and median SpO2.  `None` for a window
/// shorter than one full neighbourhood.
pub fn analyse_window(samples: &[SamplePair], p: &EstimatorParams) -> Option<WindowAnalysis> {
    if samples.len() <= 2 * p.radius {
        return None;
    }

    let n = samples.len() as f32;
    let (ir_sum, red_sum) = samples.iter().fold((0u64, 0u64), |(ir, red), s| {
        (ir + u64::from(s.ir), red + u64::from(s.red))
    });
    let ir_mean = ir_sum as f32 / n;
    let red_mean = red_sum as f32 / n;

    let mut beats = 0u32;
    let mut trough: Option<SamplePair> = None;
    let mut estimates: Vec<f32, { WINDOW_CAPACITY / 2 + 1 }> = Vec::new();

    for (i, kind) in extrema(samples, p.radius) {
        match kind {
            Extremum::Trough => trough = Some(samples[i]),
            Extremum::Peak => {
                beats += 1;
                if let Some(t) = trough.take() {
                    let peak = samples[i];
                    let red_ac = peak.red.saturating_sub(t.red) as f32;
                    let ir_ac = peak.ir.saturating_sub(t.ir) as f32;
                    let red_ratio = p.ac_ratio(red_ac, red_mean);
                    let ir_ratio = p.ac_ratio(ir_ac, ir_mean);
                    let r = red_ratio / ir_ratio;
                    // Extrema alternate, so at most half the window are peaks.
                    let _ = estimates.push(p.intercept - p.slope * r);
                }
            }
        }
    }

    let count = estimates.len();
    Some(WindowAnalysis {
        beats,
        median_spo2: median(&mut estimates),
        estimates: count,
    })
}

/// Published outcome of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Smoothed SpO2 (%).
    pub spo2: f32,
    /// Heart rate (beats per minute).
    pub heart_rate: u32,
    /// Median SpO2 of this window before smoothing.
    pub median: f32,
    /// Beats in this window.
    pub beats: u32,
    /// Windows combined into `heart_rate` (1..=3).
    pub windows_combined: u8,
}

/// Whether the estimator has seen a full window since its last restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingFirstWindow,
    Steady,
}

/// Cross-window state: boundary timestamps, trailing beat counts and the
/// smoothed SpO2.
pub struct Estimator {
    params: EstimatorParams,
    smoothed: f32,
    /// Most recent boundary (µs).
    newest: u64,
    /// The two boundaries before `newest`, most recent first.
    older: [Option<u64>; 2],
    /// Beat counts of the two windows before the current one, most recent
    /// first.
    beats: [u32; 2],
}

impl Estimator {
    /// `start_us` is the first boundary: the moment the first window opened.
    pub fn new(params: EstimatorParams, start_us: u64) -> Self {
        Self {
            smoothed: params.initial_spo2,
            params,
            newest: start_us,
            older: [None, None],
            beats: [0, 0],
        }
    }

    pub fn params(&self) -> &EstimatorParams {
        &self.params
    }

    pub fn smoothed_spo2(&self) -> f32 {
        self.smoothed
    }

    pub fn phase(&self) -> Phase {
        if self.older[0].is_some() {
            Phase::Steady
        } else {
            Phase::AwaitingFirstWindow
        }
    }

    /// Restart the boundary chain at `now_us`.  Beat counts from before the
    /// restart are never combined with later windows.  The smoothed SpO2
    /// is kept.
    pub fn restart(&mut self, now_us: u64) {
        self.newest = now_us;
        self.older = [None, None];
        self.beats = [0, 0];
    }

    /// Close the window ending at `now_us`.  The boundary history rolls on
    /// every call; an estimate is returned only when the window produced
    /// at least one SpO2 estimate.
    pub fn process(&mut self, samples: &[SamplePair], now_us: u64) -> Option<Estimate> {
        let analysis = analyse_window(samples, &self.params);
        let beats = analysis.as_ref().map_or(0, |a| a.beats);

        let (total, since, windows) = match self.older {
            [Some(_), Some(oldest)] => (beats + self.beats[0] + self.beats[1], oldest, 3),
            [Some(prev), None] => (beats + self.beats[0], prev, 2),
            _ => (beats, self.newest, 1),
        };
        let elapsed = now_us.saturating_sub(since);

        self.older = [Some(self.newest), self.older[0]];
        self.newest = now_us;
        self.beats = [beats, self.beats[0]];

        let median = analysis?.median_spo2?;
        let heart_rate = heart_rate(total, elapsed);
        let w = self.params.smoothing;
        self.smoothed = (self.smoothed * w.alpha + median * w.beta).min(100.0);

        debug!(
            "PPG: window beats={} median={:.1} spo2={:.1} bpm={} ({} windows)",
            beats, median, self.smoothed, heart_rate, windows
        );

        Some(Estimate {
            spo2: self.smoothed,
            heart_rate,
            median,
            beats,
            windows_combined: windows,
        })
    }
}

/// Beats per minute from a beat count and elapsed microseconds.
pub fn heart_rate(beats: u32, elapsed_us: u64) -> u32 {
    if elapsed_us == 0 {
        return 0;
    }
    (u64::from(beats) * MICROS_PER_MINUTE / elapsed_us) as u32
}
