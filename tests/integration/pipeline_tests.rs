//! Integration tests: PpgPipeline against the mock sensor bus.
//!
//! The clock is advanced by hand, one sensor slot per 100 ms (10 Hz), so a
//! 10-sample waveform period is exactly 60 beats per minute.

use std::sync::Arc;

use pulseband::config::{PpgConfig, SmoothingWeights};
use pulseband::drivers::hw_timer::DeadlineTimer;
use pulseband::ppg::max30102::{self, Max30102, SamplePair, reg};
use pulseband::ppg::window::{Admission, ContactState};
use pulseband::ppg::{Estimate, PpgPipeline, Vitals};

use super::mock_hw::{FakeClock, MockI2c, RecordingDelay};

const STEP_MS: u64 = 100;

type Pipeline = PpgPipeline<MockI2c, FakeClock, DeadlineTimer<FakeClock>>;

fn pipeline(config: &PpgConfig) -> (Pipeline, MockI2c, FakeClock, Arc<Vitals>) {
    let bus = MockI2c::new();
    let clock = FakeClock::default();
    let vitals = Arc::new(Vitals::new(config.spo2_initial));
    let timer = DeadlineTimer::new(clock.clone(), config.window_period_ms);
    let mut p = PpgPipeline::new(
        Max30102::new(bus.clone()),
        config,
        Arc::clone(&vitals),
        clock.clone(),
        timer,
    );
    p.setup(&mut RecordingDelay::default()).unwrap();
    (p, bus, clock, vitals)
}

/// Triangle pulse, period 10 samples: trough at phase 0, peak at phase 5.
/// Red AC/DC ≈ 0.0015 and IR AC/DC ≈ 0.0025, so R ≈ 0.6 and SpO2 ≈ 95.
fn pulse(i: usize) -> SamplePair {
    const SHAPE: [u32; 10] = [0, 1, 2, 3, 4, 5, 4, 3, 2, 1];
    let s = SHAPE[i % 10];
    SamplePair {
        ir: 80_000 + 40 * s,
        red: 100_000 + 30 * s,
    }
}

fn below_floor() -> SamplePair {
    SamplePair { ir: 1_000, red: 1_000 }
}

/// Push one slot, advance the clock, run one cycle.
fn step(p: &mut Pipeline, bus: &MockI2c, clock: &FakeClock, pair: SamplePair) -> Option<Estimate> {
    bus.push_sample(pair);
    clock.advance_ms(STEP_MS);
    p.cycle().unwrap()
}

#[test]
fn setup_retries_identity_then_configures_in_order() {
    let bus = MockI2c::new();
    bus.state().bogus_part_ids.extend([0x00, 0xFF]);
    let clock = FakeClock::default();
    let config = PpgConfig::default();
    let mut p = PpgPipeline::new(
        Max30102::new(bus.clone()),
        &config,
        Arc::new(Vitals::default()),
        clock.clone(),
        DeadlineTimer::new(clock, config.window_period_ms),
    );
    let mut delay = RecordingDelay::default();
    p.setup(&mut delay).unwrap();

    assert_eq!(delay.calls, 2);
    assert_eq!(delay.total_ns, 2 * 1_000_000_000);
    assert_eq!(
        bus.writes_to(max30102::I2C_ADDRESS),
        vec![
            (reg::MODE_CONFIG, 0x40),
            (reg::INTR_ENABLE_1, 0x40),
            (reg::FIFO_CONFIG, 0x7F),
            (reg::MODE_CONFIG, 0x07),
            (reg::SPO2_CONFIG, 0x47),
            (reg::LED2_PA, 0x5F),
            (reg::LED1_PA, 0x6F),
            (reg::SLOT_12, 0x21),
            (reg::SLOT_34, 0x00),
            (reg::FIFO_WR_PTR, 0x00),
            (reg::OVF_COUNTER, 0x00),
            (reg::FIFO_RD_PTR, 0x00),
        ]
    );
}

#[test]
fn ten_second_window_yields_sixty_bpm() {
    let config = PpgConfig::default();
    let (mut p, bus, clock, vitals) = pipeline(&config);

    let mut estimate = None;
    for i in 0..100 {
        let out = step(&mut p, &bus, &clock, pulse(i));
        if i < 99 {
            assert!(out.is_none(), "window closed early at sample {i}");
        }
        estimate = out;
    }
    let e = estimate.expect("window should close at 10 s");

    assert_eq!(e.beats, 10);
    assert_eq!(e.windows_combined, 1);
    assert_eq!(e.heart_rate, 60);
    assert!((e.median - 95.0).abs() < 0.2, "median {}", e.median);
    // 97 * 0.8 + 95 * 0.2
    assert!((e.spo2 - 96.6).abs() < 0.1, "spo2 {}", e.spo2);

    assert!(vitals.take_new_value());
    assert!(!vitals.take_new_value());
    assert_eq!(vitals.heart_rate(), 60);
    assert!(p.window().is_empty());
}

#[test]
fn consecutive_windows_combine_beat_history() {
    let config = PpgConfig::default();
    let (mut p, bus, clock, _vitals) = pipeline(&config);

    let mut estimates = Vec::new();
    for i in 0..300 {
        if let Some(e) = step(&mut p, &bus, &clock, pulse(i)) {
            estimates.push(e);
        }
    }
    let combined: Vec<u8> = estimates.iter().map(|e| e.windows_combined).collect();
    assert_eq!(combined, [1, 2, 3]);
    for e in &estimates {
        assert_eq!(e.heart_rate, 60);
    }
    assert_eq!(p.stats().windows, 3);
}

#[test]
fn contact_loss_clears_window_and_restarts_timer() {
    let config = PpgConfig::default();
    let (mut p, bus, clock, vitals) = pipeline(&config);

    for i in 0..50 {
        step(&mut p, &bus, &clock, pulse(i));
    }
    assert_eq!(p.window().len(), 50);
    assert_eq!(p.contact_state(), ContactState::Contact);

    // t = 5.1 s: finger lifted.
    bus.push_sample(below_floor());
    clock.advance_ms(STEP_MS);
    assert!(p.cycle().unwrap().is_none());
    assert!(p.window().is_empty());
    assert_eq!(p.contact_state(), ContactState::NoContact);
    assert_eq!(p.stats().contact_losses, 1);

    // First valid sample starts a fresh window with no carry-over.
    assert!(step(&mut p, &bus, &clock, pulse(0)).is_none());
    assert!(p.window().iter().eq([pulse(0)].iter()));

    // The original 10 s deadline has passed without a window closing.
    for i in 1..49 {
        assert!(step(&mut p, &bus, &clock, pulse(i)).is_none());
    }
    assert!(!vitals.take_new_value());

    // The restarted window closes 10 s after the loss and stands alone.
    let mut e = None;
    for i in 49..100 {
        if let Some(out) = step(&mut p, &bus, &clock, pulse(i)) {
            e = Some(out);
            break;
        }
    }
    let e = e.expect("restarted window should close");
    assert_eq!(e.windows_combined, 1);
}

#[test]
fn ingest_reports_transition_once() {
    let config = PpgConfig::default();
    let (mut p, _bus, _clock, _vitals) = pipeline(&config);
    assert_eq!(p.ingest(pulse(0)), Admission::Appended);
    assert_eq!(
        p.ingest(below_floor()),
        Admission::Rejected { transition: true }
    );
    assert_eq!(
        p.ingest(below_floor()),
        Admission::Rejected { transition: false }
    );
    assert_eq!(p.stats().rejected, 2);
}

#[test]
fn window_without_troughs_publishes_nothing() {
    let config = PpgConfig::default();
    let (mut p, bus, clock, vitals) = pipeline(&config);
    for i in 0..100 {
        let flat = SamplePair {
            ir: 90_000,
            red: 100_000 + i as u32,
        };
        assert!(step(&mut p, &bus, &clock, flat).is_none());
    }
    assert_eq!(p.stats().windows, 1);
    assert_eq!(p.stats().published, 0);
    assert!(!vitals.take_new_value());
    assert_eq!(vitals.spo2(), 97.0);
}

#[test]
fn bus_error_skips_cycle_without_losing_state() {
    let config = PpgConfig::default();
    let (mut p, bus, clock, _vitals) = pipeline(&config);
    step(&mut p, &bus, &clock, pulse(0));

    bus.push_sample(pulse(1));
    bus.fail_next(1);
    assert!(p.cycle().is_err());
    assert_eq!(p.window().len(), 1);

    // The slot is still queued and is picked up on the next cycle.
    p.cycle().unwrap();
    assert_eq!(p.window().len(), 2);
}

#[test]
fn no_new_data_bit_reads_nothing() {
    let config = PpgConfig::default();
    let (mut p, bus, _clock, _vitals) = pipeline(&config);
    let before = bus.state().transactions;
    assert!(p.cycle().unwrap().is_none());
    // Status read only; no FIFO access.
    assert_eq!(bus.state().transactions, before + 1);
}

#[test]
fn legacy_weights_drift_upward() {
    let config = PpgConfig {
        smoothing: SmoothingWeights::LEGACY,
        ..PpgConfig::default()
    };
    let (mut p, bus, clock, _vitals) = pipeline(&config);
    let mut last = None;
    for i in 0..100 {
        last = step(&mut p, &bus, &clock, pulse(i)).or(last);
    }
    let e = last.unwrap();
    // 97 * 0.8 + 95 * 0.23 = 99.45, above both inputs.
    assert!(e.spo2 > 99.0 && e.spo2 <= 100.0, "spo2 {}", e.spo2);
}
