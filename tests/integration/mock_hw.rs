//! Mock hardware for integration tests.
//!
//! `MockI2c` emulates a MAX30102 and an MPU6050 sharing one bus closely
//! enough for the drivers: a register pointer set by the first written
//! byte, a FIFO that drains one slot per data-port read, and a status
//! register whose "new data" bit follows the FIFO.  Every register write
//! is recorded so tests can assert on configuration sequences.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};
use pulseband::app::ports::{ReportError, ReportPort, TimePort};
use pulseband::imu;
use pulseband::ppg::max30102::{self, SamplePair};

// ── I2C bus ───────────────────────────────────────────────────

#[derive(Default)]
pub struct BusState {
    /// Register values returned by single-byte reads, per (address, reg).
    pub regs: HashMap<(u8, u8), u8>,
    /// Multi-byte reads, per (address, reg).
    pub blocks: HashMap<(u8, u8), Vec<u8>>,
    /// MAX30102 FIFO contents, oldest first.
    pub fifo: VecDeque<[u8; 6]>,
    /// Part-ID values served before the genuine one.
    pub bogus_part_ids: VecDeque<u8>,
    /// Every register write: (address, reg, value).
    pub writes: Vec<(u8, u8, u8)>,
    /// Transactions left to fail.
    pub fail_next: u32,
    pub transactions: u32,
}

#[derive(Clone, Default)]
pub struct MockI2c {
    pub state: Arc<Mutex<BusState>>,
}

#[allow(dead_code)]
impl MockI2c {
    /// A bus with a genuine MAX30102 and MPU6050 attached.
    pub fn new() -> Self {
        let bus = Self::default();
        {
            let mut s = bus.state();
            s.regs.insert(
                (max30102::I2C_ADDRESS, max30102::reg::PART_ID),
                max30102::EXPECTED_PART_ID,
            );
            s.regs
                .insert((imu::I2C_ADDRESS, imu::reg::WHO_AM_I), imu::EXPECTED_WHO_AM_I);
        }
        bus
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, BusState> {
        self.state.lock().unwrap()
    }

    /// Queue one FIFO slot encoding `pair`.
    pub fn push_sample(&self, pair: SamplePair) {
        self.state().fifo.push_back(encode_slot(pair));
    }

    pub fn fail_next(&self, n: u32) {
        self.state().fail_next = n;
    }

    /// Register writes to `address`, in order.
    pub fn writes_to(&self, address: u8) -> Vec<(u8, u8)> {
        self.state()
            .writes
            .iter()
            .filter(|(a, _, _)| *a == address)
            .map(|&(_, r, v)| (r, v))
            .collect()
    }
}

/// Inverse of the driver's slot decode.
pub fn encode_slot(pair: SamplePair) -> [u8; 6] {
    let ch = |v: u32| [((v >> 16) & 0x03) as u8, (v >> 8) as u8, v as u8];
    let ir = ch(pair.ir);
    let red = ch(pair.red);
    [ir[0], ir[1], ir[2], red[0], red[1], red[2]]
}

impl i2c::ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut s = self.state.lock().unwrap();
        s.transactions += 1;
        if s.fail_next > 0 {
            s.fail_next -= 1;
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        }
        if address != max30102::I2C_ADDRESS && address != imu::I2C_ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let mut pointer: Option<u8> = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, values)) = bytes.split_first() else {
                        continue;
                    };
                    pointer = Some(reg);
                    for (i, &v) in values.iter().enumerate() {
                        let r = reg.wrapping_add(i as u8);
                        s.writes.push((address, r, v));
                    }
                }
                Operation::Read(buf) => {
                    let reg = pointer.unwrap_or(0);
                    read_into(&mut s, address, reg, buf);
                }
            }
        }
        Ok(())
    }
}

fn read_into(s: &mut BusState, address: u8, reg: u8, buf: &mut [u8]) {
    if address == max30102::I2C_ADDRESS {
        match reg {
            max30102::reg::FIFO_DATA => {
                let slot = s.fifo.pop_front().unwrap_or_default();
                buf.copy_from_slice(&slot[..buf.len()]);
                return;
            }
            max30102::reg::INTR_STATUS_1 => {
                buf[0] = if s.fifo.is_empty() {
                    0
                } else {
                    max30102::INTR_NEW_FIFO_DATA
                };
                return;
            }
            max30102::reg::PART_ID => {
                if let Some(id) = s.bogus_part_ids.pop_front() {
                    buf[0] = id;
                    return;
                }
            }
            _ => {}
        }
    }
    if let Some(block) = s.blocks.get(&(address, reg)) {
        buf.copy_from_slice(&block[..buf.len()]);
        return;
    }
    buf[0] = s.regs.get(&(address, reg)).copied().unwrap_or(0);
}

// ── Clock ─────────────────────────────────────────────────────

/// Manually advanced monotonic clock, shareable between the pipeline and
/// its window timer.
#[derive(Clone, Default)]
pub struct FakeClock(Arc<AtomicU64>);

#[allow(dead_code)]
impl FakeClock {
    pub fn advance_ms(&self, ms: u64) {
        self.0.fetch_add(ms * 1_000, Ordering::SeqCst);
    }

    pub fn set_us(&self, us: u64) {
        self.0.store(us, Ordering::SeqCst);
    }
}

impl TimePort for FakeClock {
    fn uptime_us(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
    pub calls: u32,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
        self.calls += 1;
    }
}

// ── Report port ───────────────────────────────────────────────

/// Collects published reports.
#[derive(Default)]
pub struct RecordingPort {
    pub connected: Arc<AtomicBool>,
    pub sent: Vec<(String, String)>,
}

#[allow(dead_code)]
impl RecordingPort {
    pub fn set_connected(&self, up: bool) {
        self.connected.store(up, Ordering::SeqCst);
    }
}

impl ReportPort for RecordingPort {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ReportError> {
        let body = String::from_utf8(payload.to_vec()).map_err(|_| ReportError::Encode)?;
        self.sent.push((topic.to_owned(), body));
        Ok(())
    }
}

// ── GPIO ──────────────────────────────────────────────────────

/// Output pin whose level is observable from the test thread.
#[derive(Clone, Default)]
pub struct MockPin {
    pub high: Arc<AtomicBool>,
}

impl MockPin {
    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::SeqCst)
    }
}

impl PinErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high.store(true, Ordering::SeqCst);
        Ok(())
    }
}
