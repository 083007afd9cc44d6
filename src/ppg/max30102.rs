//! MAX30102 pulse-oximetry sensor driver.
//!
//! Register-level access over any `embedded-hal` 1.0 I2C bus.  The driver
//! only knows the handful of registers the acquisition loop needs:
//! identity, interrupt status, the FIFO data port, and the configuration
//! block written once at startup.
//!
//! ## FIFO slot layout (multi-LED mode, slot 1 = IR, slot 2 = red)
//!
//! | Byte | Content                         |
//! |------|---------------------------------|
//! | 0    | IR  bits 17..16 (low 2 bits)    |
//! | 1    | IR  bits 15..8                  |
//! | 2    | IR  bits 7..0                   |
//! | 3..6 | same layout for the red channel |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::error::{SensorError, i2c_error};

/// 7-bit I2C address.
pub const I2C_ADDRESS: u8 = 0x57;

/// Value of [`reg::PART_ID`] on a genuine part.
pub const EXPECTED_PART_ID: u8 = 0x15;

/// "New FIFO data" flag in [`reg::INTR_STATUS_1`].
pub const INTR_NEW_FIFO_DATA: u8 = 1 << 6;

/// Bytes per FIFO slot (two 3-byte channels).
pub const FIFO_SLOT_LEN: usize = 6;

/// Register map.
pub mod reg {
    /// Interrupt status 1; read-clears.
    pub const INTR_STATUS_1: u8 = 0x00;
    pub const INTR_STATUS_2: u8 = 0x01;
    pub const INTR_ENABLE_1: u8 = 0x02;
    pub const INTR_ENABLE_2: u8 = 0x03;
    pub const FIFO_WR_PTR: u8 = 0x04;
    pub const OVF_COUNTER: u8 = 0x05;
    pub const FIFO_RD_PTR: u8 = 0x06;
    pub const FIFO_DATA: u8 = 0x07;
    pub const FIFO_CONFIG: u8 = 0x08;
    pub const MODE_CONFIG: u8 = 0x09;
    pub const SPO2_CONFIG: u8 = 0x0A;
    /// LED1 (infrared) pulse amplitude.
    pub const LED1_PA: u8 = 0x0C;
    /// LED2 (red) pulse amplitude.
    pub const LED2_PA: u8 = 0x0D;
    pub const SLOT_12: u8 = 0x11;
    pub const SLOT_34: u8 = 0x12;
    pub const PART_ID: u8 = 0xFF;
}

const MODE_RESET: u8 = 0x40;
const MODE_MULTI_LED: u8 = 0x07;
/// 8-sample averaging, FIFO roll-over, almost-full at 15 free slots.
const FIFO_CONFIG_VALUE: u8 = 0x7F;
/// ADC range 8192 nA, 100 samples/s, 411 µs pulse width.
const SPO2_CONFIG_VALUE: u8 = 0x47;
/// Slot 1 = LED1 (IR), slot 2 = LED2 (red).
const SLOT_12_VALUE: u8 = 0x21;

/// One FIFO slot: two 18-bit magnitudes sampled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplePair {
    pub ir: u32,
    pub red: u32,
}

/// Decode one 18-bit channel from its three packed bytes.
#[inline]
fn decode_channel(b: &[u8]) -> u32 {
    (u32::from(b[0] & 0x03) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2])
}

/// Decode one FIFO slot into an infrared/red pair.
pub fn decode_fifo_slot(raw: &[u8; FIFO_SLOT_LEN]) -> SamplePair {
    SamplePair {
        ir: decode_channel(&raw[0..3]),
        red: decode_channel(&raw[3..6]),
    }
}

/// LED drive strengths written at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedAmplitudes {
    pub ir: u8,
    pub red: u8,
}

/// Driver over an owned I2C bus handle.
pub struct Max30102<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Max30102<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, I2C_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give the bus handle back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn read_register(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(i2c_error)?;
        Ok(buf[0])
    }

    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(i2c_error)
    }

    pub fn part_id(&mut self) -> Result<u8, SensorError> {
        self.read_register(reg::PART_ID)
    }

    /// Read (and thereby clear) interrupt status 1.
    pub fn interrupt_status(&mut self) -> Result<u8, SensorError> {
        self.read_register(reg::INTR_STATUS_1)
    }

    /// Read one FIFO slot.
    pub fn read_fifo_slot(&mut self) -> Result<SamplePair, SensorError> {
        let mut raw = [0u8; FIFO_SLOT_LEN];
        self.i2c
            .write_read(self.address, &[reg::FIFO_DATA], &mut raw)
            .map_err(i2c_error)?;
        Ok(decode_fifo_slot(&raw))
    }

    /// Check the identity register once.
    pub fn verify_identity(&mut self) -> Result<(), SensorError> {
        match self.part_id()? {
            EXPECTED_PART_ID => Ok(()),
            found => Err(SensorError::WrongPartId {
                expected: EXPECTED_PART_ID,
                found,
            }),
        }
    }

    /// Read the identity register until it matches, sleeping `retry_ms`
    /// between attempts.  Never gives up: nothing downstream can run
    /// without a verified sensor.  Returns the number of failed reads.
    pub fn wait_for_identity(&mut self, delay: &mut impl DelayNs, retry_ms: u32) -> u32 {
        let mut failures = 0u32;
        loop {
            match self.verify_identity() {
                Ok(()) => return failures,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!("MAX30102: waiting for sensor ({e})");
                    delay.delay_ms(retry_ms);
                }
            }
        }
    }

    /// Reset the part and program multi-LED SpO2 sampling with a
    /// data-ready interrupt.
    pub fn configure(&mut self, leds: LedAmplitudes) -> Result<(), SensorError> {
        self.write_register(reg::MODE_CONFIG, MODE_RESET)?;
        // Clear any interrupt latched across the reset.
        self.interrupt_status()?;

        self.write_register(reg::INTR_ENABLE_1, INTR_NEW_FIFO_DATA)?;
        self.write_register(reg::FIFO_CONFIG, FIFO_CONFIG_VALUE)?;
        self.write_register(reg::MODE_CONFIG, MODE_MULTI_LED)?;
        self.write_register(reg::SPO2_CONFIG, SPO2_CONFIG_VALUE)?;

        self.write_register(reg::LED2_PA, leds.red)?;
        self.write_register(reg::LED1_PA, leds.ir)?;

        self.write_register(reg::SLOT_12, SLOT_12_VALUE)?;
        self.write_register(reg::SLOT_34, 0x00)?;
        self.write_register(reg::FIFO_WR_PTR, 0x00)?;
        self.write_register(reg::OVF_COUNTER, 0x00)?;
        self.write_register(reg::FIFO_RD_PTR, 0x00)?;

        info!("MAX30102: configured (IR PA=0x{:02X}, red PA=0x{:02X})", leds.ir, leds.red);
        Ok(())
    }
}
