//! MPU6050 accelerometer/gyroscope driver.
//!
//! Polled, not interrupt driven: the worker checks the data-ready bit in
//! `INT_STATUS` every [`POLL_INTERVAL_MS`] and reads both 3-axis blocks
//! when it is set.  Axis registers are big-endian two's complement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};
use serde::Serialize;

use crate::error::{SensorError, i2c_error};

/// 7-bit I2C address (AD0 low).
pub const I2C_ADDRESS: u8 = 0x68;

/// WHO_AM_I value of the module variant fitted to the band.
pub const EXPECTED_WHO_AM_I: u8 = 0x70;

/// Data-ready poll period.
pub const POLL_INTERVAL_MS: u32 = 50;

pub mod reg {
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const CONFIG: u8 = 0x1A;
    pub const GYRO_CONFIG: u8 = 0x1B;
    pub const ACCEL_CONFIG: u8 = 0x1C;
    pub const INT_STATUS: u8 = 0x3A;
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    pub const GYRO_XOUT_H: u8 = 0x43;
    pub const PWR_MGMT_1: u8 = 0x6B;
    pub const WHO_AM_I: u8 = 0x75;
}

const DEVICE_RESET: u8 = 0x80;
/// Temperature sensor disabled, internal oscillator.
const PWR_TEMP_DIS: u8 = 0x08;
/// Temperature sensor disabled, PLL with Z-gyro reference.
const PWR_TEMP_DIS_PLL_Z: u8 = 0x0B;
/// DLPF ~5 Hz.
const CONFIG_DLPF_5HZ: u8 = 0x06;
/// 1 kHz / (1 + 199) = 5 Hz output rate.
const SMPLRT_DIV_5HZ: u8 = 0xC7;
/// ±2000 °/s.
const GYRO_FS_2000: u8 = 0x18;
/// ±16 g.
const ACCEL_FS_16G: u8 = 0x18;

const DATA_READY: u8 = 0x01;

/// One accelerometer + gyroscope reading in raw counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MotionSample {
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
}

/// Decode three big-endian signed axes.
pub fn decode_axes(raw: &[u8; 6]) -> [i16; 3] {
    [
        i16::from_be_bytes([raw[0], raw[1]]),
        i16::from_be_bytes([raw[2], raw[3]]),
        i16::from_be_bytes([raw[4], raw[5]]),
    ]
}

pub struct Mpu6050<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Mpu6050<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: I2C_ADDRESS,
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(i2c_error)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(i2c_error)
    }

    fn read_block(&mut self, reg: u8) -> Result<[i16; 3], SensorError> {
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(self.address, &[reg], &mut raw)
            .map_err(i2c_error)?;
        Ok(decode_axes(&raw))
    }

    pub fn verify_identity(&mut self) -> Result<(), SensorError> {
        match self.read_register(reg::WHO_AM_I)? {
            EXPECTED_WHO_AM_I => Ok(()),
            found => Err(SensorError::WrongPartId {
                expected: EXPECTED_WHO_AM_I,
                found,
            }),
        }
    }

    /// Read WHO_AM_I until it matches.  Returns the number of failed reads.
    pub fn wait_for_identity(&mut self, delay: &mut impl DelayNs, retry_ms: u32) -> u32 {
        let mut failures = 0u32;
        loop {
            match self.verify_identity() {
                Ok(()) => return failures,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!("MPU6050: waiting for sensor ({e})");
                    delay.delay_ms(retry_ms);
                }
            }
        }
    }

    pub fn configure(&mut self) -> Result<(), SensorError> {
        self.write_register(reg::PWR_MGMT_1, DEVICE_RESET)?;
        self.write_register(reg::PWR_MGMT_1, PWR_TEMP_DIS)?;
        self.write_register(reg::PWR_MGMT_1, PWR_TEMP_DIS_PLL_Z)?;
        self.write_register(reg::CONFIG, CONFIG_DLPF_5HZ)?;
        self.write_register(reg::SMPLRT_DIV, SMPLRT_DIV_5HZ)?;
        self.write_register(reg::GYRO_CONFIG, GYRO_FS_2000)?;
        self.write_register(reg::ACCEL_CONFIG, ACCEL_FS_16G)?;
        info!("MPU6050: configured");
        Ok(())
    }

    pub fn data_ready(&mut self) -> Result<bool, SensorError> {
        Ok(self.read_register(reg::INT_STATUS)? & DATA_READY != 0)
    }

    pub fn read_motion(&mut self) -> Result<MotionSample, SensorError> {
        Ok(MotionSample {
            accel: self.read_block(reg::ACCEL_XOUT_H)?,
            gyro: self.read_block(reg::GYRO_XOUT_H)?,
        })
    }

    /// Read a sample if one is ready.
    pub fn poll(&mut self) -> Result<Option<MotionSample>, SensorError> {
        if self.data_ready()? {
            self.read_motion().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Latest motion sample shared with the reporter.
#[derive(Default)]
pub struct MotionFeed {
    latest: Mutex<MotionSample>,
    fresh: AtomicBool,
}

impl MotionFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: MotionSample) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = sample;
        self.fresh.store(true, Ordering::Release);
    }

    pub fn latest(&self) -> MotionSample {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` once per publish; clears on read.
    pub fn take_new_value(&self) -> bool {
        self.fresh.swap(false, Ordering::Acquire)
    }
}

/// Polling loop: read when data-ready, sleep [`POLL_INTERVAL_MS`].
pub fn run<I2C: I2c>(imu: &mut Mpu6050<I2C>, feed: &MotionFeed, delay: &mut impl DelayNs) -> ! {
    loop {
        match imu.poll() {
            Ok(Some(sample)) => feed.publish(sample),
            Ok(None) => {}
            Err(e) => warn!("MPU6050: poll skipped: {}", e),
        }
        delay.delay_ms(POLL_INTERVAL_MS);
    }
}
