//! Integration tests: MPU6050 driver, alone and sharing the bus.

use std::sync::Mutex;

use embedded_hal_bus::i2c::MutexDevice;
use pulseband::imu::{self, Mpu6050, reg};
use pulseband::ppg::max30102::{self, Max30102};

use super::mock_hw::{MockI2c, RecordingDelay};

#[test]
fn configure_writes_reference_sequence() {
    let bus = MockI2c::new();
    let mut mpu = Mpu6050::new(bus.clone());
    assert_eq!(mpu.wait_for_identity(&mut RecordingDelay::default(), 1_000), 0);
    mpu.configure().unwrap();
    assert_eq!(
        bus.writes_to(imu::I2C_ADDRESS),
        vec![
            (reg::PWR_MGMT_1, 0x80),
            (reg::PWR_MGMT_1, 0x08),
            (reg::PWR_MGMT_1, 0x0B),
            (reg::CONFIG, 0x06),
            (reg::SMPLRT_DIV, 0xC7),
            (reg::GYRO_CONFIG, 0x18),
            (reg::ACCEL_CONFIG, 0x18),
        ]
    );
}

#[test]
fn poll_reads_axes_only_when_ready() {
    let bus = MockI2c::new();
    {
        let mut s = bus.state();
        s.blocks.insert(
            (imu::I2C_ADDRESS, reg::ACCEL_XOUT_H),
            vec![0x00, 0x10, 0xFF, 0xF0, 0x08, 0x00],
        );
        s.blocks.insert(
            (imu::I2C_ADDRESS, reg::GYRO_XOUT_H),
            vec![0x80, 0x00, 0x00, 0x00, 0x7F, 0xFF],
        );
    }
    let mut mpu = Mpu6050::new(bus.clone());
    assert_eq!(mpu.poll().unwrap(), None);

    bus.state().regs.insert((imu::I2C_ADDRESS, reg::INT_STATUS), 0x01);
    let sample = mpu.poll().unwrap().unwrap();
    assert_eq!(sample.accel, [16, -16, 2048]);
    assert_eq!(sample.gyro, [i16::MIN, 0, i16::MAX]);
}

#[test]
fn both_sensors_share_one_bus() {
    let bus = MockI2c::new();
    let shared = Mutex::new(bus.clone());
    let mut ppg = Max30102::new(MutexDevice::new(&shared));
    let mut mpu = Mpu6050::new(MutexDevice::new(&shared));

    ppg.verify_identity().unwrap();
    mpu.verify_identity().unwrap();
    assert_eq!(ppg.part_id().unwrap(), max30102::EXPECTED_PART_ID);
}

#[test]
fn wrong_identity_is_reported() {
    let bus = MockI2c::new();
    bus.state()
        .regs
        .insert((imu::I2C_ADDRESS, reg::WHO_AM_I), 0x68);
    let mut mpu = Mpu6050::new(bus);
    let err = mpu.verify_identity().unwrap_err();
    assert_eq!(
        err.to_string(),
        "part ID 0x68, expected 0x70"
    );
}
