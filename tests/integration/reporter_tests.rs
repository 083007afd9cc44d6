//! Integration tests: VitalsReporter gating and payloads.

use std::sync::Arc;

use pulseband::app::reporter::VitalsReporter;
use pulseband::config::ReportConfig;
use pulseband::imu::{MotionFeed, MotionSample};
use pulseband::ppg::Vitals;

use super::mock_hw::RecordingPort;

fn reporter() -> (VitalsReporter<RecordingPort>, Arc<Vitals>, Arc<MotionFeed>) {
    let vitals = Arc::new(Vitals::default());
    let motion = Arc::new(MotionFeed::new());
    let r = VitalsReporter::new(
        RecordingPort::default(),
        ReportConfig::default(),
        Arc::clone(&vitals),
    )
    .with_motion(Arc::clone(&motion));
    (r, vitals, motion)
}

#[test]
fn reports_only_when_linked_and_fresh() {
    let (mut r, vitals, _motion) = reporter();
    r.port().set_connected(true);
    assert_eq!(r.poll(), 0, "nothing published yet");

    vitals.publish(98.0, 72);
    assert_eq!(r.poll(), 1);
    assert_eq!(r.poll(), 0, "flag is edge-triggered");

    let sent = &r.port().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "center/data_sensor_1");
    assert_eq!(sent[0].1, r#"{"spo2":98.0,"bpm":72}"#);
}

#[test]
fn link_down_keeps_the_new_value_pending() {
    let (mut r, vitals, _motion) = reporter();
    vitals.publish(96.5, 61);
    assert_eq!(r.poll(), 0);
    assert_eq!(r.poll(), 0);

    r.port().set_connected(true);
    assert_eq!(r.poll(), 1);
    assert_eq!(r.port().sent[0].1, r#"{"spo2":96.5,"bpm":61}"#);
}

#[test]
fn motion_goes_to_its_own_topic() {
    let (mut r, _vitals, motion) = reporter();
    r.port().set_connected(true);
    motion.publish(MotionSample {
        accel: [0, 0, 2048],
        gyro: [1, -1, 0],
    });
    assert_eq!(r.poll(), 1);
    let (topic, body) = &r.port().sent[0];
    assert_eq!(topic, "center/data_sensor_2");
    assert_eq!(
        body,
        r#"{"accel_x":0,"accel_y":0,"accel_z":2048,"gyro_x":1,"gyro_y":-1,"gyro_z":0}"#
    );
    assert_eq!(r.stats().sent, 1);
}
