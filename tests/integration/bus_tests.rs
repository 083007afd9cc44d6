//! Integration tests: EventBus delivery and the subscribers wired to it.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pulseband::app::commands::{self, FIRMWARE_TOPIC, NOTICE_TOPIC};
use pulseband::bus::{EventBus, GENERAL_QUEUE_DEPTH};
use pulseband::config::BusConfig;
use pulseband::drivers::buzzer::Buzzer;
use pulseband::drivers::status_led::LedRequest;
use pulseband::error::BusError;
use pulseband::events::{EventId, LedLevel};

use super::mock_hw::MockPin;

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn general_channel_preserves_publish_order() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(EventId::SensorAlert, move |ev| {
        if let Some(n) = ev.payload::<u32>() {
            sink.lock().unwrap().push(*n);
        }
    });
    bus.start(&BusConfig::default()).unwrap();

    // Stay within queue depth per burst so nothing is dropped.
    for n in 0..40u32 {
        bus.publish(EventId::SensorAlert, Some(Arc::new(n)));
        if n as usize % GENERAL_QUEUE_DEPTH == GENERAL_QUEUE_DEPTH - 1 {
            assert!(wait_until(|| seen.lock().unwrap().len() > n as usize));
        }
    }
    assert!(wait_until(|| seen.lock().unwrap().len() == 40));
    assert_eq!(*seen.lock().unwrap(), (0..40).collect::<Vec<_>>());
    assert_eq!(bus.stats().general.dropped, 0);
    bus.stop();
}

#[test]
fn interrupt_channel_preserves_publish_order() {
    let bus = EventBus::new();
    let (tx, rx) = mpsc::channel();
    bus.subscribe_intr(EventId::Buzzer, move |v| {
        let _ = tx.send(v);
    });
    bus.start(&BusConfig::default()).unwrap();
    for v in 0..5 {
        bus.publish_from_isr(EventId::Buzzer, v);
    }
    let got: Vec<i32> = (0..5)
        .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
        .collect();
    assert_eq!(got, [0, 1, 2, 3, 4]);
    bus.stop();
}

#[test]
fn full_queue_never_blocks_publisher() {
    let bus = EventBus::new();
    let start = Instant::now();
    for _ in 0..1_000 {
        bus.publish(EventId::Button, None);
        bus.publish_from_isr(EventId::Buzzer, 1);
    }
    assert!(start.elapsed() < Duration::from_secs(1));
    let stats = bus.stats();
    assert_eq!(stats.general.published + stats.general.dropped, 1_000);
    assert!(stats.general.dropped >= 1_000 - GENERAL_QUEUE_DEPTH as u32);
    assert!(stats.intr.dropped > 0);
}

#[test]
fn start_is_idempotent_and_stop_is_final() {
    let bus = EventBus::new();
    let cfg = BusConfig::default();
    bus.start(&cfg).unwrap();
    bus.start(&cfg).unwrap();
    assert!(bus.is_running());
    bus.stop();
    assert!(!bus.is_running());
    assert_eq!(bus.start(&cfg), Err(BusError::Stopped));
}

#[test]
fn remote_notice_drives_buzzer() {
    let bus = EventBus::new();
    let pin = MockPin::default();
    let buzzer = Arc::new(Buzzer::new(pin.clone()));
    buzzer.attach(&bus);
    bus.start(&BusConfig::default()).unwrap();

    commands::handle(NOTICE_TOPIC, br#"{"notice":"1"}"#, &bus).unwrap();
    assert!(wait_until(|| pin.is_high()));

    commands::handle(NOTICE_TOPIC, br#"{"notice":"0"}"#, &bus).unwrap();
    assert!(wait_until(|| !pin.is_high()));
    bus.stop();
}

#[test]
fn firmware_url_reaches_general_subscriber() {
    let bus = EventBus::new();
    let (tx, rx) = mpsc::channel();
    bus.subscribe(EventId::FirmwareUpdate, move |ev| {
        if let Some(url) = ev.payload::<String>() {
            let _ = tx.send(url.clone());
        }
    });
    bus.start(&BusConfig::default()).unwrap();

    commands::handle(FIRMWARE_TOPIC, br#"{"url":"http://10.0.0.2/fw.bin"}"#, &bus).unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        "http://10.0.0.2/fw.bin"
    );
    bus.stop();
}

#[test]
fn led_level_follows_bus() {
    let bus = EventBus::new();
    let request = Arc::new(LedRequest::default());
    request.attach(&bus);
    bus.start(&BusConfig::default()).unwrap();

    bus.publish(EventId::LedState, Some(Arc::new(LedLevel::Blink)));
    assert!(wait_until(|| request.get() == LedLevel::Blink));
    bus.stop();
}
