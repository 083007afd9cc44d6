//! Pulseband Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Esp32TimeAdapter  EspWindowTimer  LogReportSink  PinWake      │
//! │  (TimePort)        (WindowTimer)   (ReportPort)   (WakeSource) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐    │
//! │  │ PpgPipeline  │  │ Mpu6050 poll │  │ VitalsReporter     │    │
//! │  │ (ppg-acq)    │  │ (imu)        │  │ (main thread)      │    │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘    │
//! │                                                                │
//! │  EventBus: bus-events (pri 2) · bus-intr (pri 4)               │
//! │  Buzzer · StatusLed · Button                                   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::num::NonZeroU32;
use core::time::Duration;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use embedded_hal_bus::i2c::MutexDevice;
use esp_idf_hal::delay::{FreeRtos, TickType};
use esp_idf_hal::gpio::{AnyIOPin, Input, InterruptType, PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::task::notification::Notification;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::sys::EspError;
use log::{error, info};

use pulseband::adapters::log_sink::LogReportSink;
use pulseband::adapters::time::Esp32TimeAdapter;
use pulseband::app::ports::TimePort;
use pulseband::app::reporter::VitalsReporter;
use pulseband::bus::EventBus;
use pulseband::config::SystemConfig;
use pulseband::drivers::buzzer::Buzzer;
use pulseband::drivers::hw_timer::EspWindowTimer;
use pulseband::drivers::status_led::{LedRequest, StatusLed};
use pulseband::drivers::task_pin::TaskBuilder;
use pulseband::drivers::button;
use pulseband::error::Error;
use pulseband::events::EventId;
use pulseband::imu::{self, MotionFeed, Mpu6050};
use pulseband::pins;
use pulseband::ppg::{Max30102, PpgPipeline, Vitals, WakeSource};

/// Status LED refresh period.
const LED_TICK_MS: u32 = 50;

// ── Data-ready wake (GPIO ISR → task notification) ────────────
//
// The notification belongs to the task that creates it, so `PinWake` is
// built on the acquisition thread itself.

struct PinWake {
    pin: PinDriver<'static, AnyIOPin, Input>,
    notification: Notification,
}

impl PinWake {
    fn new(pin: AnyIOPin) -> Result<Self> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_interrupt_type(InterruptType::NegEdge)?;

        let notification = Notification::new();
        let notifier = notification.notifier();
        // SAFETY: the callback only posts a task notification, which is
        // ISR-safe and allocation-free.
        unsafe {
            pin.subscribe(move || {
                let _ = notifier.notify_and_yield(NonZeroU32::MIN);
            })?;
        }
        pin.enable_interrupt()?;
        Ok(Self { pin, notification })
    }
}

impl WakeSource for PinWake {
    fn wait(&mut self, timeout: Duration) -> bool {
        // The driver disarms the interrupt after each edge.
        if let Err(e) = self.pin.enable_interrupt() {
            error!("ppg: re-arming INT failed: {}", e);
        }
        let ticks = TickType::new_millis(timeout.as_millis() as u64).ticks();
        self.notification.wait(ticks).is_some()
    }
}

/// Log the driver's error and report which setup stage failed.
fn init_failed(stage: &'static str) -> impl FnOnce(EspError) -> Error {
    move |e| {
        error!("{}: {}", stage, e);
        Error::Init(stage)
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Pulseband v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = SystemConfig::default();
    config.ppg.validate().map_err(Error::Config)?;

    // ── 3. Event bus and its GPIO subscribers ─────────────────
    let bus = EventBus::global();
    let peripherals = Peripherals::take().map_err(init_failed("peripherals"))?;

    // SAFETY: every GPIO below is claimed exactly once, here, from the
    // pin map; `peripherals.pins` is never used.
    let (buzzer_pin, led_pin, button_pin, int_pin, sda, scl) = unsafe {
        (
            AnyIOPin::new(pins::BUZZER_GPIO),
            AnyIOPin::new(pins::STATUS_LED_GPIO),
            AnyIOPin::new(pins::BUTTON_GPIO),
            AnyIOPin::new(pins::PPG_INT_GPIO),
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
        )
    };

    let buzzer = Arc::new(Buzzer::new(PinDriver::output(buzzer_pin)?));
    buzzer.attach(bus);

    let led_request = Arc::new(LedRequest::default());
    led_request.attach(bus);

    let sink = LogReportSink::new();
    sink.follow_link(bus);

    bus.subscribe(EventId::FirmwareUpdate, |ev| {
        if let Some(url) = ev.payload::<String>() {
            info!("ota: update requested from {}", url);
        }
    });

    bus.start(&config.bus).map_err(Error::from)?;

    // ── 4. GPIO workers ───────────────────────────────────────
    let time = Esp32TimeAdapter::new();

    let mut led = StatusLed::new(PinDriver::output(led_pin)?, Arc::clone(&led_request));
    TaskBuilder::new("status-led").stack_kb(3).spawn(move || {
        loop {
            led.tick(time.uptime_ms());
            FreeRtos::delay_ms(LED_TICK_MS);
        }
    })?;

    let mut button_pin = PinDriver::input(button_pin)?;
    button_pin.set_pull(Pull::Down)?;
    TaskBuilder::new("button")
        .priority(2)
        .stack_kb(3)
        .spawn(move || button::run(button_pin, EventBus::global(), &mut FreeRtos))?;

    // ── 5. Shared I2C bus ─────────────────────────────────────
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )
    .map_err(init_failed("I2C driver"))?;
    let i2c: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c)));

    // ── 6. PPG acquisition ────────────────────────────────────
    let vitals = Arc::new(Vitals::new(config.ppg.spo2_initial));
    let timer = EspWindowTimer::start(config.ppg.window_period_ms)
        .map_err(init_failed("window timer"))?;
    let mut pipeline = PpgPipeline::new(
        Max30102::new(MutexDevice::new(i2c)),
        &config.ppg,
        Arc::clone(&vitals),
        time,
        timer,
    );
    TaskBuilder::new("ppg-acq")
        .priority(config.tasks.ppg_priority)
        .stack_kb(config.tasks.ppg_stack_kb)
        .spawn(move || {
            if let Err(e) = pipeline.setup(&mut FreeRtos) {
                error!("ppg: setup failed: {}", e);
                return;
            }
            match PinWake::new(int_pin) {
                Ok(mut wake) => pipeline.run(&mut wake),
                Err(e) => error!("ppg: INT pin setup failed: {}", e),
            }
        })?;

    // ── 7. Motion sensor ──────────────────────────────────────
    let motion = Arc::new(MotionFeed::new());
    let feed = Arc::clone(&motion);
    let retry_ms = config.ppg.identity_retry_ms;
    TaskBuilder::new("imu")
        .priority(config.tasks.imu_priority)
        .stack_kb(config.tasks.imu_stack_kb)
        .spawn(move || {
            let mut mpu = Mpu6050::new(MutexDevice::new(i2c));
            mpu.wait_for_identity(&mut FreeRtos, retry_ms);
            if let Err(e) = mpu.configure() {
                error!("imu: configure failed: {}", e);
                return;
            }
            imu::run(&mut mpu, &feed, &mut FreeRtos)
        })?;

    // ── 8. Reporter (main thread) ─────────────────────────────
    info!("Pulseband: running");
    let mut reporter =
        VitalsReporter::new(sink, config.report.clone(), vitals).with_motion(motion);
    reporter.run(&mut FreeRtos)
}
