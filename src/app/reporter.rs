//! Edge-triggered vitals/motion reporting towards the broker.
//!
//! The reporter polls the published values every
//! [`ReportConfig::poll_interval_ms`].  A report goes out only when the
//! broker session is up *and* a new value has been published since the
//! last report.  While the link is down the freshness flags are left
//! untouched, so the first poll after reconnecting reports the latest
//! value.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};
use serde::Serialize;

use crate::app::ports::{ReportError, ReportPort};
use crate::config::ReportConfig;
use crate::imu::{MotionFeed, MotionSample};
use crate::ppg::vitals::Vitals;

/// `{"spo2": .., "bpm": ..}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VitalsReport {
    pub spo2: f32,
    pub bpm: u32,
}

/// Raw accelerometer/gyroscope counts, one key per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotionReport {
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    pub gyro_x: i16,
    pub gyro_y: i16,
    pub gyro_z: i16,
}

impl From<MotionSample> for MotionReport {
    fn from(s: MotionSample) -> Self {
        Self {
            accel_x: s.accel[0],
            accel_y: s.accel[1],
            accel_z: s.accel[2],
            gyro_x: s.gyro[0],
            gyro_y: s.gyro[1],
            gyro_z: s.gyro[2],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub sent: u32,
    pub failed: u32,
}

pub struct VitalsReporter<R> {
    port: R,
    config: ReportConfig,
    vitals: Arc<Vitals>,
    motion: Option<Arc<MotionFeed>>,
    stats: ReporterStats,
}

impl<R: ReportPort> VitalsReporter<R> {
    pub fn new(port: R, config: ReportConfig, vitals: Arc<Vitals>) -> Self {
        Self {
            port,
            config,
            vitals,
            motion: None,
            stats: ReporterStats::default(),
        }
    }

    /// Also report motion samples from `feed`.
    #[must_use]
    pub fn with_motion(mut self, feed: Arc<MotionFeed>) -> Self {
        self.motion = Some(feed);
        self
    }

    /// Send whatever is new.  Returns the number of reports sent.
    pub fn poll(&mut self) -> usize {
        if !self.port.is_connected() {
            return 0;
        }
        let mut sent = 0;

        if self.vitals.take_new_value() {
            let v = self.vitals.snapshot();
            let report = VitalsReport {
                spo2: v.spo2,
                bpm: v.heart_rate,
            };
            let topic = self.config.vitals_topic.clone();
            sent += usize::from(self.send(&topic, &report));
        }

        if let Some(feed) = &self.motion
            && feed.take_new_value()
        {
            let report = MotionReport::from(feed.latest());
            let topic = self.config.motion_topic.clone();
            sent += usize::from(self.send(&topic, &report));
        }

        sent
    }

    fn send(&mut self, topic: &str, report: &impl Serialize) -> bool {
        let result = serde_json::to_vec(report)
            .map_err(|_| ReportError::Encode)
            .and_then(|body| self.port.publish(topic, &body));
        match result {
            Ok(()) => {
                self.stats.sent = self.stats.sent.wrapping_add(1);
                debug!("report: sent on '{}'", topic);
                true
            }
            Err(e) => {
                self.stats.failed = self.stats.failed.wrapping_add(1);
                warn!("report: '{}' failed: {}", topic, e);
                false
            }
        }
    }

    /// Reporter loop.
    pub fn run(&mut self, delay: &mut impl DelayNs) -> ! {
        loop {
            self.poll();
            delay.delay_ms(self.config.poll_interval_ms);
        }
    }

    pub fn stats(&self) -> ReporterStats {
        self.stats
    }

    pub fn port(&self) -> &R {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut R {
        &mut self.port
    }
}
