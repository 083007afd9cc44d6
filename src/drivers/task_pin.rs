//! Worker thread placement.
//!
//! Every long-lived worker (bus dispatchers, PPG acquisition, IMU poll,
//! GPIO loops) is described by a [`TaskBuilder`] and started with
//! [`TaskBuilder::spawn`].  On ESP-IDF the settings are handed to
//! `esp_pthread_set_cfg()`, which configures the FreeRTOS task behind the
//! *next* `pthread_create()` issued by the calling thread; the spawn
//! follows immediately, so the pair is never split.  Elsewhere the core
//! and priority are ignored.

use std::io;
use std::thread::JoinHandle;

/// ESP32 CPU cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// PRO_CPU: Wi-Fi and lwIP live here.
    Pro = 0,
    /// APP_CPU: sensor workers and event dispatch.
    App = 1,
}

/// Name, placement, priority and stack of one worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskBuilder {
    pub name: &'static str,
    pub core: Core,
    /// FreeRTOS priority.
    pub priority: u8,
    pub stack_kb: usize,
}

impl TaskBuilder {
    /// Application-core task with priority 1 and a 4 KB stack.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            core: Core::App,
            priority: 1,
            stack_kb: 4,
        }
    }

    pub const fn on(mut self, core: Core) -> Self {
        self.core = core;
        self
    }

    pub const fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub const fn stack_kb(mut self, stack_kb: usize) -> Self {
        self.stack_kb = stack_kb;
        self
    }

    /// Start `f` on a new thread placed as configured.
    #[cfg(target_os = "espidf")]
    pub fn spawn(self, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
        let c_name = std::ffi::CString::new(self.name)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "task name contains NUL"))?;

        // SAFETY: the config is thread-local to the caller and consumed by
        // the spawn below; `c_name` outlives that call.
        unsafe {
            let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
            cfg.pin_to_core = self.core as i32;
            cfg.prio = i32::from(self.priority);
            cfg.stack_size = (self.stack_kb * 1024) as i32;
            cfg.thread_name = c_name.as_ptr();
            let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
            if ret != esp_idf_sys::ESP_OK as i32 {
                return Err(io::Error::other(format!(
                    "esp_pthread_set_cfg({}) failed: {ret}",
                    self.name
                )));
            }
        }

        log::info!(
            "task '{}': {:?} core, pri={}, stack={}KB",
            self.name,
            self.core,
            self.priority,
            self.stack_kb
        );
        std::thread::Builder::new().name(self.name.into()).spawn(f)
    }

    /// Start `f` on a plain thread; core and priority are ignored.
    #[cfg(not(target_os = "espidf"))]
    pub fn spawn(self, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
        log::debug!("task '{}': host thread", self.name);
        // Host stacks carry std's formatting machinery.
        std::thread::Builder::new()
            .name(self.name.into())
            .stack_size((self.stack_kb * 1024).max(64 * 1024))
            .spawn(f)
    }
}
