//! Concurrent event bus: two bounded channels, two dispatch workers.
//!
//! ```text
//!  publish()          ┌──────────────────┐   ┌───────────────────────┐
//!  ──────────────────▶│ general Channel  │──▶│ "bus-events" (pri 2)  │──▶ callbacks
//!                     └──────────────────┘   └───────────────────────┘
//!  publish_from_isr() ┌──────────────────┐   ┌───────────────────────┐
//!  ──────────────────▶│ intr Channel     │──▶│ "bus-intr"   (pri 4)  │──▶ callbacks
//!                     └──────────────────┘   └───────────────────────┘
//! ```
//!
//! Both queues are `embassy-sync` channels behind a `CriticalSectionRawMutex`,
//! so enqueueing never blocks and never allocates.  A full queue drops the
//! event and bumps the channel's `dropped` counter.
//!
//! The general worker awaits its channel under `block_on`.  The interrupt
//! worker never registers a waker: it drains its channel with
//! `try_receive` and sleeps on a [`Doorbell`] that an ISR can ring without
//! taking any lock (a FreeRTOS task notification on ESP-IDF, the thread's
//! park token elsewhere).
//!
//! Subscriber lists live in a table indexed by [`EventId`].  Each slot is an
//! `Arc<[_]>` rebuilt on registration; a worker clones the slot's handle under
//! the lock and runs the callbacks after releasing it.  Registrations are
//! expected to finish before interrupt sources are enabled.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, info, warn};

use crate::config::BusConfig;
use crate::drivers::task_pin::TaskBuilder;
use crate::error::BusError;
use crate::events::{EVENT_ID_COUNT, Event, EventId, EventRef, IntrEvent, Payload};

/// Depth of the general payload queue.
pub const GENERAL_QUEUE_DEPTH: usize = 8;

/// Depth of the interrupt integer queue.
pub const INTR_QUEUE_DEPTH: usize = 8;

/// General-channel subscriber.
pub type Callback = Arc<dyn Fn(EventRef<'_>) + Send + Sync>;

/// Interrupt-channel subscriber.
pub type IntrCallback = Arc<dyn Fn(i32) + Send + Sync>;

// ── Counters ─────────────────────────────────────────────────

#[derive(Default)]
struct ChannelCounters {
    published: AtomicU32,
    dropped: AtomicU32,
    delivered: AtomicU32,
}

impl ChannelCounters {
    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

/// Per-channel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Events accepted into the queue.
    pub published: u32,
    /// Events rejected because the queue was full.
    pub dropped: u32,
    /// Events taken off the queue by the worker.
    pub delivered: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub general: ChannelStats,
    pub intr: ChannelStats,
}

// ── Lifecycle ────────────────────────────────────────────────

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

// ── Shared core ──────────────────────────────────────────────

struct Subscribers {
    general: [Option<Arc<[Callback]>>; EVENT_ID_COUNT],
    intr: [Option<Arc<[IntrCallback]>>; EVENT_ID_COUNT],
}

struct Shared {
    general: Channel<CriticalSectionRawMutex, Event, GENERAL_QUEUE_DEPTH>,
    intr: Channel<CriticalSectionRawMutex, IntrEvent, INTR_QUEUE_DEPTH>,
    subscribers: Mutex<Subscribers>,
    general_shutdown: Signal<CriticalSectionRawMutex, ()>,
    intr_shutdown: AtomicBool,
    intr_bell: Doorbell,
    general_counters: ChannelCounters,
    intr_counters: ChannelCounters,
    state: AtomicU8,
}

impl Shared {
    fn new() -> Self {
        Self {
            general: Channel::new(),
            intr: Channel::new(),
            subscribers: Mutex::new(Subscribers {
                general: core::array::from_fn(|_| None),
                intr: core::array::from_fn(|_| None),
            }),
            general_shutdown: Signal::new(),
            intr_shutdown: AtomicBool::new(false),
            intr_bell: Doorbell::default(),
            general_counters: ChannelCounters::default(),
            intr_counters: ChannelCounters::default(),
            state: AtomicU8::new(STATE_IDLE),
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        // A panicking subscriber cannot corrupt the table: it only ever runs
        // after the guard has been dropped.
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch_general(&self, event: &Event) {
        self.general_counters.delivered.fetch_add(1, Ordering::Relaxed);
        let list = self.subscribers().general[event.id.index()].clone();
        let Some(list) = list else {
            debug!("bus: no subscriber for {:?}, discarded", event.id);
            return;
        };
        let view = EventRef::from_event(event);
        for cb in list.iter() {
            cb(view);
        }
    }

    /// Ask both workers to exit.
    fn signal_shutdown(&self) {
        self.general_shutdown.signal(());
        self.intr_shutdown.store(true, Ordering::Release);
        self.intr_bell.ring();
    }

    fn dispatch_intr(&self, event: IntrEvent) {
        self.intr_counters.delivered.fetch_add(1, Ordering::Relaxed);
        let list = self.subscribers().intr[event.id.index()].clone();
        if let Some(list) = list {
            for cb in list.iter() {
                cb(event.value);
            }
        }
    }
}

// ── Interrupt doorbell ───────────────────────────────────────

#[cfg(target_os = "espidf")]
mod doorbell {
    use core::num::NonZeroU32;
    use std::sync::{Arc, OnceLock};

    use esp_idf_hal::delay::BLOCK;
    use esp_idf_hal::task::notification::{Notification, Notifier};

    /// Wake-up for the interrupt worker, safe to ring from an ISR.
    #[derive(Default)]
    pub(super) struct Doorbell {
        notifier: OnceLock<Arc<Notifier>>,
    }

    impl Doorbell {
        pub(super) fn ring(&self) {
            if let Some(notifier) = self.notifier.get() {
                // SAFETY: posting a task notification is ISR-safe and
                // allocation-free; once the listening task drops its
                // `Notification` the notifier becomes a no-op.
                unsafe {
                    notifier.notify_and_yield(NonZeroU32::MIN);
                }
            }
        }

        /// Make the calling task the one woken by [`ring`](Self::ring).
        pub(super) fn listen(&self) -> Listener {
            let notification = Notification::new();
            let _ = self.notifier.set(notification.notifier());
            Listener { notification }
        }
    }

    pub(super) struct Listener {
        notification: Notification,
    }

    impl Listener {
        /// Sleep until rung.  A ring that arrived earlier is latched.
        pub(super) fn wait(&self) {
            let _ = self.notification.wait(BLOCK);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod doorbell {
    use std::sync::OnceLock;
    use std::thread::{self, Thread};

    /// Wake-up for the interrupt worker.  `Thread::unpark` only sets the
    /// thread's park token; it takes no lock the sleeper could hold.
    #[derive(Default)]
    pub(super) struct Doorbell {
        listener: OnceLock<Thread>,
    }

    impl Doorbell {
        pub(super) fn ring(&self) {
            if let Some(thread) = self.listener.get() {
                thread.unpark();
            }
        }

        /// Make the calling thread the one woken by [`ring`](Self::ring).
        pub(super) fn listen(&self) -> Listener {
            let _ = self.listener.set(thread::current());
            Listener
        }
    }

    pub(super) struct Listener;

    impl Listener {
        /// Sleep until rung.  A ring that arrived earlier is latched.
        pub(super) fn wait(&self) {
            thread::park();
        }
    }
}

use doorbell::Doorbell;

/// Append `cb` to an `Arc<[_]>` slot, preserving registration order.
fn append<C: Clone>(slot: &mut Option<Arc<[C]>>, cb: C) {
    let mut list: Vec<C> = slot.as_deref().map(<[C]>::to_vec).unwrap_or_default();
    list.push(cb);
    *slot = Some(list.into());
}

// ── Worker loops ─────────────────────────────────────────────

fn run_general_worker(shared: Arc<Shared>) {
    loop {
        let next = future::block_on(future::or(
            async {
                shared.general_shutdown.wait().await;
                None
            },
            async { Some(shared.general.receive().await) },
        ));
        match next {
            Some(event) => shared.dispatch_general(&event),
            None => break,
        }
    }
    info!("bus: general worker exited");
}

fn run_intr_worker(shared: Arc<Shared>) {
    let listener = shared.intr_bell.listen();
    loop {
        // Events queued before `listen()` are picked up here too.
        while let Ok(event) = shared.intr.try_receive() {
            shared.dispatch_intr(event);
        }
        if shared.intr_shutdown.load(Ordering::Acquire) {
            break;
        }
        listener.wait();
    }
    info!("bus: interrupt worker exited");
}

// ── Public handle ────────────────────────────────────────────

/// Publish/subscribe core.  Cheap to share by reference; the process-wide
/// instance is [`EventBus::global`].
pub struct EventBus {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Build an independent bus.  Workers are not running until [`start`](Self::start).
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// The single process-wide bus, constructed on first use.
    pub fn global() -> &'static EventBus {
        static GLOBAL: OnceLock<EventBus> = OnceLock::new();
        GLOBAL.get_or_init(EventBus::new)
    }

    // ── Registration ──────────────────────────────────────────

    /// Register a general-channel callback for `id`.
    ///
    /// Callbacks run on the general worker, one after another; a slow
    /// callback delays every later event on this channel.
    pub fn subscribe(&self, id: EventId, cb: impl Fn(EventRef<'_>) + Send + Sync + 'static) {
        let cb: Callback = Arc::new(cb);
        append(&mut self.shared.subscribers().general[id.index()], cb);
    }

    /// Register an interrupt-channel callback for `id`.  Call during setup,
    /// before the corresponding interrupt source is enabled.
    pub fn subscribe_intr(&self, id: EventId, cb: impl Fn(i32) + Send + Sync + 'static) {
        let cb: IntrCallback = Arc::new(cb);
        append(&mut self.shared.subscribers().intr[id.index()], cb);
    }

    // ── Publishing ────────────────────────────────────────────

    /// Enqueue a general event.  Never blocks; drops the event if the
    /// queue is full.
    pub fn publish(&self, id: EventId, payload: Option<Payload>) {
        let counters = &self.shared.general_counters;
        if self.shared.general.try_send(Event::new(id, payload)).is_ok() {
            counters.published.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Enqueue an interrupt-channel event and ring the interrupt worker.
    /// No allocation and no blocking; the only lock is the queue's critical
    /// section, and no waker is ever registered on this queue.
    pub fn publish_from_isr(&self, id: EventId, value: i32) {
        let counters = &self.shared.intr_counters;
        if self.shared.intr.try_send(IntrEvent { id, value }).is_ok() {
            counters.published.fetch_add(1, Ordering::Relaxed);
            self.shared.intr_bell.ring();
        } else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Spawn both dispatch workers.  A second call on a running bus is a
    /// no-op; a stopped bus cannot be restarted.  If either worker fails to
    /// spawn, any worker already running is shut down and the bus ends up
    /// stopped.
    pub fn start(&self, cfg: &BusConfig) -> Result<(), BusError> {
        match self.shared.state.compare_exchange(
            STATE_IDLE,
            STATE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(STATE_RUNNING) => return Ok(()),
            Err(_) => return Err(BusError::Stopped),
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);

        let shared = Arc::clone(&self.shared);
        match TaskBuilder::new("bus-events")
            .priority(cfg.general_priority)
            .stack_kb(cfg.general_stack_kb)
            .spawn(move || run_general_worker(shared))
        {
            Ok(handle) => workers.push(handle),
            Err(e) => return Err(self.abort_start(&mut workers, "bus-events", &e)),
        }

        let shared = Arc::clone(&self.shared);
        match TaskBuilder::new("bus-intr")
            .priority(cfg.intr_priority)
            .stack_kb(cfg.intr_stack_kb)
            .spawn(move || run_intr_worker(shared))
        {
            Ok(handle) => workers.push(handle),
            Err(e) => return Err(self.abort_start(&mut workers, "bus-intr", &e)),
        }

        info!(
            "bus: started (general pri={}, intr pri={})",
            cfg.general_priority, cfg.intr_priority
        );
        Ok(())
    }

    /// Roll back a partial start: stop the workers spawned so far and mark
    /// the bus stopped.
    fn abort_start(
        &self,
        workers: &mut Vec<JoinHandle<()>>,
        name: &str,
        err: &io::Error,
    ) -> BusError {
        warn!("bus: spawning {} failed: {}", name, err);
        self.shared.state.store(STATE_STOPPED, Ordering::Release);
        self.shared.signal_shutdown();
        join_all(workers.drain(..));
        BusError::SpawnFailed
    }

    /// Stop both workers.  General events still queued are abandoned;
    /// interrupt events already queued are delivered first.
    pub fn stop(&self) {
        let prev = self.shared.state.swap(STATE_STOPPED, Ordering::AcqRel);
        if prev != STATE_RUNNING {
            return;
        }
        self.shared.signal_shutdown();

        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        join_all(handles);
        info!("bus: stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == STATE_RUNNING
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            general: self.shared.general_counters.snapshot(),
            intr: self.shared.intr_counters.snapshot(),
        }
    }
}

fn join_all(handles: impl IntoIterator<Item = JoinHandle<()>>) {
    let me = std::thread::current().id();
    for handle in handles {
        // A callback that stops the bus cannot join its own worker.
        if handle.thread().id() == me {
            continue;
        }
        if handle.join().is_err() {
            warn!("bus: worker panicked before shutdown");
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.stop();
    }
}
