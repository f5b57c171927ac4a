//! Event clock
//!
//! Fixed-rate scheduler that owns all rate-limited outbound I/O. Input handlers
//! only submit into the pending-write buffer; each tick then
//!
//! 1. executes every queued discrete call in FIFO order,
//! 2. polls local mixer mute state,
//! 3. flushes the latest volume per target.
//!
//! A failing call is logged and the tick moves on.

mod buffer;
mod dispatch;

pub use buffer::{Call, PendingWrites, VolumeTarget};
pub use dispatch::{DispatchError, Dispatcher};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

pub struct EventClock {
    pending: Arc<PendingWrites>,
    dispatcher: Arc<Dispatcher>,
    period: Duration,
    stopped: Arc<AtomicBool>,
    stop: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventClock {
    pub fn new(dispatcher: Dispatcher, period: Duration) -> Self {
        Self {
            pending: Arc::new(PendingWrites::new()),
            stopped: dispatcher.stop_flag(),
            dispatcher: Arc::new(dispatcher),
            period,
            stop: Arc::new(Notify::new()),
            task: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Queue a discrete call for the next tick
    pub fn submit(&self, call: Call) {
        if self.is_disposed() {
            trace!("Clock disposed, dropping {}", call);
            return;
        }
        self.pending.push_call(call);
    }

    /// Record a volume for the next flush; replaces an unflushed value
    pub fn set_volume(&self, target: VolumeTarget, value: f32) {
        if self.is_disposed() {
            return;
        }
        self.pending.set_volume(target, value);
    }

    /// Spawn the ticking task. Does nothing if already started or disposed.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() || self.is_disposed() {
            return;
        }

        let pending = Arc::clone(&self.pending);
        let dispatcher = Arc::clone(&self.dispatcher);
        let stopped = Arc::clone(&self.stopped);
        let stop = Arc::clone(&self.stop);
        let period = self.period;

        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {},
                    _ = stop.notified() => break,
                }
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                run_tick(&pending, &dispatcher, &stopped).await;
            }
            debug!("Event clock stopped");
        }));
        debug!("Event clock started ({:?} period)", period);
    }

    /// Run one drain-refresh-flush cycle now
    pub async fn tick_once(&self) {
        run_tick(&self.pending, &self.dispatcher, &self.stopped).await;
    }

    /// Stop ticking. Idempotent and non-blocking.
    ///
    /// No call starts after this returns; a call already in flight completes.
    pub fn dispose(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop.notify_one();
        self.pending.clear();
        debug!("Event clock disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Drop for EventClock {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn run_tick(pending: &PendingWrites, dispatcher: &Dispatcher, stopped: &AtomicBool) {
    let is_stopped = || stopped.load(Ordering::SeqCst);

    for call in pending.take_calls() {
        if is_stopped() {
            return;
        }
        if let Err(e) = dispatcher.execute(&call).await {
            if !is_stopped() {
                warn!("Failed to {}: {:#}", call, e);
            }
        }
    }

    if is_stopped() {
        return;
    }
    if let Err(e) = dispatcher.refresh_local().await {
        if !is_stopped() {
            warn!("{:#}", e);
        }
    }

    for (target, value) in pending.take_volumes() {
        if is_stopped() {
            return;
        }
        if let Err(e) = dispatcher.set_volume(&target, value).await {
            if !is_stopped() {
                warn!("Failed to set volume of {}: {:#}", target, e);
            }
        }
    }
}
