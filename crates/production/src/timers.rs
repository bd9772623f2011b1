//! Timer management for the production runner.
//!
//! Provides a tokio-based timer implementation for the deterministic state
//! machine. Timers are spawned as tokio tasks and can be cancelled.

use racecontrol_core::{Event, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Convert a TimerId to the corresponding Event.
fn timer_event(id: TimerId) -> Event {
    match id {
        TimerId::BroadcastFlush => Event::BroadcastFlushTimer,
    }
}

/// Manages timers for the production runner.
///
/// Each timer is a tokio task that sleeps for the specified duration and then
/// sends the appropriate timer event to the event channel.
pub struct TimerManager {
    /// Active timers (id -> task handle).
    timers: HashMap<TimerId, JoinHandle<()>>,
    /// Event sender for timer fires.
    event_tx: mpsc::Sender<Event>,
}

impl TimerManager {
    /// Create a new timer manager.
    pub fn new(event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            timers: HashMap::new(),
            event_tx,
        }
    }

    /// Set a timer that will fire after the given duration.
    ///
    /// If a timer with the same ID already exists, it is cancelled first.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        // Cancel existing timer with same ID
        self.cancel_timer(id);

        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            trace!(?id, ?duration, "Timer task started, sleeping");
            tokio::time::sleep(duration).await;
            trace!(?id, "Timer fired, sending event");
            let _ = event_tx.send(timer_event(id)).await;
        });

        self.timers.insert(id, handle);
        debug!(?id, ?duration, "Timer set");
    }

    /// Cancel a timer.
    ///
    /// If the timer doesn't exist or has already fired, this is a no-op.
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            debug!(?id, "Timer cancelled");
        }
    }

    /// Cancel all timers.
    ///
    /// Called during shutdown.
    pub fn cancel_all(&mut self) {
        for (id, handle) in self.timers.drain() {
            handle.abort();
            trace!(?id, "Timer cancelled (shutdown)");
        }
    }

    /// Get the number of active timers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
