//! Shared run state between a poll loop and its shutdown coordinator
//!
//! ## State Machine
//!
//! ```text
//! Idle -> Polling -> Idle -> ... -> Stopping -> Stopped
//! ```
//!
//! Entering `Polling` and requesting a stop are serialized through the
//! phase channel: a cycle either starts before the stop (and the
//! coordinator waits it out) or observes the stop and never starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;

/// Phase of a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerPhase {
    /// Sleeping between cycles
    Idle,
    /// Reading and emitting records
    Polling,
    /// Stop requested; no new cycle will start
    Stopping,
    /// The loop has exited
    Stopped,
}

/// Stop, phase, and exit signals for one tailer
#[derive(Debug)]
pub struct TailerLifecycle {
    stop: watch::Sender<bool>,
    phase: watch::Sender<TailerPhase>,
    can_exit: watch::Sender<bool>,
    in_teardown: AtomicBool,
}

impl Default for TailerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl TailerLifecycle {
    pub fn new() -> Self {
        Self {
            stop: watch::Sender::new(false),
            phase: watch::Sender::new(TailerPhase::Idle),
            can_exit: watch::Sender::new(false),
            in_teardown: AtomicBool::new(false),
        }
    }

    /// Current phase
    pub fn phase(&self) -> TailerPhase {
        *self.phase.borrow()
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    pub fn can_exit(&self) -> bool {
        *self.can_exit.borrow()
    }

    /// Enter `Polling` unless a stop was requested
    pub fn begin_cycle(&self) -> bool {
        let stop = &self.stop;
        self.phase.send_if_modified(|phase| {
            if *stop.borrow() || *phase != TailerPhase::Idle {
                return false;
            }
            *phase = TailerPhase::Polling;
            true
        })
    }

    /// Leave `Polling`
    pub fn end_cycle(&self) {
        let stop = &self.stop;
        self.phase.send_modify(|phase| {
            *phase = if *stop.borrow() {
                TailerPhase::Stopping
            } else {
                TailerPhase::Idle
            };
        });
    }

    /// Mark the loop as exited
    pub fn mark_stopped(&self) {
        self.phase.send_replace(TailerPhase::Stopped);
    }

    /// Claim the teardown; false if another caller already did
    pub fn begin_teardown(&self) -> bool {
        !self.in_teardown.swap(true, Ordering::SeqCst)
    }

    /// Ask the loop to stop at its next check
    pub fn request_stop(&self) {
        self.stop.send_replace(true);
        self.phase.send_if_modified(|phase| {
            if *phase == TailerPhase::Idle {
                *phase = TailerPhase::Stopping;
                true
            } else {
                false
            }
        });
    }

    /// Wait until no cycle is in flight
    pub async fn wait_not_polling(&self) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase != TailerPhase::Polling).await;
    }

    /// Release everyone blocked in [`wait_exit`](Self::wait_exit)
    pub fn allow_exit(&self) {
        self.can_exit.send_replace(true);
    }

    /// Wait for teardown to finish its final flush
    pub async fn wait_exit(&self) {
        let mut rx = self.can_exit.subscribe();
        let _ = rx.wait_for(|ok| *ok).await;
    }

    /// Wait until a stop is requested
    pub async fn stopped(&self) {
        let mut rx = self.stop.subscribe();
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Sleep for `duration`, waking early on a stop request
    ///
    /// Returns true if a stop was requested.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stopped() => {}
        }
        self.stop_requested()
    }
}
