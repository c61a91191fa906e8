//! Clock implementations.
//!
//! `RoundClock` derives rounds from the wall clock: round `r` spans
//! `[r * duration, (r + 1) * duration)` milliseconds since the Unix
//! epoch, so independently started peers agree on the numbering without
//! coordination. Emitted timestamps are microseconds since the epoch,
//! matching the block field. `ScriptedClock` is the test double: rounds
//! tick when the test says so.

use crate::ports::clock::Clock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Notify};

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Wall-clock rounds of fixed duration.
pub struct RoundClock {
    duration_ms: u64,
    current: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl RoundClock {
    pub fn new(round_duration: Duration) -> Self {
        let duration_ms = round_duration.as_millis().max(1) as u64;
        Self {
            duration_ms,
            current: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }
}

#[async_trait]
impl Clock for RoundClock {
    fn round(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Option<(u64, u64)> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let now = unix_millis();
        let boundary = (now / self.duration_ms + 1) * self.duration_ms;
        let closing = self.notify.notified();
        tokio::pin!(closing);
        closing.as_mut().enable();
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(boundary - now)) => {
                if self.closed.load(Ordering::SeqCst) {
                    return None;
                }
                let round = boundary / self.duration_ms;
                self.current.store(round, Ordering::SeqCst);
                Some((round, boundary * 1000))
            }
            _ = closing => None,
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

/// Test clock fed by an explicit tick channel.
pub struct ScriptedClock {
    ticks: tokio::sync::Mutex<mpsc::UnboundedReceiver<(u64, u64)>>,
    current: AtomicU64,
    closed: AtomicBool,
    closing: Notify,
}

impl ScriptedClock {
    /// Returns the clock and the sender tests tick through. Dropping the
    /// sender ends the clock.
    pub fn new() -> (Self, mpsc::UnboundedSender<(u64, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                ticks: tokio::sync::Mutex::new(rx),
                current: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                closing: Notify::new(),
            },
            tx,
        )
    }
}

#[async_trait]
impl Clock for ScriptedClock {
    fn round(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// `close` must not touch the receiver: a parked `next` holds its
    /// mutex, so it signals through a notification instead.
    async fn next(&self) -> Option<(u64, u64)> {
        let mut ticks = self.ticks.lock().await;
        let closing = self.closing.notified();
        tokio::pin!(closing);
        closing.as_mut().enable();
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let tick = tokio::select! {
            tick = ticks.recv() => tick,
            _ = closing => None,
        };
        if let Some((round, _)) = tick {
            self.current.store(round, Ordering::SeqCst);
        }
        tick
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closing.notify_waiters();
    }
}
