//! In-process broadcast.
//!
//! A hub owns one bounded channel per endpoint; `send` fans the message
//! out to every other endpoint. Delivery is lossy under backpressure,
//! matching the best-effort contract of the port, and an optional random
//! latency makes multi-node tests exercise out-of-order arrival.

use crate::domain::message::Message;
use crate::errors::EngineError;
use crate::ports::broadcast::Broadcast;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::trace;

/// Shared fan-out point for a set of [`MemoryBroadcast`] endpoints.
pub struct MemoryHub {
    capacity: usize,
    max_latency: Option<Duration>,
    peers: Mutex<Vec<mpsc::Sender<Message>>>,
}

impl MemoryHub {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            max_latency: None,
            peers: Mutex::new(Vec::new()),
        })
    }

    /// A hub that delays each delivery by a random duration up to
    /// `max_latency`.
    pub fn with_latency(capacity: usize, max_latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            max_latency: Some(max_latency),
            peers: Mutex::new(Vec::new()),
        })
    }

    /// Register a new endpoint on the hub.
    pub fn endpoint(self: &Arc<Self>) -> MemoryBroadcast {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut peers = self.peers.lock();
        let me = peers.len();
        peers.push(tx);
        MemoryBroadcast {
            hub: Arc::clone(self),
            me,
            rx: tokio::sync::Mutex::new(rx),
            closed: AtomicBool::new(false),
            closing: Notify::new(),
        }
    }
}

/// One endpoint: receives everything other endpoints send.
pub struct MemoryBroadcast {
    hub: Arc<MemoryHub>,
    me: usize,
    rx: tokio::sync::Mutex<mpsc::Receiver<Message>>,
    closed: AtomicBool,
    closing: Notify,
}

impl MemoryBroadcast {
    fn deliver(&self, tx: mpsc::Sender<Message>, msg: Message) {
        match self.hub.max_latency {
            Some(max) => {
                let delay = rand::thread_rng().gen_range(0..max.as_millis().max(1) as u64);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    let _ = tx.send(msg).await;
                });
            }
            None => {
                if tx.try_send(msg).is_err() {
                    trace!("[rc-05] dropped message to a slow or closed peer");
                }
            }
        }
    }
}

#[async_trait]
impl Broadcast for MemoryBroadcast {
    /// Receives the next message; after [`close`](Broadcast::close) the
    /// buffered backlog drains, then the stream ends. `close` never
    /// touches the receiver, so it cannot block on a parked `recv`.
    async fn recv(&self) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        let closing = self.closing.notified();
        tokio::pin!(closing);
        // register before the flag check so a concurrent close is not missed
        closing.as_mut().enable();
        if self.closed.load(Ordering::SeqCst) {
            rx.close();
            return rx.recv().await;
        }
        tokio::select! {
            msg = rx.recv() => msg,
            _ = closing => {
                rx.close();
                rx.recv().await
            }
        }
    }

    async fn send(&self, msg: Message) -> Result<(), EngineError> {
        let peers: Vec<_> = {
            let peers = self.hub.peers.lock();
            peers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != self.me)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in peers {
            self.deliver(tx, msg.clone());
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closing.notify_waiters();
    }
}
