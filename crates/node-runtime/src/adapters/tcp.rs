//! TCP gossip transport.
//!
//! Every connection is symmetric: both ends read and write framed
//! messages. The node listens on its bind address (refusing connections
//! beyond `max_incoming_conn`) and keeps a dial loop per configured
//! peer, reconnecting with a fixed delay when a link drops.
//!
//! Frames are a 4-byte big-endian length followed by a bincode-encoded
//! [`Message`]. Oversized frames kill the connection. Sends are
//! best-effort: a slow peer's frames are dropped rather than letting
//! its backlog stall the node.

use async_trait::async_trait;
use parking_lot::Mutex;
use rc_05_engine::{Broadcast, EngineError, Message};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Frames above this size indicate a corrupt or hostile peer.
const MAX_FRAME_LEN: u32 = 8 * 1024 * 1024;
/// Outgoing frames buffered per connection before drops begin.
const WRITER_BACKLOG: usize = 256;
/// Pause between reconnection attempts to a configured peer.
const REDIAL_DELAY: Duration = Duration::from_secs(1);
/// Budget for the eager dial during startup.
const FIRST_DIAL_TIMEOUT: Duration = Duration::from_millis(500);

struct Shared {
    inbound: mpsc::Sender<Message>,
    writers: Mutex<Vec<mpsc::Sender<Arc<Vec<u8>>>>>,
}

impl Shared {
    /// Register a connection: a writer task draining its frame queue and
    /// a reader task feeding the inbound channel. Returns the reader's
    /// handle so dial loops can watch for disconnects.
    fn attach(
        self: &Arc<Self>,
        stream: TcpStream,
        peer: String,
        permit: Option<OwnedSemaphorePermit>,
    ) -> tokio::task::JoinHandle<()> {
        let (read_half, write_half) = stream.into_split();
        let (frames_tx, frames_rx) = mpsc::channel(WRITER_BACKLOG);
        self.writers.lock().push(frames_tx);

        tokio::spawn(write_loop(write_half, frames_rx, peer.clone()));
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = read_loop(read_half, &shared.inbound).await {
                debug!("[node] connection with {peer} ended: {err}");
            }
            drop(permit);
        })
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::Receiver<Arc<Vec<u8>>>,
    peer: String,
) {
    while let Some(frame) = frames.recv().await {
        let len = (frame.len() as u32).to_be_bytes();
        if writer.write_all(&len).await.is_err() || writer.write_all(&frame).await.is_err() {
            debug!("[node] write to {peer} failed, dropping link");
            return;
        }
    }
}

/// One bounded connection attempt. Refusals and timeouts surface as
/// [`EngineError::PeerRefused`]; callers decide whether to keep trying.
async fn dial(peer: &str) -> Result<TcpStream, EngineError> {
    match tokio::time::timeout(FIRST_DIAL_TIMEOUT, TcpStream::connect(peer)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(_)) | Err(_) => Err(EngineError::PeerRefused),
    }
}

/// Reconnect to `peer` whenever the link drops.
async fn dial_loop(shared: Arc<Shared>, peer: String) {
    loop {
        match TcpStream::connect(&peer).await {
            Ok(stream) => {
                info!("[node] connected to {peer}");
                let reader = shared.attach(stream, peer.clone(), None);
                let _ = reader.await;
            }
            Err(err) => debug!("[node] dial {peer} failed: {err}"),
        }
        tokio::time::sleep(REDIAL_DELAY).await;
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    inbound: &mpsc::Sender<Message>,
) -> std::io::Result<()> {
    loop {
        let mut len = [0u8; 4];
        reader.read_exact(&mut len).await?;
        let len = u32::from_be_bytes(len);
        if len > MAX_FRAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "frame too large",
            ));
        }
        let mut frame = vec![0u8; len as usize];
        reader.read_exact(&mut frame).await?;
        match bincode::deserialize::<Message>(&frame) {
            Ok(msg) => {
                if inbound.send(msg).await.is_err() {
                    // endpoint closed, stop reading
                    return Ok(());
                }
            }
            Err(err) => warn!("[node] discarding undecodable frame: {err}"),
        }
    }
}

/// The network endpoint handed to the engine.
pub struct TcpBroadcast {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    rx: tokio::sync::Mutex<mpsc::Receiver<Message>>,
    closed: AtomicBool,
    closing: Notify,
}

impl TcpBroadcast {
    /// Bind the listener, start the per-peer dial loops, and return the
    /// endpoint.
    pub async fn start(
        bind: &str,
        peers: &[String],
        max_incoming_conn: usize,
        max_message_buf: usize,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(bind).await?;
        let local_addr = listener.local_addr()?;
        info!("[node] listening on {local_addr}");

        let (inbound_tx, inbound_rx) = mpsc::channel(max_message_buf.max(1));
        let shared = Arc::new(Shared {
            inbound: inbound_tx,
            writers: Mutex::new(Vec::new()),
        });

        let accept_shared = Arc::clone(&shared);
        let slots = Arc::new(Semaphore::new(max_incoming_conn.max(1)));
        tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!("[node] accept failed: {err}");
                        continue;
                    }
                };
                match Arc::clone(&slots).try_acquire_owned() {
                    Ok(permit) => {
                        debug!("[node] accepted {addr}");
                        accept_shared.attach(stream, addr.to_string(), Some(permit));
                    }
                    Err(_) => {
                        debug!("[node] refusing {addr}, connection limit reached");
                        drop(stream);
                    }
                }
            }
        });

        for peer in peers {
            let peer = peer.clone();
            let dial_shared = Arc::clone(&shared);
            // eager first attempt, so peers already listening are linked
            // before the engine starts minting
            match dial(&peer).await {
                Ok(stream) => {
                    info!("[node] connected to {peer}");
                    let reader = dial_shared.attach(stream, peer.clone(), None);
                    tokio::spawn(async move {
                        let _ = reader.await;
                        tokio::time::sleep(REDIAL_DELAY).await;
                        dial_loop(dial_shared, peer).await;
                    });
                }
                Err(err) => {
                    debug!("[node] dial {peer} failed ({err}), retrying in background");
                    tokio::spawn(dial_loop(dial_shared, peer));
                }
            }
        }

        Ok(Self {
            shared,
            local_addr,
            rx: tokio::sync::Mutex::new(inbound_rx),
            closed: AtomicBool::new(false),
            closing: Notify::new(),
        })
    }

    /// The bound listen address, with the OS-assigned port filled in.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Broadcast for TcpBroadcast {
    /// Receives the next inbound message. A parked `recv` holds the
    /// receiver mutex, so `close` signals through a notification rather
    /// than taking the same lock; after close the buffered backlog
    /// drains, then the stream ends.
    async fn recv(&self) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        let closing = self.closing.notified();
        tokio::pin!(closing);
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
        let frame = Arc::new(bincode::serialize(&msg).map_err(|_| EngineError::Closed)?);
        let mut writers = self.shared.writers.lock();
        // prune dead links, drop frames to backlogged ones
        writers.retain(|tx| match tx.try_send(Arc::clone(&frame)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("[node] dropped frame to a slow peer");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closing.notify_waiters();
        self.shared.writers.lock().clear();
    }
}
