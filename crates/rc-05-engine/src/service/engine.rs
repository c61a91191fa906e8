//! The engine lifecycle.
//!
//! Two loops run per node. The clock loop resolves each round in the
//! sequencer, mints a block when the identity holds stake, and handles
//! the minted block locally so it takes the same append path as a peer's
//! block. The broadcast loop feeds incoming messages to the sequencer.
//!
//! Every message, local or remote, converges on [`Core::handle`]: blocks
//! go through the append pipeline with a bounded retry on storage
//! contention, writes go to the mempool. Successful appends resolve the
//! block in the sequencer and re-broadcast it; writes accepted into the
//! pool are forwarded the same way. Duplicates die here (`BlockExist`,
//! `AlreadyInPool`), which is what makes flood gossip terminate.

use crate::domain::message::Message;
use crate::errors::EngineError;
use crate::ports::broadcast::Broadcast;
use crate::ports::clock::Clock;
use async_trait::async_trait;
use parking_lot::Mutex;
use rc_01_ssi_state::{State, Tx, Write, WriteId};
use rc_02_chain::{Block, Chain, ChainError};
use rc_03_mempool::{MempoolError, PickOutcome, WritePool};
use rc_04_sequencer::{Sequencer, SequencerHandler};
use shared_crypto::Identity;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Appends contending on a persistent backend retry this many times.
const APPEND_ATTEMPTS: u32 = 5;

/// The message-handling half of the engine, shared with the sequencer.
pub(crate) struct Core<B: Broadcast> {
    identity: Identity,
    chain: Arc<Chain>,
    pool: Arc<WritePool>,
    broadcast: Arc<B>,
    /// Back-reference, set once during [`Engine::start`].
    seq: OnceLock<Arc<Sequencer<Message, Core<B>>>>,
}

#[async_trait]
impl<B: Broadcast> SequencerHandler<Message> for Core<B> {
    async fn handle(&self, msg: Message) {
        if let Some(block) = msg.block {
            self.handle_block(block).await;
        }
        if let Some(write) = msg.write {
            match self.handle_write(write).await {
                Ok(()) | Err(EngineError::Mempool(MempoolError::AlreadyInPool)) => {}
                Err(err) => warn!("[rc-05] dropped write: {err}"),
            }
        }
    }
}

impl<B: Broadcast> Core<B> {
    /// Append a block, resolve it, evict its finalised writes, and pass
    /// it on to peers. Validation failures are terminal for the message,
    /// not the node.
    async fn handle_block(&self, block: Block) {
        for attempt in 1..=APPEND_ATTEMPTS {
            match self.chain.append(&block) {
                Ok(outcome) => {
                    self.pool.remove(&outcome.finalized_writes);
                    if let Some(seq) = self.seq.get() {
                        seq.resolve(outcome.id);
                    }
                    if let Err(err) = self.broadcast.send(Message::from_block(block)).await {
                        debug!("[rc-05] rebroadcast failed: {err}");
                    }
                    return;
                }
                Err(ChainError::BlockExist(id)) => {
                    trace!("[rc-05] already have {id}");
                    return;
                }
                Err(ChainError::AppendConflict) if attempt < APPEND_ATTEMPTS => {
                    debug!("[rc-05] append contention, attempt {attempt}");
                    tokio::task::yield_now().await;
                }
                Err(err) => {
                    warn!("[rc-05] rejected block {}: {err}", block.id());
                    return;
                }
            }
        }
    }

    /// Admit a write to the pool and forward it.
    async fn handle_write(&self, write: Write) -> Result<(), EngineError> {
        self.pool.add(write.clone())?;
        self.broadcast.send(Message::from_write(write)).await
    }
}

/// A running node: chain, mempool, sequencer, and the two loops.
pub struct Engine<C: Clock, B: Broadcast> {
    core: Arc<Core<B>>,
    seq: Arc<Sequencer<Message, Core<B>>>,
    clock: Arc<C>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    done: Arc<Flag>,
}

/// A latched notification.
struct Flag {
    set: AtomicBool,
    notify: Notify,
}

impl Flag {
    fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn raise(&self) {
        self.set.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn wait(&self) {
        while !self.set.load(Ordering::SeqCst) {
            let notified = self.notify.notified();
            if self.set.load(Ordering::SeqCst) {
                break;
            }
            notified.await;
        }
    }
}

impl<C: Clock, B: Broadcast> Engine<C, B> {
    /// Start the engine: pin genesis as resolved and spawn the loops.
    ///
    /// `write_budget` caps the writes packed into a minted block; 0
    /// means unbounded.
    pub fn start(
        identity: Identity,
        chain: Arc<Chain>,
        pool: Arc<WritePool>,
        clock: Arc<C>,
        broadcast: Arc<B>,
        write_budget: usize,
    ) -> Self {
        let core = Arc::new(Core {
            identity,
            chain,
            pool,
            broadcast,
            seq: OnceLock::new(),
        });
        let seq = Arc::new(Sequencer::new(Arc::clone(&core)));
        let _ = core.seq.set(Arc::clone(&seq));

        // the base every chain starts from is never waited on
        seq.resolve(core.chain.genesis_id());

        let done = Arc::new(Flag::new());
        let clock_task = {
            let core = Arc::clone(&core);
            let seq = Arc::clone(&seq);
            let clock = Arc::clone(&clock);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                Self::clock_loop(core, seq, clock, write_budget).await;
                done.raise();
            })
        };
        let recv_task = {
            let core = Arc::clone(&core);
            let seq = Arc::clone(&seq);
            tokio::spawn(async move {
                while let Some(msg) = core.broadcast.recv().await {
                    seq.handle(msg);
                }
                debug!("[rc-05] broadcast loop ended");
            })
        };

        Self {
            core,
            seq,
            clock,
            tasks: Mutex::new(vec![clock_task, recv_task]),
            done,
        }
    }

    async fn clock_loop(
        core: Arc<Core<B>>,
        seq: Arc<Sequencer<Message, Core<B>>>,
        clock: Arc<C>,
        write_budget: usize,
    ) {
        while let Some((round, timestamp)) = clock.next().await {
            seq.resolve_round(round);

            let minted = core.chain.mint(&core.identity, round, timestamp, |state| {
                let mut scratch = state.clone();
                let mut writes = Vec::new();
                core.pool.pick(&mut scratch, |write| {
                    writes.push(write.clone());
                    if write_budget != 0 && writes.len() >= write_budget {
                        PickOutcome::Done
                    } else {
                        PickOutcome::Continue
                    }
                });
                writes
            });
            match minted {
                Ok(Some(block)) => {
                    info!(
                        "[rc-05] minted {} with {} writes for round {round}",
                        block.id(),
                        block.writes.len()
                    );
                    core.handle_block(block).await;
                }
                Ok(None) => trace!("[rc-05] no stake, skipping round {round}"),
                Err(err) => warn!("[rc-05] mint failed for round {round}: {err}"),
            }
        }
        debug!("[rc-05] clock loop ended");
    }

    /// Run a transaction against the state at the current tip, commit
    /// it, and hand the signed write to the node. Returns once the write
    /// is pooled and broadcast locally; inclusion and finality follow
    /// asynchronously. A transaction that writes nothing is a no-op and
    /// returns `None` without touching the pool or the wire.
    pub async fn update(
        &self,
        f: impl FnOnce(&mut Tx<'_>),
    ) -> Result<Option<WriteId>, EngineError> {
        let tip = self.core.chain.tip()?;
        let mut state = self.core.chain.state_at(tip)?;
        let data = {
            let mut tx = state.begin();
            f(&mut tx);
            tx.into_data()
        };
        if data.is_empty() {
            return Ok(None);
        }
        let mut write = state.commit(data).map_err(EngineError::Commit)?;
        write.sign(&self.core.identity);
        let id = write.id();
        self.core.handle_write(write).await?;
        Ok(Some(id))
    }

    /// Run a read-only closure against a consistent snapshot at the
    /// current tip.
    pub fn view<R>(&self, f: impl FnOnce(&State) -> R) -> Result<R, EngineError> {
        let tip = self.core.chain.tip()?;
        let state = self.core.chain.state_at(tip)?;
        Ok(f(&state))
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.core.chain
    }

    pub fn pool(&self) -> &Arc<WritePool> {
        &self.core.pool
    }

    /// Feed a message into the node as if a peer sent it.
    pub fn handle(&self, msg: Message) {
        self.seq.handle(msg);
    }

    /// Wait for the clock loop to end.
    pub async fn done(&self) {
        self.done.wait().await;
    }

    /// Stop the node: close the broadcast endpoint, then the clock, then
    /// wait for both loops within `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), EngineError> {
        self.core.broadcast.close().await;
        self.clock.close().await;
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        tokio::time::timeout(deadline, async {
            for task in tasks {
                let _ = task.await;
            }
        })
        .await
        .map_err(|_| EngineError::Deadline)
    }
}
