//! The chain: append pipeline, minting, and ancestry walks.
//!
//! Blocks are stored in a map keyed by content-hash id and never hold
//! pointers to each other; ancestry is traversed by repeated lookup,
//! which keeps ownership acyclic and makes persistent backing trivial.
//!
//! The index structures (fork-choice weights, per-round voter sets, the
//! finalised-state cache) sit behind a single reader-writer lock. Append
//! takes the write lock for its whole critical section; reads during
//! minting and views take the read lock.

use crate::domain::block::Block;
use crate::domain::fork_choice::{ForkChoice, RankEntry};
use crate::domain::keys::{read_stake, read_token_pk, total_stake};
use crate::domain::stakes::Stakes;
use crate::errors::ChainError;
use crate::ports::store::ChainStore;
use parking_lot::RwLock;
use rc_01_ssi_state::{State, Write, WriteId};
use shared_types::{BlockId, Pk, Stake};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a successful append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Id of the appended block.
    pub id: BlockId,
    /// Blocks that crossed the majority threshold during this append,
    /// oldest first.
    pub newly_finalized: Vec<BlockId>,
    /// Ids of the writes carried by the newly finalised blocks; the
    /// engine evicts these from the mempool.
    pub finalized_writes: Vec<WriteId>,
}

struct Index {
    fork: ForkChoice,
    /// Identities that already minted, per round.
    voted: HashMap<u64, HashSet<Pk>>,
    /// Most recent majority-finalised block.
    finalized_id: BlockId,
    /// State at `finalized_id`; reconstruction replays only the
    /// unfinalised tail on top of a clone of this.
    finalized_state: State,
}

/// Persistent store of blocks plus the longest-chain and finality index.
pub struct Chain {
    store: Arc<dyn ChainStore>,
    genesis_id: BlockId,
    index: RwLock<Index>,
}

impl Chain {
    /// Create a chain over `store`, pinning `genesis`.
    ///
    /// Genesis is the protocol constant every node agrees on out of
    /// band: round 0, no signature, no ticket. It is finalised by
    /// definition and its writes (initial stake deposits and token-pk
    /// commitments) seed the finalised-state cache.
    pub fn new(
        store: Arc<dyn ChainStore>,
        genesis: Block,
        weight_points: u64,
    ) -> Result<Self, ChainError> {
        let genesis_id = genesis.id();
        let genesis_state = State::reconstruct([genesis.writes.as_slice()])
            .map_err(ChainError::StateReconstruction)?;

        if !store.contains(&genesis_id)? {
            let stakes = Stakes {
                sum: total_stake(&genesis_state),
                finalized: true,
                ..Stakes::default()
            };
            store.write(&genesis, &stakes)?;
            store.write_tip(&genesis_id)?;
            info!("[rc-02] pinned genesis {genesis_id}");
        }

        let mut fork = ForkChoice::new(weight_points);
        fork.insert(
            0,
            RankEntry {
                token: genesis.token.clone(),
                id: genesis_id,
                prev: BlockId::ZERO,
            },
        );

        Ok(Self {
            store,
            genesis_id,
            index: RwLock::new(Index {
                fork,
                voted: HashMap::new(),
                finalized_id: genesis_id,
                finalized_state: genesis_state,
            }),
        })
    }

    /// The pinned genesis id.
    pub fn genesis_id(&self) -> BlockId {
        self.genesis_id
    }

    /// The block id with the maximum cumulative weight.
    pub fn tip(&self) -> Result<BlockId, ChainError> {
        self.index.read().fork.tip().ok_or(ChainError::TipNotExist)
    }

    /// The most recent majority-finalised block id.
    pub fn finalized_id(&self) -> BlockId {
        self.index.read().finalized_id
    }

    /// Read a block and its tally from the store.
    pub fn read(&self, id: &BlockId) -> Result<(Block, Stakes), ChainError> {
        self.store.read(id)
    }

    /// Iterate from `id` back to genesis, yielding each block and its
    /// tally. The closure's error aborts the walk and propagates.
    pub fn walk(
        &self,
        id: BlockId,
        mut f: impl FnMut(&BlockId, &Block, &Stakes) -> Result<(), ChainError>,
    ) -> Result<(), ChainError> {
        let mut current = id;
        loop {
            let (block, stakes) = self.store.read(&current)?;
            f(&current, &block, &stakes)?;
            if block.is_genesis() {
                return Ok(());
            }
            current = block.prev;
        }
    }

    /// Reconstruct the replicated state as of `at` (inclusive).
    ///
    /// Clones the finalised-state cache and replays the unfinalised tail
    /// between the cached block and `at`, so the cost is linear in the
    /// unfinalised suffix rather than the whole chain.
    pub fn state_at(&self, at: BlockId) -> Result<State, ChainError> {
        let (finalized_id, base) = {
            let index = self.index.read();
            (index.finalized_id, index.finalized_state.clone())
        };
        self.replay_onto(base, finalized_id, at)
    }

    /// Apply the writes of every block after `base_id` up to `at` onto
    /// `base`. `base_id` must be an ancestor of `at` (or `at` itself).
    fn replay_onto(
        &self,
        mut base: State,
        base_id: BlockId,
        at: BlockId,
    ) -> Result<State, ChainError> {
        let mut tail: Vec<Block> = Vec::new();
        let mut current = at;
        while current != base_id {
            let (block, _) = self.store.read(&current)?;
            let is_genesis = block.is_genesis();
            let prev = block.prev;
            tail.push(block);
            if is_genesis {
                // walked past the cached block without meeting it: `at`
                // is not a descendant of `base_id`
                return Err(ChainError::FinalizedPrevNotInChain(base_id));
            }
            current = prev;
        }
        for block in tail.iter().rev() {
            for write in &block.writes {
                base.apply(write).map_err(ChainError::StateReconstruction)?;
            }
        }
        Ok(base)
    }

    /// Append a block. Atomic: all index updates happen in one critical
    /// section, and concurrent readers observe either the old or the new
    /// tip, never an intermediate.
    pub fn append(&self, block: &Block) -> Result<AppendOutcome, ChainError> {
        let mut index = self.index.write();

        // 1. signature
        if !block.verify_signature() {
            return Err(ChainError::InvalidSignature);
        }
        // 2. round 0 is reserved
        if block.round == 0 {
            return Err(ChainError::ZeroRound);
        }
        // 3. duplicates
        let id = block.id();
        if self.store.contains(&id)? {
            return Err(ChainError::BlockExist(id));
        }

        // 4. walk the prev chain: prev must exist, finalized_prev must be
        // on the ancestor path, and the path must contain the locally
        // established finalised block — an ancestry that skips it would
        // contradict finality.
        let (prev_block, _) = self.store.read(&block.prev)?;
        let mut path = Vec::new(); // prev .. genesis, newest first
        self.walk(block.prev, |walk_id, walk_block, _| {
            path.push((*walk_id, walk_block.prev));
            Ok(())
        })?;
        if !path.iter().any(|(walk_id, _)| *walk_id == block.finalized_prev) {
            return Err(ChainError::FinalizedPrevNotInChain(block.finalized_prev));
        }
        if !path.iter().any(|(walk_id, _)| *walk_id == index.finalized_id) {
            return Err(ChainError::FinalizedPrevNotInChain(index.finalized_id));
        }

        // 5. reconstruct state at prev
        let mut state = self.replay_onto(
            index.finalized_state.clone(),
            index.finalized_id,
            block.prev,
        )?;

        // 6. proposer stake and ticket
        let stake = read_stake(&state, &block.pk);
        let token_pk = read_token_pk(&state, &block.pk).ok_or(ChainError::NoTokenPk)?;
        if !block.verify_token(&token_pk) {
            return Err(ChainError::InvalidToken);
        }

        // 7. validate the block's writes against the state at prev; the
        // throwaway state doubles as the dry run, first failure wins
        for write in &block.writes {
            state.apply(write).map_err(ChainError::ApplyConflict)?;
        }

        // 8. strict progression from prev
        if block.timestamp <= prev_block.timestamp {
            return Err(ChainError::StaleTimestamp {
                prev: prev_block.timestamp,
                got: block.timestamp,
            });
        }
        if block.round <= prev_block.round {
            return Err(ChainError::RoundNotAfterPrev {
                prev: prev_block.round,
                got: block.round,
            });
        }
        // one block per identity per round
        if index
            .voted
            .get(&block.round)
            .is_some_and(|set| set.contains(&block.pk))
        {
            return Err(ChainError::VoterAlreadyVoted(block.round));
        }

        // 9. persist the block with an empty tally
        self.store.write(block, &Stakes::new(total_stake(&state)))?;
        index.voted.entry(block.round).or_default().insert(block.pk);

        // 10. re-rank the round and refresh the tip
        index.fork.insert(
            block.round,
            RankEntry {
                token: block.token.clone(),
                id,
                prev: block.prev,
            },
        );
        if let Some(tip) = index.fork.tip() {
            self.store.write_tip(&tip)?;
        }

        // 11. flow the proposer's stake to every unfinalised ancestor
        let newly_finalized = self.distribute_stake(&mut index, block.prev, block.pk, stake)?;
        let mut finalized_writes = Vec::new();
        for fin_id in &newly_finalized {
            let (fin_block, _) = self.store.read(fin_id)?;
            for write in &fin_block.writes {
                finalized_writes.push(write.id());
                index
                    .finalized_state
                    .apply(write)
                    .map_err(ChainError::StateReconstruction)?;
            }
            index.finalized_id = *fin_id;
        }

        debug!(
            "[rc-02] appended {id} (weight {:?}, {} finalized)",
            index.fork.weight(&id),
            newly_finalized.len()
        );

        Ok(AppendOutcome {
            id,
            newly_finalized,
            finalized_writes,
        })
    }

    /// Walk back from `from` adding `stake` to each unfinalised
    /// ancestor's tally, marking majorities final. Stops at the first
    /// already-finalised block, so the cost is linear in the unfinalised
    /// suffix. Returns newly finalised ids, oldest first.
    fn distribute_stake(
        &self,
        index: &mut Index,
        from: BlockId,
        pk: Pk,
        stake: Stake,
    ) -> Result<Vec<BlockId>, ChainError> {
        let mut newly_finalized = Vec::new();
        let mut current = from;
        while current != index.finalized_id {
            let (block, mut stakes) = self.store.read(&current)?;
            if stakes.finalized {
                break;
            }
            stakes.vote(pk, stake);
            if stakes.majority() {
                stakes.finalized = true;
                newly_finalized.push(current);
                info!(
                    "[rc-02] finalized {current} at {:.2}",
                    stakes.finalization()
                );
            }
            self.store.write_stakes(&current, &stakes)?;
            if block.is_genesis() {
                break;
            }
            current = block.prev;
        }
        newly_finalized.reverse();
        Ok(newly_finalized)
    }

    /// Mint a block for `round` at proposer time `timestamp`.
    ///
    /// Reads the current tip and the proposer's stake from reconstructed
    /// state; a proposer without stake does not mint. `picker` selects
    /// the writes to include given the state at the tip.
    pub fn mint(
        &self,
        identity: &shared_crypto::Identity,
        round: u64,
        timestamp: u64,
        picker: impl FnOnce(&State) -> Vec<Write>,
    ) -> Result<Option<Block>, ChainError> {
        let tip = self.tip()?;
        let state = self.state_at(tip)?;

        let stake = read_stake(&state, &identity.pk());
        if stake < 1 {
            return Ok(None);
        }

        // most recent majority-finalised ancestor of the tip
        let mut finalized_prev = self.genesis_id;
        self.walk(tip, |walk_id, _, stakes| {
            if stakes.finalized && finalized_prev == self.genesis_id {
                finalized_prev = *walk_id;
            }
            Ok(())
        })?;

        let writes = picker(&state);
        let mut block = Block {
            round,
            timestamp,
            prev: tip,
            finalized_prev,
            writes,
            ..Block::default()
        };
        block.sign(identity);
        Ok(Some(block))
    }
}
