//! Error types for the chain subsystem.

use rc_01_ssi_state::SsiError;
use shared_types::BlockId;
use thiserror::Error;

/// Errors raised by the append pipeline, minting, and the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The block signature does not verify under the embedded pk.
    #[error("Invalid block signature")]
    InvalidSignature,

    /// The VRF token does not verify under the committed token pk.
    #[error("Invalid VRF token")]
    InvalidToken,

    /// Round 0 is reserved for genesis.
    #[error("Zero round is reserved for genesis")]
    ZeroRound,

    /// The block id is already stored.
    #[error("Block {0} already exists")]
    BlockExist(BlockId),

    /// A referenced block is not stored.
    #[error("Block {0} does not exist")]
    BlockNotExist(BlockId),

    /// The store has no tip yet.
    #[error("Tip does not exist")]
    TipNotExist,

    /// `finalized_prev` is not on the ancestor path of `prev`, or the
    /// ancestry contradicts established finalisation.
    #[error("Finalized prev {0} not in chain")]
    FinalizedPrevNotInChain(BlockId),

    /// The proposer never committed a token pk to state.
    #[error("No token pk committed for proposer")]
    NoTokenPk,

    /// State reconstruction at `prev` failed: the ancestry carries an
    /// invalid write log.
    #[error("State reconstruction failed: {0}")]
    StateReconstruction(SsiError),

    /// A write in the block conflicts with the state at `prev`.
    #[error("Write rejected: {0}")]
    ApplyConflict(SsiError),

    /// Optimistic-concurrency conflict in the storage backend. The
    /// engine retries the whole append a bounded number of times.
    #[error("Append conflict, retry")]
    AppendConflict,

    /// The proposer already minted a block in this round.
    #[error("Voter already voted in round {0}")]
    VoterAlreadyVoted(u64),

    /// The block's timestamp does not advance past its prev.
    #[error("Timestamp {got} not after prev timestamp {prev}")]
    StaleTimestamp { prev: u64, got: u64 },

    /// The block's round does not advance past its prev.
    #[error("Round {got} not after prev round {prev}")]
    RoundNotAfterPrev { prev: u64, got: u64 },
}
