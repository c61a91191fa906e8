//! The storage contract the chain runs against.
//!
//! The backend owns durability and transactional commit semantics. A
//! transactional backend may fail any operation with
//! [`ChainError::AppendConflict`] when an optimistic transaction loses a
//! race; the engine retries the whole append a bounded number of times.
//! The in-memory adapter never conflicts.

use crate::domain::block::Block;
use crate::domain::stakes::Stakes;
use crate::errors::ChainError;
use shared_types::BlockId;

/// ACID key-value storage for blocks and their stake tallies.
pub trait ChainStore: Send + Sync {
    /// Read a block and its tally. `BlockNotExist` if absent.
    fn read(&self, id: &BlockId) -> Result<(Block, Stakes), ChainError>;

    /// Persist a block and its tally.
    fn write(&self, block: &Block, stakes: &Stakes) -> Result<(), ChainError>;

    /// Replace the tally of a stored block. `BlockNotExist` if absent.
    fn write_stakes(&self, id: &BlockId, stakes: &Stakes) -> Result<(), ChainError>;

    /// Whether a block with this id is stored.
    fn contains(&self, id: &BlockId) -> Result<bool, ChainError>;

    /// The current tip id. `TipNotExist` before genesis is pinned.
    fn read_tip(&self) -> Result<BlockId, ChainError>;

    /// Replace the tip id.
    fn write_tip(&self, id: &BlockId) -> Result<(), ChainError>;

    /// Ids of every stored block in `round`, in id order.
    fn round_ids(&self, round: u64) -> Result<Vec<BlockId>, ChainError>;
}
