//! In-memory `ChainStore` backend.
//!
//! One reader-writer lock over all index structures, so every
//! multi-structure update is a single critical section. Appends are
//! serialised by the write lock and `AppendConflict` never fires here.

use crate::domain::block::Block;
use crate::domain::stakes::Stakes;
use crate::errors::ChainError;
use crate::ports::store::ChainStore;
use parking_lot::RwLock;
use shared_types::BlockId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
struct Inner {
    blocks: HashMap<BlockId, (Block, Stakes)>,
    rounds: BTreeMap<u64, BTreeSet<BlockId>>,
    tip: Option<BlockId>,
}

/// Memory-backed block store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }
}

impl ChainStore for MemoryStore {
    fn read(&self, id: &BlockId) -> Result<(Block, Stakes), ChainError> {
        self.inner
            .read()
            .blocks
            .get(id)
            .cloned()
            .ok_or(ChainError::BlockNotExist(*id))
    }

    fn write(&self, block: &Block, stakes: &Stakes) -> Result<(), ChainError> {
        let mut inner = self.inner.write();
        let id = block.id();
        inner.blocks.insert(id, (block.clone(), stakes.clone()));
        inner.rounds.entry(block.round).or_default().insert(id);
        Ok(())
    }

    fn write_stakes(&self, id: &BlockId, stakes: &Stakes) -> Result<(), ChainError> {
        let mut inner = self.inner.write();
        match inner.blocks.get_mut(id) {
            Some(entry) => {
                entry.1 = stakes.clone();
                Ok(())
            }
            None => Err(ChainError::BlockNotExist(*id)),
        }
    }

    fn contains(&self, id: &BlockId) -> Result<bool, ChainError> {
        Ok(self.inner.read().blocks.contains_key(id))
    }

    fn read_tip(&self) -> Result<BlockId, ChainError> {
        self.inner.read().tip.ok_or(ChainError::TipNotExist)
    }

    fn write_tip(&self, id: &BlockId) -> Result<(), ChainError> {
        self.inner.write().tip = Some(*id);
        Ok(())
    }

    fn round_ids(&self, round: u64) -> Result<Vec<BlockId>, ChainError> {
        Ok(self
            .inner
            .read()
            .rounds
            .get(&round)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }
}
