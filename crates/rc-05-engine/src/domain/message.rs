//! The wire envelope.
//!
//! One envelope type for everything peers exchange; a message carries a
//! block, a write, or (legitimately) both. Encoded with bincode on the
//! wire by the network adapter.

use rc_01_ssi_state::Write;
use rc_02_chain::Block;
use rc_04_sequencer::Dependencies;
use serde::{Deserialize, Serialize};
use shared_types::BlockId;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub block: Option<Block>,
    pub write: Option<Write>,
}

impl Message {
    pub fn from_block(block: Block) -> Self {
        Self {
            block: Some(block),
            write: None,
        }
    }

    pub fn from_write(write: Write) -> Self {
        Self {
            block: None,
            write: Some(write),
        }
    }
}

impl Dependencies for Message {
    /// A block waits for its parent; writes and genesis do not wait.
    fn block_dep(&self) -> Option<BlockId> {
        self.block
            .as_ref()
            .map(|block| block.prev)
            .filter(|prev| !prev.is_zero())
    }

    /// A block for round `r` waits until the local clock reaches `r`.
    fn round_dep(&self) -> u64 {
        self.block.as_ref().map_or(0, |block| block.round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_has_no_deps() {
        let msg = Message::from_write(Write::default());
        assert_eq!(msg.block_dep(), None);
        assert_eq!(msg.round_dep(), 0);
    }

    #[test]
    fn test_block_waits_on_prev_and_round() {
        let block = Block {
            round: 3,
            prev: BlockId::from_hash([1u8; 32], 2),
            ..Block::default()
        };
        let msg = Message::from_block(block.clone());
        assert_eq!(msg.block_dep(), Some(block.prev));
        assert_eq!(msg.round_dep(), 3);
    }

    #[test]
    fn test_zero_prev_has_no_block_dep() {
        let block = Block {
            round: 1,
            ..Block::default()
        };
        assert_eq!(Message::from_block(block).block_dep(), None);
    }
}
