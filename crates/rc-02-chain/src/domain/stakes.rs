//! Per-block vote tally and the finality threshold.
//!
//! Every block carries a `Stakes` record: `sum` is the total stake
//! deposited in the ancestry including this block, and `votes` maps each
//! identity that built (directly or indirectly) on the block to its
//! stake. A block is final once the voting stake exceeds half of `sum`;
//! finality never reverts.

use serde::{Deserialize, Serialize};
use shared_types::{Pk, Stake};
use std::collections::BTreeMap;

/// Cumulative vote tally for one block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakes {
    /// Total stake deposited in the ancestry including this block.
    pub sum: Stake,
    /// Stake indirectly voting on this block, per identity.
    pub votes: BTreeMap<Pk, Stake>,
    /// Set once the majority threshold is crossed; never cleared.
    pub finalized: bool,
}

impl Stakes {
    /// An empty tally over a total of `sum` stake.
    pub fn new(sum: Stake) -> Self {
        Self {
            sum,
            votes: BTreeMap::new(),
            finalized: false,
        }
    }

    /// Total stake voting on this block.
    ///
    /// Overflow here means the chain accepted stake deposits beyond the
    /// u64 total, which is a programming error upstream; fail fast.
    pub fn votes_total(&self) -> Stake {
        self.votes
            .values()
            .try_fold(0u64, |acc, v| acc.checked_add(*v))
            .expect("vote stake sum overflows u64")
    }

    /// Record `stake` voting for this block under `pk`. A later vote by
    /// the same identity replaces the earlier entry, so an identity never
    /// counts twice.
    pub fn vote(&mut self, pk: Pk, stake: Stake) {
        self.votes.insert(pk, stake);
    }

    /// Finalisation measure in `[0, 1]`: voting stake over total stake.
    pub fn finalization(&self) -> f64 {
        if self.sum == 0 {
            return 0.0;
        }
        self.votes_total() as f64 / self.sum as f64
    }

    /// True once a strict majority of the total stake votes on the block.
    pub fn majority(&self) -> bool {
        // integer compare, no float thresholds: votes * 2 > sum
        u128::from(self.votes_total()) * 2 > u128::from(self.sum)
    }
}
