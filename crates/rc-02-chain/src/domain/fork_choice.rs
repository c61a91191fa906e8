//! Rank-weighted longest-chain rule.
//!
//! Within a round, blocks are ranked by the big-endian integer value of
//! their VRF token, descending. A block at 1-based rank `r` weighs
//! `POINTS / r`, and its cumulative weight is its own weight plus the
//! cumulative weight of its prev. The tip is the block with the maximum
//! cumulative weight; a tie resolves toward the block whose weight was
//! most recently recomputed.
//!
//! Weight is deliberately independent of stake. Stake gates admission
//! (who may mint) and drives finality; the tip race is rank-only.

use shared_types::BlockId;
use std::collections::{BTreeMap, HashMap};

/// One ranked block inside a round.
#[derive(Clone, Debug)]
pub struct RankEntry {
    pub token: Vec<u8>,
    pub id: BlockId,
    pub prev: BlockId,
}

/// In-memory weight index over all appended blocks.
#[derive(Debug)]
pub struct ForkChoice {
    points: u64,
    /// Per round, entries sorted by token descending (rank order).
    rounds: BTreeMap<u64, Vec<RankEntry>>,
    /// Cumulative weight per block.
    weights: HashMap<BlockId, u64>,
    /// Recomputation recency per block, for the tie-break.
    seq: HashMap<BlockId, u64>,
    counter: u64,
    tip: Option<BlockId>,
}

impl ForkChoice {
    pub fn new(points: u64) -> Self {
        Self {
            points,
            rounds: BTreeMap::new(),
            weights: HashMap::new(),
            seq: HashMap::new(),
            counter: 0,
            tip: None,
        }
    }

    /// Insert a block and re-rank from its round upward.
    ///
    /// Re-sorting affects only the block's own round, but cumulative
    /// weights of every later round depend on it, so those rounds are
    /// recomputed as well.
    pub fn insert(&mut self, round: u64, entry: RankEntry) {
        let entries = self.rounds.entry(round).or_default();
        entries.push(entry);
        // descending big-endian integer order == descending byte order
        entries.sort_by(|a, b| b.token.cmp(&a.token));
        self.recompute_from(round);
    }

    fn recompute_from(&mut self, round: u64) {
        let affected: Vec<u64> = self.rounds.range(round..).map(|(r, _)| *r).collect();
        for r in affected {
            let entries = self.rounds[&r].clone();
            for (i, entry) in entries.iter().enumerate() {
                let rank = (i + 1) as u64;
                let base = self.weights.get(&entry.prev).copied().unwrap_or(0);
                self.counter += 1;
                self.weights.insert(entry.id, base + self.points / rank);
                self.seq.insert(entry.id, self.counter);
            }
        }
        self.select_tip();
    }

    fn select_tip(&mut self) {
        let mut best: Option<(u64, u64, BlockId)> = None;
        for (id, &weight) in &self.weights {
            let seq = self.seq.get(id).copied().unwrap_or(0);
            let candidate = (weight, seq, *id);
            best = match best {
                None => Some(candidate),
                // recency (seq) breaks weight ties
                Some(current) if (candidate.0, candidate.1) > (current.0, current.1) => {
                    Some(candidate)
                }
                Some(current) => Some(current),
            };
        }
        self.tip = best.map(|(_, _, id)| id);
    }

    /// Current tip, if any block was inserted.
    pub fn tip(&self) -> Option<BlockId> {
        self.tip
    }

    /// Cumulative weight of a block.
    pub fn weight(&self, id: &BlockId) -> Option<u64> {
        self.weights.get(id).copied()
    }

    /// 1-based rank of a block within its round.
    pub fn rank_of(&self, round: u64, id: &BlockId) -> Option<usize> {
        self.rounds
            .get(&round)?
            .iter()
            .position(|e| e.id == *id)
            .map(|i| i + 1)
    }
}
