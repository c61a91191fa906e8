//! Snapshot store, transactions, and the status oracle.
//!
//! `State` is a cheaply cloneable snapshot of the replicated key-value
//! store. The chain reconstructs a fresh `State` per block validation and
//! keeps one long-lived instance for the finalised prefix; everything else
//! works on throwaway clones, which is what makes dry runs and mint
//! previews safe.
//!
//! The oracle bookkeeping is two maps: `row_commits` records, per row
//! fingerprint, the commit-timestamp of the latest write to touch it, and
//! `clock` is the monotonic commit counter every transaction draws its
//! start-timestamp from.

use crate::domain::errors::SsiError;
use crate::domain::write::{KeyValue, Write, WriteId};
use shared_types::{row_fingerprint, RowHash};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::trace;

/// A consistent snapshot of the replicated state.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Values keyed by the full key. Fingerprint collisions cannot reach
    /// here; they only affect the conflict metadata below.
    data: HashMap<Vec<u8>, Vec<u8>>,
    /// Latest commit-timestamp per row fingerprint.
    row_commits: HashMap<RowHash, u64>,
    /// Monotonic commit counter.
    clock: u64,
    /// Ids of writes already folded into this snapshot.
    applied: HashSet<WriteId>,
}

/// The collected read/write sets of a finished transaction, detached from
/// the snapshot it ran against so the snapshot can be mutated at commit.
#[derive(Debug, Default)]
pub struct TxData {
    pub start_ts: u64,
    pub reads: BTreeSet<RowHash>,
    pub writes: BTreeMap<RowHash, KeyValue>,
}

impl TxData {
    /// True when the transaction wrote nothing.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// An in-flight transaction over a snapshot.
///
/// `get` records reads; `set` records writes and updates a private
/// overlay so subsequent `get`s observe the transaction's own writes.
pub struct Tx<'a> {
    snapshot: &'a State,
    data: TxData,
    overlay: HashMap<Vec<u8>, Vec<u8>>,
}

impl<'a> Tx<'a> {
    /// Read a key, recording the row in the read set.
    pub fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.reads.insert(row_fingerprint(key));
        if let Some(value) = self.overlay.get(key) {
            return Some(value.clone());
        }
        self.snapshot.data.get(key).cloned()
    }

    /// Write a key, recording the row in the write set.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let row = row_fingerprint(key);
        self.data.writes.insert(
            row,
            KeyValue {
                key: key.to_vec(),
                value: value.to_vec(),
            },
        );
        self.overlay.insert(key.to_vec(), value.to_vec());
    }

    /// Detach the read/write sets from the snapshot borrow.
    pub fn into_data(self) -> TxData {
        self.data
    }
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a transaction at the current counter value.
    pub fn begin(&self) -> Tx<'_> {
        Tx {
            snapshot: self,
            data: TxData {
                start_ts: self.clock,
                ..TxData::default()
            },
            overlay: HashMap::new(),
        }
    }

    /// Commit a finished transaction through the status oracle.
    ///
    /// On success the counter advances, every written row records the new
    /// commit-timestamp, and the unsigned [`Write`] carrying the diff is
    /// returned for the caller to sign and broadcast.
    pub fn commit(&mut self, data: TxData) -> Result<Write, SsiError> {
        for row in &data.reads {
            if let Some(&committed) = self.row_commits.get(row) {
                if committed > data.start_ts {
                    return Err(SsiError::ApplyConflict {
                        row: *row,
                        committed,
                        start: data.start_ts,
                    });
                }
            }
        }
        self.clock += 1;
        let time_commit = self.clock;
        for (row, kv) in &data.writes {
            self.data.insert(kv.key.clone(), kv.value.clone());
            self.row_commits.insert(*row, time_commit);
        }
        Ok(Write {
            time_start: data.start_ts,
            time_commit,
            reads: data.reads,
            writes: data.writes,
            ..Write::default()
        })
    }

    /// Replay a committed write with its recorded timestamps.
    ///
    /// Used to rebuild state from the chain's write log. Rejects
    /// duplicates (`AlreadyApplied`) and stale snapshots
    /// (`ApplyConflict`), which during reconstruction signals that the
    /// chain itself carries an invalid block.
    pub fn apply(&mut self, write: &Write) -> Result<(), SsiError> {
        let id = write.id();
        if self.applied.contains(&id) {
            return Err(SsiError::AlreadyApplied);
        }
        write.check_against(&self.row_commits)?;
        for (row, kv) in &write.writes {
            self.data.insert(kv.key.clone(), kv.value.clone());
            self.row_commits.insert(*row, write.time_commit);
        }
        self.clock = self.clock.max(write.time_commit);
        self.applied.insert(id);
        trace!(time_commit = write.time_commit, "applied write");
        Ok(())
    }

    /// Dry-run commit: report what [`State::apply`] would do without
    /// mutating the snapshot. Equivalent to applying and immediately
    /// reverting.
    pub fn apply_dry_run(&self, write: &Write) -> Result<(), SsiError> {
        if self.applied.contains(&write.id()) {
            return Err(SsiError::AlreadyApplied);
        }
        write.check_against(&self.row_commits)
    }

    /// Rebuild a state from an ordered log of write batches.
    ///
    /// Any conflict aborts reconstruction with the offending error; the
    /// caller treats that as proof the log (i.e. the chain) is invalid.
    pub fn reconstruct<'w>(
        batches: impl IntoIterator<Item = &'w [Write]>,
    ) -> Result<State, SsiError> {
        let mut state = State::new();
        for batch in batches {
            for write in batch {
                state.apply(write)?;
            }
        }
        Ok(state)
    }

    /// Read-only access bypassing the oracle entirely.
    pub fn get_ro(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// True if the snapshot has folded in the write with this id.
    pub fn has_applied(&self, id: &WriteId) -> bool {
        self.applied.contains(id)
    }

    /// Current value of the commit counter.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Visit every key with the given prefix in sorted key order.
    pub fn scan_prefix(&self, prefix: &[u8], mut f: impl FnMut(&[u8], &[u8])) {
        let mut keys: Vec<&Vec<u8>> = self
            .data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .collect();
        keys.sort();
        for key in keys {
            f(key, &self.data[key]);
        }
    }
}
