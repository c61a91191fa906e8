//! The write pool.
//!
//! One mutex over a `BTreeMap` keyed by write id; operations are short
//! and non-blocking, and iteration order is deterministic per call.
//! The pool is not bounded here — operators bound it upstream.

use crate::errors::MempoolError;
use parking_lot::Mutex;
use rc_01_ssi_state::{SsiError, State, Write, WriteId};
use std::collections::BTreeMap;
use tracing::trace;

/// Verdict of the pick visitor: keep going or stop (budget reached).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    Continue,
    Done,
}

/// In-memory set of unapplied writes, indexed by write id.
#[derive(Default)]
pub struct WritePool {
    writes: Mutex<BTreeMap<WriteId, Write>>,
}

impl WritePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a signed write to the pool.
    pub fn add(&self, write: Write) -> Result<(), MempoolError> {
        if !write.verify_signature() {
            return Err(MempoolError::InvalidWriteSignature);
        }
        let id = write.id();
        let mut writes = self.writes.lock();
        if writes.contains_key(&id) {
            return Err(MempoolError::AlreadyInPool);
        }
        writes.insert(id, write);
        Ok(())
    }

    /// Visit pending writes that apply cleanly on top of `state`.
    ///
    /// Each visited write is applied to `state` before the next is
    /// considered, so the visited sequence is a conflict-free batch
    /// ready for block inclusion. Writes the state has already applied
    /// (or that conflict with it) are skipped silently; `visit`
    /// returning [`PickOutcome::Done`] stops the scan.
    pub fn pick(&self, state: &mut State, mut visit: impl FnMut(&Write) -> PickOutcome) {
        let writes = self.writes.lock();
        for write in writes.values() {
            match state.apply(write) {
                Ok(()) => {
                    if visit(write) == PickOutcome::Done {
                        return;
                    }
                }
                Err(SsiError::AlreadyApplied) | Err(SsiError::ApplyConflict { .. }) => {
                    trace!("skipping unpickable write");
                }
            }
        }
    }

    /// Drop writes that appeared in the finalised prefix of the chain.
    pub fn remove(&self, ids: &[WriteId]) {
        let mut writes = self.writes.lock();
        for id in ids {
            writes.remove(id);
        }
    }

    pub fn contains(&self, id: &WriteId) -> bool {
        self.writes.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.lock().is_empty()
    }
}
