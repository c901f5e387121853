use std::collections::HashMap;

use tracing::warn;

use crate::crypto::Hash;

/// Where a state sync round is, as far as the bridge can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No batch of accepted summaries is pending.
    Idle,
    /// A batch was handed to the core engine and the session mapping is built.
    SessionBuilt,
    /// The core engine's chosen block was resolved to an outer block.
    BlockResolved,
}

/// The mapping from core block identifiers to outer block identifiers for one batch of accepted summaries.
///
/// A session is built from a whole batch and replaced in full by the next batch; entries are never merged across
/// batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSession {
    mapping: HashMap<Hash, Hash>,
    resolved: Option<Hash>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SyncSession {
            mapping: HashMap::with_capacity(capacity),
            resolved: None,
        }
    }

    /// Records that the core block `core_block_id` is wrapped by the outer block `outer_block_id`. If two summaries in
    /// a batch name the same core block, the later one wins.
    pub fn record(&mut self, core_block_id: Hash, outer_block_id: Hash) {
        match self.mapping.insert(core_block_id, outer_block_id) {
            Some(previous) if previous != outer_block_id => {
                warn!(%core_block_id, %previous, %outer_block_id, "conflicting outer block IDs in summary batch");
            }
            _ => {}
        }
    }

    pub fn outer_block_id(&self, core_block_id: &Hash) -> Option<Hash> {
        self.mapping.get(core_block_id).copied()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// The outer block the core engine's chosen sync target resolved to, once known.
    pub fn resolved(&self) -> Option<Hash> {
        self.resolved
    }

    pub(crate) fn mark_resolved(&mut self, outer_block_id: Hash) {
        self.resolved = Some(outer_block_id);
    }

    pub fn phase(&self) -> SyncPhase {
        match self.resolved {
            Some(_) => SyncPhase::BlockResolved,
            None => SyncPhase::SessionBuilt,
        }
    }
}
