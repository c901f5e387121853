//! Interfaces of the core engine, as seen by the outer engine.

use anyhow::Result;

use crate::{
    crypto::{Hash, NodeId},
    summary::{Summary, SummaryKey},
};

/// The parts of a core block the outer engine needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreBlock {
    pub id: Hash,
    pub height: u64,
    pub parent_id: Hash,
}

/// Every core engine can parse its own blocks. Support for state sync is optional and discovered through
/// [ChainEngine::state_syncable].
pub trait ChainEngine {
    fn parse_block(&self, bytes: &[u8]) -> Result<CoreBlock>;

    /// Returns the engine's state sync capability, or `None` if it does not support state sync.
    fn state_syncable(&self) -> Option<&dyn StateSyncableEngine> {
        None
    }
}

/// The optional state sync capability of a core engine. Summaries crossing this interface are core summaries, which
/// never carry outer block identifiers.
pub trait StateSyncableEngine {
    /// Sets the nodes the engine should trust to serve state.
    fn register_state_syncers(&self, syncers: &[NodeId]) -> Result<()>;

    fn state_sync_enabled(&self) -> Result<bool>;

    /// The summary of the engine's most recent checkpoint.
    fn last_summary(&self) -> Result<Summary>;

    /// The summary at `key`. Fails if the engine has no summary there.
    fn summary(&self, key: SummaryKey) -> Result<Summary>;

    /// Starts syncing to one of the `summaries`, which a quorum of peers accepted.
    fn accept_summaries(&self, summaries: &[Summary]) -> Result<()>;

    /// The core block the engine selected as its sync target from the last accepted batch.
    fn last_summary_block_id(&self) -> Result<Hash>;

    /// Completes sync by handing the engine the bytes of its sync target block.
    fn set_last_summary_block(&self, block_bytes: &[u8]) -> Result<()>;
}

impl<T: ChainEngine + ?Sized> ChainEngine for std::sync::Arc<T> {
    fn parse_block(&self, bytes: &[u8]) -> Result<CoreBlock> {
        (**self).parse_block(bytes)
    }

    fn state_syncable(&self) -> Option<&dyn StateSyncableEngine> {
        (**self).state_syncable()
    }
}
