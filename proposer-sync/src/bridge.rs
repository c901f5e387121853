//! The state sync operations of the outer engine.
//!
//! Peers exchange wrapped summaries, which name the outer block at the checkpoint. The core engine only ever sees
//! core summaries. [StateSyncBridge] translates in both directions and remembers, for the batch of summaries most
//! recently accepted, which outer block wraps each core block, so the block the core engine finally selects can be
//! reported to peers by its outer identifier.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    block::{BlockWriter, OuterBlock},
    cfg::StateSyncConfig,
    codec::Codec,
    crypto::{Hash, NodeId},
    engine::{ChainEngine, StateSyncableEngine},
    error::StateSyncError,
    session::{SyncPhase, SyncSession},
    summary::{Summary, SummaryHash, SummaryKey},
    translate::SummaryTranslator,
};

pub struct StateSyncBridge<E, I> {
    config: StateSyncConfig,
    engine: E,
    translator: SummaryTranslator<I>,
    session: Mutex<Option<SyncSession>>,
}

impl<E: ChainEngine, I: BlockWriter> StateSyncBridge<E, I> {
    pub fn new(config: StateSyncConfig, engine: E, index: I) -> Self {
        StateSyncBridge {
            config,
            engine,
            translator: SummaryTranslator::new(index),
            session: Mutex::new(None),
        }
    }

    pub fn with_codec(config: StateSyncConfig, engine: E, index: I, codec: Arc<Codec>) -> Self {
        StateSyncBridge {
            config,
            engine,
            translator: SummaryTranslator::with_codec(index, codec),
            session: Mutex::new(None),
        }
    }

    fn syncable(&self) -> Result<&dyn StateSyncableEngine, StateSyncError> {
        self.engine
            .state_syncable()
            .ok_or(StateSyncError::NotImplemented)
    }

    pub fn register_state_syncers(&self, syncers: &[NodeId]) -> Result<(), StateSyncError> {
        let engine = self.syncable()?;
        debug!(count = syncers.len(), "registering state syncers");
        engine
            .register_state_syncers(syncers)
            .map_err(StateSyncError::engine("register state syncers"))
    }

    /// Forwards the state syncers from our configuration to the core engine.
    pub fn register_configured_state_syncers(&self) -> Result<(), StateSyncError> {
        self.register_state_syncers(&self.config.state_syncers)
    }

    pub fn state_sync_enabled(&self) -> Result<bool, StateSyncError> {
        let engine = self.syncable()?;
        if !self.config.enabled {
            debug!("state sync disabled by configuration");
            return Ok(false);
        }
        engine
            .state_sync_enabled()
            .map_err(StateSyncError::engine("check whether state sync is enabled"))
    }

    /// The wrapped summary of the core engine's most recent checkpoint.
    pub fn last_summary(&self) -> Result<Summary, StateSyncError> {
        let engine = self.syncable()?;
        let core = engine
            .last_summary()
            .map_err(StateSyncError::engine("retrieve last core summary"))?;
        self.translator.wrap(&core)
    }

    /// The wrapped summary at `key`.
    pub fn summary(&self, key: SummaryKey) -> Result<Summary, StateSyncError> {
        let engine = self.syncable()?;
        let core = engine
            .summary(key)
            .map_err(StateSyncError::engine("retrieve core summary"))?;
        self.translator.wrap(&core)
    }

    pub fn key_and_hash(
        &self,
        summary: &Summary,
    ) -> Result<(SummaryKey, SummaryHash), StateSyncError> {
        self.syncable()?;
        self.translator.key_and_hash(summary)
    }

    /// Hands a batch of wrapped summaries, which a quorum of peers accepted, to the core engine.
    ///
    /// The session built from the previous batch is discarded. The new session is installed only once every summary
    /// decoded and the core engine accepted the batch; otherwise no session remains. Overlapping calls are serialised,
    /// so the installed session always belongs to the batch the core engine accepted last.
    pub fn accept_summaries(&self, summaries: &[Summary]) -> Result<(), StateSyncError> {
        let engine = self.syncable()?;
        if summaries.len() > self.config.max_accepted_summaries {
            return Err(StateSyncError::BatchTooLarge {
                count: summaries.len(),
                limit: self.config.max_accepted_summaries,
            });
        }

        let mut current = self.session.lock();
        *current = None;

        let mut session = SyncSession::with_capacity(summaries.len());
        let mut core_summaries = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match self.translator.unwrap_with_content(summary) {
                Ok((content, core)) => {
                    session.record(content.core.block_id, content.outer_block_id);
                    core_summaries.push(core);
                }
                Err(e) => {
                    warn!(error = %e, "rejecting batch of accepted summaries");
                    return Err(e);
                }
            }
        }

        engine
            .accept_summaries(&core_summaries)
            .map_err(StateSyncError::engine("accept core summaries"))?;
        info!(count = core_summaries.len(), "accepted state summaries");
        *current = Some(session);

        Ok(())
    }

    /// The outer identifier of the block the core engine selected as its sync target.
    pub fn last_summary_block_id(&self) -> Result<Hash, StateSyncError> {
        let engine = self.syncable()?;
        let core_block_id = engine
            .last_summary_block_id()
            .map_err(StateSyncError::engine("retrieve last summary block ID"))?;

        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return Err(StateSyncError::UnknownLastSummaryBlockId(core_block_id));
        };
        let Some(outer_block_id) = session.outer_block_id(&core_block_id) else {
            return Err(StateSyncError::UnknownLastSummaryBlockId(core_block_id));
        };
        session.mark_resolved(outer_block_id);
        debug!(%core_block_id, %outer_block_id, "resolved last summary block");

        Ok(outer_block_id)
    }

    /// Completes state sync at the outer block encoded by `block_bytes`.
    ///
    /// The wrapped core block is handed to the core engine, then the outer block is accepted in our own index only.
    pub fn set_last_summary_block(&self, block_bytes: &[u8]) -> Result<(), StateSyncError> {
        let engine = self.syncable()?;
        let block = OuterBlock::parse(&self.engine, block_bytes)?;

        engine
            .set_last_summary_block(block.core_bytes())
            .map_err(StateSyncError::engine("set last summary block"))?;

        block
            .accept_without_core(self.translator.index())
            .map_err(|source| StateSyncError::Accept {
                id: block.id(),
                source,
            })?;
        *self.session.lock() = None;
        info!(id = %block.id(), height = block.height(), post_fork = block.is_post_fork(), "state sync completed");

        Ok(())
    }

    pub fn phase(&self) -> SyncPhase {
        match self.session.lock().as_ref() {
            Some(session) => session.phase(),
            None => SyncPhase::Idle,
        }
    }

    /// Removes and returns the current session, leaving the bridge idle.
    pub fn take_session(&self) -> Option<SyncSession> {
        self.session.lock().take()
    }
}
