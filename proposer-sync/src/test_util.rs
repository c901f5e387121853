//! A scripted core engine which records every state sync call made to it.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;

use crate::{
    codec::{STATE_SYNC_DEFAULT_VERSION, state_sync_codec},
    crypto::{Hash, NodeId},
    engine::{ChainEngine, CoreBlock, StateSyncableEngine},
    summary::{CoreSummaryContent, Summary, SummaryKey},
};

const CORE_BLOCK_MAGIC: &[u8; 4] = b"CORE";
const CORE_BLOCK_LEN: usize = 4 + 8 + 32;

/// Encodes a core block as understood by [MockEngine]: a magic prefix, the height and the parent ID. The block ID is
/// the hash of those bytes.
pub fn core_block(height: u64, parent_id: Hash) -> (Vec<u8>, CoreBlock) {
    let mut bytes = CORE_BLOCK_MAGIC.to_vec();
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(parent_id.as_bytes());
    let id = Hash::compute([&bytes]);
    (
        bytes,
        CoreBlock {
            id,
            height,
            parent_id,
        },
    )
}

pub fn core_summary_content(height: u64, block_id: Hash) -> CoreSummaryContent {
    CoreSummaryContent { height, block_id }
}

/// Encodes a core summary with the default codec.
pub fn core_summary(height: u64, block_id: Hash) -> Summary {
    Summary(
        state_sync_codec()
            .encode(
                STATE_SYNC_DEFAULT_VERSION,
                &core_summary_content(height, block_id),
            )
            .unwrap(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    RegisterStateSyncers(Vec<NodeId>),
    StateSyncEnabled,
    LastSummary,
    Summary(SummaryKey),
    AcceptSummaries(Vec<Summary>),
    LastSummaryBlockId,
    SetLastSummaryBlock(Vec<u8>),
}

#[derive(Debug)]
struct MockState {
    enabled: bool,
    summaries: BTreeMap<u64, Summary>,
    last_summary_block_id: Option<Hash>,
    fail_accept_summaries: bool,
    fail_set_last_summary_block: bool,
    calls: Vec<EngineCall>,
}

#[derive(Debug)]
pub struct MockEngine {
    syncable: bool,
    state: Mutex<MockState>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// An engine which supports state sync and has it enabled.
    pub fn new() -> Self {
        MockEngine {
            syncable: true,
            state: Mutex::new(MockState {
                enabled: true,
                summaries: BTreeMap::new(),
                last_summary_block_id: None,
                fail_accept_summaries: false,
                fail_set_last_summary_block: false,
                calls: vec![],
            }),
        }
    }

    /// An engine which can parse blocks but does not support state sync.
    pub fn without_state_sync() -> Self {
        MockEngine {
            syncable: false,
            ..Self::new()
        }
    }

    /// Makes a summary available. The highest one is reported as the last summary.
    pub fn add_summary(&self, height: u64, block_id: Hash) -> Summary {
        let summary = core_summary(height, block_id);
        self.state.lock().summaries.insert(height, summary.clone());
        summary
    }

    /// Stores raw bytes as the summary at `height`, for exercising decoding failures.
    pub fn add_raw_summary(&self, height: u64, summary: Summary) {
        self.state.lock().summaries.insert(height, summary);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    /// Sets the core block the engine reports as its chosen sync target.
    pub fn choose_block(&self, block_id: Hash) {
        self.state.lock().last_summary_block_id = Some(block_id);
    }

    /// Makes the engine reject every later batch of accepted summaries.
    pub fn fail_accept_summaries(&self) {
        self.state.lock().fail_accept_summaries = true;
    }

    pub fn fail_set_last_summary_block(&self) {
        self.state.lock().fail_set_last_summary_block = true;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn accepted_batches(&self) -> Vec<Vec<Summary>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::AcceptSummaries(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }

    /// The block bytes the engine was asked to finish syncing to, if any.
    pub fn synced_block(&self) -> Option<Vec<u8>> {
        self.calls().into_iter().rev().find_map(|call| match call {
            EngineCall::SetLastSummaryBlock(bytes) => Some(bytes),
            _ => None,
        })
    }

    pub fn registered_syncers(&self) -> Option<Vec<NodeId>> {
        self.calls().into_iter().rev().find_map(|call| match call {
            EngineCall::RegisterStateSyncers(syncers) => Some(syncers),
            _ => None,
        })
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().calls.push(call);
    }
}

impl ChainEngine for MockEngine {
    fn parse_block(&self, bytes: &[u8]) -> Result<CoreBlock> {
        if bytes.len() != CORE_BLOCK_LEN || !bytes.starts_with(CORE_BLOCK_MAGIC) {
            return Err(anyhow!("not a core block"));
        }
        let height = u64::from_be_bytes(bytes[4..12].try_into()?);
        let parent_id = Hash::from_bytes(&bytes[12..])?;
        Ok(core_block(height, parent_id).1)
    }

    fn state_syncable(&self) -> Option<&dyn StateSyncableEngine> {
        self.syncable.then_some(self as &dyn StateSyncableEngine)
    }
}

impl StateSyncableEngine for MockEngine {
    fn register_state_syncers(&self, syncers: &[NodeId]) -> Result<()> {
        self.record(EngineCall::RegisterStateSyncers(syncers.to_vec()));
        Ok(())
    }

    fn state_sync_enabled(&self) -> Result<bool> {
        self.record(EngineCall::StateSyncEnabled);
        Ok(self.state.lock().enabled)
    }

    fn last_summary(&self) -> Result<Summary> {
        self.record(EngineCall::LastSummary);
        self.state
            .lock()
            .summaries
            .last_key_value()
            .map(|(_, summary)| summary.clone())
            .ok_or_else(|| anyhow!("no summaries"))
    }

    fn summary(&self, key: SummaryKey) -> Result<Summary> {
        self.record(EngineCall::Summary(key));
        self.state
            .lock()
            .summaries
            .get(&key.height())
            .cloned()
            .ok_or_else(|| anyhow!("no summary at height {}", key.height()))
    }

    fn accept_summaries(&self, summaries: &[Summary]) -> Result<()> {
        self.record(EngineCall::AcceptSummaries(summaries.to_vec()));
        if self.state.lock().fail_accept_summaries {
            return Err(anyhow!("no peers to sync from"));
        }
        Ok(())
    }

    fn last_summary_block_id(&self) -> Result<Hash> {
        self.record(EngineCall::LastSummaryBlockId);
        self.state
            .lock()
            .last_summary_block_id
            .ok_or_else(|| anyhow!("no sync target chosen"))
    }

    fn set_last_summary_block(&self, block_bytes: &[u8]) -> Result<()> {
        self.record(EngineCall::SetLastSummaryBlock(block_bytes.to_vec()));
        self.parse_block(block_bytes)?;
        if self.state.lock().fail_set_last_summary_block {
            return Err(anyhow!("state sync aborted"));
        }
        Ok(())
    }
}
