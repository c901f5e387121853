use std::{path::Path, sync::mpsc, thread, time::Duration};

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use proposer_sync::{
    bridge::StateSyncBridge,
    cfg::StateSyncConfig,
    codec::state_sync_codec,
    crypto::{Hash, NodeId},
    db::Db,
    engine::{ChainEngine, CoreBlock, StateSyncableEngine},
    summary::{CoreSummaryContent, Summary, SummaryKey},
};

use crate::wrapped_summary;

/// A core engine which stalls while accepting the batch containing `slow_block`, then targets the first summary of
/// whichever batch it accepted last.
struct SlowEngine {
    slow_block: Hash,
    started: mpsc::Sender<()>,
    target: Mutex<Option<Hash>>,
}

impl ChainEngine for SlowEngine {
    fn parse_block(&self, _: &[u8]) -> Result<CoreBlock> {
        Err(anyhow!("no blocks"))
    }

    fn state_syncable(&self) -> Option<&dyn StateSyncableEngine> {
        Some(self as &dyn StateSyncableEngine)
    }
}

impl StateSyncableEngine for SlowEngine {
    fn register_state_syncers(&self, _: &[NodeId]) -> Result<()> {
        Ok(())
    }

    fn state_sync_enabled(&self) -> Result<bool> {
        Ok(true)
    }

    fn last_summary(&self) -> Result<Summary> {
        Err(anyhow!("no summaries"))
    }

    fn summary(&self, _: SummaryKey) -> Result<Summary> {
        Err(anyhow!("no summaries"))
    }

    fn accept_summaries(&self, summaries: &[Summary]) -> Result<()> {
        let first = summaries.first().ok_or_else(|| anyhow!("empty batch"))?;
        let (_, content) = state_sync_codec().decode::<CoreSummaryContent>(first.as_bytes())?;
        if content.block_id == self.slow_block {
            self.started.send(())?;
            thread::sleep(Duration::from_millis(100));
        }
        *self.target.lock() = Some(content.block_id);
        Ok(())
    }

    fn last_summary_block_id(&self) -> Result<Hash> {
        self.target.lock().ok_or_else(|| anyhow!("no sync target chosen"))
    }

    fn set_last_summary_block(&self, _: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[test]
fn overlapping_batches_keep_session_of_last_accepted() {
    let (first_core, first_outer) = (Hash([0x0a; 32]), Hash([0x0b; 32]));
    let (second_core, second_outer) = (Hash([0x0c; 32]), Hash([0x0d; 32]));
    let (tx, rx) = mpsc::channel();
    let bridge = StateSyncBridge::new(
        StateSyncConfig::default(),
        SlowEngine {
            slow_block: first_core,
            started: tx,
            target: Mutex::new(None),
        },
        Db::new::<&Path>(None).unwrap(),
    );

    thread::scope(|s| {
        let first = s.spawn(|| bridge.accept_summaries(&[wrapped_summary(1, first_core, first_outer)]));
        rx.recv().unwrap();
        // The first batch is still inside the core engine.
        let second = s.spawn(|| bridge.accept_summaries(&[wrapped_summary(2, second_core, second_outer)]));
        first.join().unwrap().unwrap();
        second.join().unwrap().unwrap();
    });

    assert_eq!(bridge.last_summary_block_id().unwrap(), second_outer);
}
