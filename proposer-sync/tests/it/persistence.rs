use proposer_sync::{db::Db, fork::BlockIndex, session::SyncPhase, summary::SummaryKey};

use crate::{Harness, decode_wrapped, post_fork_block, wrapped_summary};

#[test]
fn completed_sync_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (block, core_block_id) = {
        let h = Harness::with_db(Db::new(Some(dir.path())).unwrap());
        let block = post_fork_block(&h.engine, 300, proposer_sync::crypto::Hash([4; 32]));
        let core_block_id = block.core().id;

        h.bridge
            .accept_summaries(&[wrapped_summary(300, core_block_id, block.id())])
            .unwrap();
        h.engine.choose_block(core_block_id);
        assert_eq!(h.bridge.last_summary_block_id().unwrap(), block.id());
        h.bridge.set_last_summary_block(block.bytes()).unwrap();
        (block, core_block_id)
    };

    // A fresh bridge over the reopened index serves the synced checkpoint under its outer ID.
    let h = Harness::with_db(Db::new(Some(dir.path())).unwrap());
    assert_eq!(h.bridge.phase(), SyncPhase::Idle);
    assert_eq!(h.db.fork_height().unwrap(), Some(300));
    assert_eq!(h.db.last_accepted().unwrap(), Some(block.id()));

    h.engine.add_summary(300, core_block_id);
    let wrapped = decode_wrapped(&h.bridge.summary(SummaryKey::from_height(300)).unwrap());
    assert_eq!(wrapped.outer_block_id, block.id());

    // Checkpoints from before the recorded fork keep their core IDs.
    let pre_fork = proposer_sync::crypto::Hash([7; 32]);
    h.engine.add_summary(299, pre_fork);
    let wrapped = decode_wrapped(&h.bridge.summary(SummaryKey::from_height(299)).unwrap());
    assert_eq!(wrapped.outer_block_id, pre_fork);
}
