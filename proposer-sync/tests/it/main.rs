mod concurrency;
mod fork;
mod persistence;

use std::{path::Path, sync::Arc};

use proposer_sync::{
    block::{OuterBlock, PostForkBlock, PostForkContent},
    bridge::StateSyncBridge,
    cfg::StateSyncConfig,
    codec::{Codec, STATE_SYNC_DEFAULT_VERSION, state_sync_codec},
    crypto::{Hash, NodeId},
    db::Db,
    summary::{CoreSummaryContent, Summary, WrappedSummaryContent},
    test_util::{MockEngine, core_block},
};
use rand::Rng;

type Bridge = StateSyncBridge<Arc<MockEngine>, Arc<Db>>;

/// A bridge over a scripted core engine and an outer block index, with handles to both.
struct Harness {
    engine: Arc<MockEngine>,
    db: Arc<Db>,
    bridge: Bridge,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(StateSyncConfig::default())
    }

    fn with_config(config: StateSyncConfig) -> Self {
        Self::build(config, MockEngine::new(), Db::new::<&Path>(None).unwrap(), None)
    }

    fn with_db(db: Db) -> Self {
        Self::build(StateSyncConfig::default(), MockEngine::new(), db, None)
    }

    fn with_codec(codec: Arc<Codec>) -> Self {
        Self::build(
            StateSyncConfig::default(),
            MockEngine::new(),
            Db::new::<&Path>(None).unwrap(),
            Some(codec),
        )
    }

    fn without_state_sync() -> Self {
        Self::build(
            StateSyncConfig::default(),
            MockEngine::without_state_sync(),
            Db::new::<&Path>(None).unwrap(),
            None,
        )
    }

    fn build(config: StateSyncConfig, engine: MockEngine, db: Db, codec: Option<Arc<Codec>>) -> Self {
        let engine = Arc::new(engine);
        let db = Arc::new(db);
        let bridge = match codec {
            Some(codec) => StateSyncBridge::with_codec(config, engine.clone(), db.clone(), codec),
            None => StateSyncBridge::new(config, engine.clone(), db.clone()),
        };
        Harness { engine, db, bridge }
    }

    /// Accepts a post-fork block at `height` into the outer index, as normal consensus would. The first one accepted
    /// sets the fork height.
    fn accept_post_fork(&self, height: u64) -> PostForkBlock {
        let block = post_fork_block(&self.engine, height, Hash::ZERO);
        OuterBlock::PostFork(block.clone())
            .accept_without_core(&*self.db)
            .unwrap();
        block
    }
}

fn wrapped_summary(height: u64, core_block_id: Hash, outer_block_id: Hash) -> Summary {
    Summary(
        state_sync_codec()
            .encode(
                STATE_SYNC_DEFAULT_VERSION,
                &WrappedSummaryContent {
                    outer_block_id,
                    core: CoreSummaryContent {
                        height,
                        block_id: core_block_id,
                    },
                },
            )
            .unwrap(),
    )
}

fn decode_wrapped(summary: &Summary) -> WrappedSummaryContent {
    let (version, content) = state_sync_codec()
        .decode::<WrappedSummaryContent>(summary.as_bytes())
        .unwrap();
    assert_eq!(version, STATE_SYNC_DEFAULT_VERSION);
    content
}

fn post_fork_block(engine: &MockEngine, height: u64, parent_id: Hash) -> PostForkBlock {
    let (core, _) = core_block(height, parent_id);
    PostForkBlock::build(
        engine,
        PostForkContent {
            parent_id,
            timestamp: 1_700_000_000 + height,
            proposer: Some(NodeId([1; 20])),
            core,
        },
    )
    .unwrap()
}

fn random_hash(rng: &mut impl Rng) -> Hash {
    Hash(rng.r#gen())
}
