use proposer_sync::{
    codec::{STATE_SYNC_DEFAULT_VERSION, state_sync_codec},
    fork::{BlockIndex, resolve_outer_id},
    summary::{CoreSummaryContent, Summary, SummaryKey},
    translate::SummaryTranslator,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::{Harness, decode_wrapped, random_hash};

#[proposer_sync_macros::test(samples = 16)]
fn fork_boundary_is_monotonic(mut rng: ChaCha8Rng) {
    let h = Harness::new();
    let fork_height = rng.gen_range(1..1_000);
    let post_fork_blocks: Vec<_> = (fork_height..fork_height + 20)
        .map(|height| h.accept_post_fork(height))
        .collect();
    assert_eq!(h.db.fork_height().unwrap(), Some(fork_height));

    for _ in 0..20 {
        let height = rng.gen_range(0..=fork_height);
        let x = random_hash(&mut rng);
        if height == fork_height {
            // The first post-fork block is indexed at the fork height itself.
            assert_eq!(
                resolve_outer_id(&*h.db, height, x).unwrap(),
                post_fork_blocks[0].id()
            );
        } else {
            assert_eq!(resolve_outer_id(&*h.db, height, x).unwrap(), x);
        }
    }

    for block in &post_fork_blocks {
        let x = random_hash(&mut rng);
        let height = block.core().height;
        assert_eq!(resolve_outer_id(&*h.db, height, x).unwrap(), block.id());

        h.engine.add_summary(height, x);
        let wrapped = decode_wrapped(&h.bridge.summary(SummaryKey::from_height(height)).unwrap());
        assert_eq!(wrapped.outer_block_id, block.id());
        assert_eq!(wrapped.core.block_id, x);
    }
}

#[proposer_sync_macros::test(samples = 16)]
fn core_summaries_survive_wrapping(mut rng: ChaCha8Rng) {
    let h = Harness::new();
    let translator = SummaryTranslator::new(h.db.clone());

    for _ in 0..20 {
        let content = CoreSummaryContent {
            height: rng.gen_range(0..i64::MAX as u64),
            block_id: random_hash(&mut rng),
        };
        let core = Summary(
            state_sync_codec()
                .encode(STATE_SYNC_DEFAULT_VERSION, &content)
                .unwrap(),
        );

        let wrapped = translator.wrap(&core).unwrap();
        assert_eq!(translator.unwrap(&wrapped).unwrap(), core);
        assert_eq!(
            translator.key_and_hash(&wrapped).unwrap().0,
            SummaryKey::from_height(content.height)
        );
    }
}
