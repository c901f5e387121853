//! Resolution of outer block identifiers across the fork.
//!
//! Below the fork height the outer engine did not exist yet, so the outer identifier of a block is the core identifier
//! by convention. From the fork onwards every accepted outer block is indexed by height.

use std::sync::Arc;

use anyhow::Result;
use tracing::trace;

use crate::{crypto::Hash, error::StateSyncError};

/// Read access to the outer engine's persistent block index.
pub trait BlockIndex {
    /// The identifier of the accepted outer block at `height`, or `None` if no block is indexed there.
    fn block_id_at_height(&self, height: u64) -> Result<Option<Hash>>;

    /// The height of the first post-fork block, or `None` if the fork has not activated yet.
    fn fork_height(&self) -> Result<Option<u64>>;
}

impl<T: BlockIndex + ?Sized> BlockIndex for Arc<T> {
    fn block_id_at_height(&self, height: u64) -> Result<Option<Hash>> {
        (**self).block_id_at_height(height)
    }

    fn fork_height(&self) -> Result<Option<u64>> {
        (**self).fork_height()
    }
}

impl<T: BlockIndex + ?Sized> BlockIndex for &T {
    fn block_id_at_height(&self, height: u64) -> Result<Option<Hash>> {
        (**self).block_id_at_height(height)
    }

    fn fork_height(&self) -> Result<Option<u64>> {
        (**self).fork_height()
    }
}

/// Returns the identifier of the outer block wrapping the core block `core_block_id` at `height`.
///
/// Any index failure other than a missing entry is returned as-is; the core identifier fallback only applies to heights
/// at or below the fork.
pub fn resolve_outer_id(
    index: &(impl BlockIndex + ?Sized),
    height: u64,
    core_block_id: Hash,
) -> Result<Hash, StateSyncError> {
    if let Some(outer_block_id) = index
        .block_id_at_height(height)
        .map_err(StateSyncError::index("look up outer block by height"))?
    {
        return Ok(outer_block_id);
    }

    match index
        .fork_height()
        .map_err(StateSyncError::index("read fork height"))?
    {
        Some(fork_height) if height > fork_height => {
            Err(StateSyncError::BlockNotIndexed { height, fork_height })
        }
        fork_height => {
            trace!(height, ?fork_height, %core_block_id, "pre-fork height, outer ID is the core ID");
            Ok(core_block_id)
        }
    }
}
