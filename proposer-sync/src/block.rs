//! The two encodings of outer blocks.
//!
//! Before the fork, an outer block *is* a core block: same bytes, same identifier. After the fork, an outer block wraps
//! the core block bytes together with the proposer metadata and is identified by the hash of its own encoding.
//!
//! Nothing in the encoding says which of the two a given byte string is. Parsing tries the post-fork encoding first
//! and falls back to the pre-fork one, which is what peers on the network expect.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    codec::{Codec, TypeRegistry},
    crypto::{Hash, NodeId},
    engine::{ChainEngine, CoreBlock},
    error::StateSyncError,
    fork::BlockIndex,
};

pub const BLOCK_CODEC_VERSION: u16 = 0;

static BLOCK_CODEC: Lazy<Codec> = Lazy::new(|| {
    let mut codec = Codec::new();
    let mut types = TypeRegistry::new();
    if let Err(e) = types
        .register_type::<PostForkContent>()
        .and_then(|()| codec.register_version(BLOCK_CODEC_VERSION, types))
    {
        panic!("failed to register block codec: {e}");
    }
    codec
});

/// Write access to the outer engine's persistent block index.
pub trait BlockWriter: BlockIndex {
    /// Stores an accepted post-fork block and indexes it by height.
    fn put_block(&self, id: Hash, height: u64, bytes: &[u8]) -> Result<()>;

    fn set_last_accepted(&self, id: Hash) -> Result<()>;

    fn set_fork_height(&self, height: u64) -> Result<()>;
}

impl<T: BlockWriter + ?Sized> BlockWriter for Arc<T> {
    fn put_block(&self, id: Hash, height: u64, bytes: &[u8]) -> Result<()> {
        (**self).put_block(id, height, bytes)
    }

    fn set_last_accepted(&self, id: Hash) -> Result<()> {
        (**self).set_last_accepted(id)
    }

    fn set_fork_height(&self, height: u64) -> Result<()> {
        (**self).set_fork_height(height)
    }
}

/// The encoded fields of a post-fork block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostForkContent {
    pub parent_id: Hash,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// `None` for blocks which any node was allowed to propose.
    pub proposer: Option<NodeId>,
    #[serde(with = "serde_bytes")]
    pub core: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostForkBlock {
    id: Hash,
    bytes: Vec<u8>,
    content: PostForkContent,
    core: CoreBlock,
}

impl PostForkBlock {
    /// Encodes `content` into a new block. The wrapped core block must be parseable by `engine`.
    pub fn build(engine: &(impl ChainEngine + ?Sized), content: PostForkContent) -> Result<Self> {
        let bytes = BLOCK_CODEC.encode(BLOCK_CODEC_VERSION, &content)?;
        let core = engine.parse_block(&content.core)?;
        Ok(PostForkBlock {
            id: Hash::compute([&bytes]),
            bytes,
            content,
            core,
        })
    }

    pub fn parse(engine: &(impl ChainEngine + ?Sized), bytes: &[u8]) -> Result<Self> {
        let (version, content) = BLOCK_CODEC.decode::<PostForkContent>(bytes)?;
        if version != BLOCK_CODEC_VERSION {
            return Err(anyhow!("unsupported block version {version}"));
        }
        let core = engine.parse_block(&content.core)?;
        Ok(PostForkBlock {
            id: Hash::compute([bytes]),
            bytes: bytes.to_vec(),
            content,
            core,
        })
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn parent_id(&self) -> Hash {
        self.content.parent_id
    }

    pub fn timestamp(&self) -> u64 {
        self.content.timestamp
    }

    pub fn proposer(&self) -> Option<NodeId> {
        self.content.proposer
    }

    pub fn core(&self) -> &CoreBlock {
        &self.core
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreForkBlock {
    bytes: Vec<u8>,
    core: CoreBlock,
}

impl PreForkBlock {
    pub fn parse(engine: &(impl ChainEngine + ?Sized), bytes: &[u8]) -> Result<Self> {
        let core = engine.parse_block(bytes)?;
        Ok(PreForkBlock {
            bytes: bytes.to_vec(),
            core,
        })
    }

    pub fn core(&self) -> &CoreBlock {
        &self.core
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OuterBlock {
    PreFork(PreForkBlock),
    PostFork(PostForkBlock),
}

impl OuterBlock {
    /// Parses `bytes` as a post-fork block, or as a pre-fork block if that fails.
    pub fn parse(
        engine: &(impl ChainEngine + ?Sized),
        bytes: &[u8],
    ) -> Result<Self, StateSyncError> {
        let post_fork_err = match PostForkBlock::parse(engine, bytes) {
            Ok(block) => return Ok(OuterBlock::PostFork(block)),
            Err(e) => e,
        };
        match PreForkBlock::parse(engine, bytes) {
            Ok(block) => Ok(OuterBlock::PreFork(block)),
            Err(pre_fork_err) => {
                debug!(%post_fork_err, %pre_fork_err, "block is neither post-fork nor pre-fork");
                Err(StateSyncError::BadLastSummaryBlock)
            }
        }
    }

    pub fn id(&self) -> Hash {
        match self {
            OuterBlock::PreFork(block) => block.core.id,
            OuterBlock::PostFork(block) => block.id,
        }
    }

    pub fn height(&self) -> u64 {
        self.core().height
    }

    pub fn core(&self) -> &CoreBlock {
        match self {
            OuterBlock::PreFork(block) => &block.core,
            OuterBlock::PostFork(block) => &block.core,
        }
    }

    /// The bytes of the wrapped core block. For pre-fork blocks these are the block's own bytes.
    pub fn core_bytes(&self) -> &[u8] {
        match self {
            OuterBlock::PreFork(block) => &block.bytes,
            OuterBlock::PostFork(block) => &block.content.core,
        }
    }

    pub fn is_post_fork(&self) -> bool {
        matches!(self, OuterBlock::PostFork(_))
    }

    /// Marks this block as accepted in the outer index, without accepting the wrapped core block in the core engine.
    ///
    /// Used at the end of state sync: the core engine has already been moved to this block's state, so accepting the
    /// core block as well would apply its state transition a second time.
    pub fn accept_without_core(&self, writer: &(impl BlockWriter + ?Sized)) -> Result<()> {
        if let OuterBlock::PostFork(block) = self {
            if writer.fork_height()?.is_none() {
                info!(height = self.height(), "first post-fork block accepted, recording fork height");
                writer.set_fork_height(self.height())?;
            }
            writer.put_block(block.id, self.height(), &block.bytes)?;
            debug!(
                parent_id = %block.parent_id(),
                timestamp = block.timestamp(),
                proposer = ?block.proposer(),
                "indexed post-fork block"
            );
        }
        writer.set_last_accepted(self.id())?;
        debug!(id = %self.id(), height = self.height(), post_fork = self.is_post_fork(), "accepted outer block");
        Ok(())
    }
}
