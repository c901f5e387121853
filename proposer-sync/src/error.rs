use crate::{codec::CodecError, crypto::Hash};

/// An error from one of the state sync bridge operations.
///
/// Nothing here is retried. Each failure names the step it came from and is returned to the caller, which decides
/// whether to abandon and restart the sync round.
#[derive(thiserror::Error, Debug)]
pub enum StateSyncError {
    /// The core engine does not support state sync.
    #[error("state sync is not implemented by the core engine")]
    NotImplemented,
    #[error("wrong state sync version: expected {expected}, found {found}")]
    VersionMismatch { expected: u16, found: u16 },
    #[error("failed to {step}")]
    Codec {
        step: &'static str,
        #[source]
        source: CodecError,
    },
    /// The index has no outer block at a height above the fork, where it should have every block.
    #[error("no outer block indexed at height {height}, which is above the fork height {fork_height}")]
    BlockNotIndexed { height: u64, fork_height: u64 },
    #[error("outer block index failed to {step}")]
    Index {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("core engine failed to {step}")]
    Engine {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
    /// The core engine picked a block which was not in the batch of summaries it was given.
    #[error("could not retrieve the outer block ID associated with last summary block {0}")]
    UnknownLastSummaryBlockId(Hash),
    #[error("could not parse last summary block")]
    BadLastSummaryBlock,
    #[error("failed to accept last summary block {id}")]
    Accept {
        id: Hash,
        #[source]
        source: anyhow::Error,
    },
    #[error("batch of {count} accepted summaries exceeds the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },
}

impl StateSyncError {
    pub(crate) fn engine(step: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| StateSyncError::Engine { step, source }
    }

    pub(crate) fn index(step: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| StateSyncError::Index { step, source }
    }

    pub(crate) fn codec(step: &'static str) -> impl FnOnce(CodecError) -> Self {
        move |source| StateSyncError::Codec { step, source }
    }
}
