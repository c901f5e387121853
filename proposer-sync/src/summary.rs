//! State summary types exchanged during state sync.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::Hash;

/// A checkpoint described purely in terms of the core engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSummaryContent {
    pub height: u64,
    pub block_id: Hash,
}

/// A core checkpoint together with the identifier of the outer block which wraps the core block at that height. This
/// is the content of the summaries we exchange with peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedSummaryContent {
    pub outer_block_id: Hash,
    pub core: CoreSummaryContent,
}

/// An encoded state summary. Opaque to everything except the summary translator.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl Summary {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Summary {
    fn from(bytes: Vec<u8>) -> Self {
        Summary(bytes)
    }
}

impl AsRef<[u8]> for Summary {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Summary({})", hex::encode(&self.0))
    }
}

/// Lookup handle for a summary: the big-endian summary height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SummaryKey(pub [u8; 8]);

impl SummaryKey {
    pub fn from_height(height: u64) -> Self {
        SummaryKey(height.to_be_bytes())
    }

    pub fn height(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for SummaryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.height())
    }
}

/// SHA-256 of the raw bytes of a [Summary].
///
/// The hash is taken over the bytes exactly as a peer sent them, not over a re-encoding of the decoded content. Two
/// encodings of the same content therefore hash differently.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryHash(pub [u8; 32]);

impl SummaryHash {
    pub fn compute(bytes: impl AsRef<[u8]>) -> Self {
        SummaryHash(Sha256::digest(bytes.as_ref()).into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for SummaryHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SummaryHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
