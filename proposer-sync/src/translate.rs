//! Conversion between core summaries and the wrapped summaries we exchange with peers.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    codec::{Codec, STATE_SYNC_DEFAULT_VERSION, split_version, state_sync_codec},
    error::StateSyncError,
    fork::{BlockIndex, resolve_outer_id},
    summary::{CoreSummaryContent, Summary, SummaryHash, SummaryKey, WrappedSummaryContent},
};

pub struct SummaryTranslator<I> {
    codec: Arc<Codec>,
    index: I,
}

impl<I: BlockIndex> SummaryTranslator<I> {
    pub fn new(index: I) -> Self {
        Self::with_codec(index, state_sync_codec())
    }

    pub fn with_codec(index: I, codec: Arc<Codec>) -> Self {
        SummaryTranslator { codec, index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Wraps a core summary, adding the identifier of the outer block at the summary's height.
    pub fn wrap(&self, core_summary: &Summary) -> Result<Summary, StateSyncError> {
        let content = self.wrap_content(core_summary)?;
        self.encode(&content, "encode wrapped summary").map(Summary)
    }

    /// Decodes a core summary and builds the wrapped content for it, without encoding.
    pub fn wrap_content(
        &self,
        core_summary: &Summary,
    ) -> Result<WrappedSummaryContent, StateSyncError> {
        let core: CoreSummaryContent = self.decode(core_summary.as_bytes(), "decode core summary")?;
        let outer_block_id = resolve_outer_id(&self.index, core.height, core.block_id)?;
        debug!(height = core.height, core_block_id = %core.block_id, %outer_block_id, "wrapped core summary");

        Ok(WrappedSummaryContent {
            outer_block_id,
            core,
        })
    }

    /// Strips the outer identifier from a wrapped summary, returning the core summary.
    pub fn unwrap(&self, summary: &Summary) -> Result<Summary, StateSyncError> {
        self.unwrap_with_content(summary).map(|(_, core)| core)
    }

    /// Like [Self::unwrap], but also returns the decoded wrapped content.
    pub fn unwrap_with_content(
        &self,
        summary: &Summary,
    ) -> Result<(WrappedSummaryContent, Summary), StateSyncError> {
        let content = self.decode_wrapped(summary)?;
        let core = self.encode(&content.core, "encode core summary")?;
        Ok((content, Summary(core)))
    }

    pub fn decode_wrapped(
        &self,
        summary: &Summary,
    ) -> Result<WrappedSummaryContent, StateSyncError> {
        self.decode(summary.as_bytes(), "decode wrapped summary")
    }

    /// Returns the lookup key and the hash of a wrapped summary.
    ///
    /// The hash covers the summary bytes exactly as given, so two different encodings of the same content produce
    /// different hashes.
    pub fn key_and_hash(
        &self,
        summary: &Summary,
    ) -> Result<(SummaryKey, SummaryHash), StateSyncError> {
        let content = self.decode_wrapped(summary)?;
        Ok((
            SummaryKey::from_height(content.core.height),
            SummaryHash::compute(summary),
        ))
    }

    fn encode<T: Serialize + 'static>(
        &self,
        value: &T,
        step: &'static str,
    ) -> Result<Vec<u8>, StateSyncError> {
        self.codec
            .encode(STATE_SYNC_DEFAULT_VERSION, value)
            .map_err(StateSyncError::codec(step))
    }

    /// Decodes content encoded with [STATE_SYNC_DEFAULT_VERSION]. The version tag is checked before the body is
    /// decoded, so content from any other version is a [StateSyncError::VersionMismatch] whether or not our codec
    /// knows that version.
    fn decode<T: DeserializeOwned + 'static>(
        &self,
        bytes: &[u8],
        step: &'static str,
    ) -> Result<T, StateSyncError> {
        let (version, _) = split_version(bytes).map_err(StateSyncError::codec(step))?;
        if version != STATE_SYNC_DEFAULT_VERSION {
            return Err(StateSyncError::VersionMismatch {
                expected: STATE_SYNC_DEFAULT_VERSION,
                found: version,
            });
        }
        let (_, value) = self
            .codec
            .decode(bytes)
            .map_err(StateSyncError::codec(step))?;
        Ok(value)
    }
}
