//! Versioned binary encoding for state sync content.
//!
//! Every encoding produced by a [Codec] is a big-endian `u16` version tag followed by a bincode body (big-endian,
//! fixed-width integers). A codec only encodes and decodes types which were registered under the version in question,
//! so the set of types which can appear on the wire is fixed at startup.
//!
//! Decoding returns the version alongside the value. Callers must compare it against the version they expect before
//! trusting the content.

use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    sync::Arc,
};

use bincode::config::{BigEndian, Configuration, Fixint, Limit};
use once_cell::sync::Lazy;
use serde::{Serialize, de::DeserializeOwned};

use crate::summary::{CoreSummaryContent, Summary, SummaryHash, WrappedSummaryContent};

/// The version every state summary is encoded with.
pub const STATE_SYNC_DEFAULT_VERSION: u16 = 0;

const VERSION_LEN: usize = std::mem::size_of::<u16>();

/// Bodies are capped at 1 MiB, well above any summary or block we expect to handle.
const MAX_BODY_LEN: usize = 1024 * 1024;

const BIN_CONFIG: Configuration<BigEndian, Fixint, Limit<MAX_BODY_LEN>> = bincode::config::standard()
    .with_big_endian()
    .with_fixed_int_encoding()
    .with_limit::<MAX_BODY_LEN>();

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("input of {0} bytes is too short to contain a version tag")]
    Truncated(usize),
    #[error("codec version {0} is not registered")]
    UnregisteredVersion(u16),
    #[error("type {type_name} is not registered under codec version {version}")]
    UnregisteredType {
        version: u16,
        type_name: &'static str,
    },
    #[error("type {0} is already registered")]
    DuplicateType(&'static str),
    #[error("codec version {0} is already registered")]
    DuplicateVersion(u16),
    #[error("{0} unexpected trailing bytes after decoded value")]
    TrailingBytes(usize),
    #[error("failed to encode value")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode value")]
    Decode(#[from] bincode::error::DecodeError),
}

/// The set of types which may be encoded under a single codec version.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<TypeId, &'static str>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type<T: 'static>(&mut self) -> Result<(), CodecError> {
        if self
            .types
            .insert(TypeId::of::<T>(), type_name::<T>())
            .is_some()
        {
            return Err(CodecError::DuplicateType(type_name::<T>()));
        }
        Ok(())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }
}

/// A table of codec versions, each bound to a [TypeRegistry].
#[derive(Debug, Default)]
pub struct Codec {
    versions: HashMap<u16, TypeRegistry>,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_version(&mut self, version: u16, types: TypeRegistry) -> Result<(), CodecError> {
        if self.versions.contains_key(&version) {
            return Err(CodecError::DuplicateVersion(version));
        }
        self.versions.insert(version, types);
        Ok(())
    }

    pub fn is_registered(&self, version: u16) -> bool {
        self.versions.contains_key(&version)
    }

    pub fn encode<T: Serialize + 'static>(
        &self,
        version: u16,
        value: &T,
    ) -> Result<Vec<u8>, CodecError> {
        self.check_registered::<T>(version)?;

        let mut bytes = version.to_be_bytes().to_vec();
        bytes.extend(bincode::serde::encode_to_vec(value, BIN_CONFIG)?);
        Ok(bytes)
    }

    /// Decodes `bytes` as a `T`, returning the version it was encoded with.
    pub fn decode<T: DeserializeOwned + 'static>(
        &self,
        bytes: &[u8],
    ) -> Result<(u16, T), CodecError> {
        let (version, body) = split_version(bytes)?;
        self.check_registered::<T>(version)?;

        let (value, read) = bincode::serde::decode_from_slice::<T, _>(body, BIN_CONFIG)?;
        if read != body.len() {
            return Err(CodecError::TrailingBytes(body.len() - read));
        }
        Ok((version, value))
    }

    fn check_registered<T: 'static>(&self, version: u16) -> Result<(), CodecError> {
        let types = self
            .versions
            .get(&version)
            .ok_or(CodecError::UnregisteredVersion(version))?;
        if !types.contains::<T>() {
            return Err(CodecError::UnregisteredType {
                version,
                type_name: type_name::<T>(),
            });
        }
        Ok(())
    }
}

/// Reads the version tag from the front of an encoding without decoding the body.
pub fn split_version(bytes: &[u8]) -> Result<(u16, &[u8]), CodecError> {
    if bytes.len() < VERSION_LEN {
        return Err(CodecError::Truncated(bytes.len()));
    }
    let (version, body) = bytes.split_at(VERSION_LEN);
    let version = u16::from_be_bytes([version[0], version[1]]);
    Ok((version, body))
}

/// The types which make up the state sync wire format.
pub fn state_sync_types() -> Result<TypeRegistry, CodecError> {
    let mut types = TypeRegistry::new();
    types.register_type::<Summary>()?;
    types.register_type::<SummaryHash>()?;
    types.register_type::<CoreSummaryContent>()?;
    types.register_type::<WrappedSummaryContent>()?;
    Ok(types)
}

static STATE_SYNC_CODEC: Lazy<Arc<Codec>> = Lazy::new(|| {
    let mut codec = Codec::new();
    // Nothing can be exchanged with peers without this codec, so failing to build it is fatal.
    if let Err(e) = state_sync_types()
        .and_then(|types| codec.register_version(STATE_SYNC_DEFAULT_VERSION, types))
    {
        panic!("failed to register state sync codec: {e}");
    }
    Arc::new(codec)
});

/// The process-wide state sync codec, with [state_sync_types] registered under [STATE_SYNC_DEFAULT_VERSION].
pub fn state_sync_codec() -> Arc<Codec> {
    STATE_SYNC_CODEC.clone()
}
