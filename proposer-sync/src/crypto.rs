//! Identifiers and digests used by the state sync bridge.
//!
//! The exact implementations of these primitives is an implementation detail for this module only and dependents
//! should not care about the implementations.

use std::{fmt::Display, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize, de};
use sha3::{Digest, Keccak256};

/// A 32-byte identifier. Used for both core and outer block identifiers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0; 32]);

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Hash(bytes.as_ref().try_into().map_err(|_| {
            anyhow!("expected 32 bytes, got {}", bytes.as_ref().len())
        })?))
    }

    pub fn compute<T: AsRef<[S]>, S: AsRef<[u8]>>(preimages: T) -> Hash {
        let mut hasher = Keccak256::new();
        for preimage in preimages.as_ref() {
            hasher.update(preimage.as_ref());
        }
        Self(hasher.finalize().into())
    }
}

impl FromStr for Hash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_bytes(hex::decode(s.trim_start_matches("0x"))?)
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

/// Identifies a node on the network, e.g. a proposer or a trusted state syncer.
///
/// Encoded as 20 raw bytes on the wire and as a hex string in configuration files.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        Ok(NodeId(bytes.as_slice().try_into().map_err(|_| {
            anyhow!("node ID must be 20 bytes, got {}", bytes.len())
        })?))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            hex::encode(self.0).serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let s = <String>::deserialize(deserializer)?;
            s.parse().map_err(|_| {
                de::Error::invalid_value(de::Unexpected::Str(&s), &"a 20-byte hex value")
            })
        } else {
            Ok(NodeId(<[u8; 20]>::deserialize(deserializer)?))
        }
    }
}
