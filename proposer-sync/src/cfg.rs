use std::{fs, path::Path};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::crypto::NodeId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The location of the outer block index. If not provided, the index is kept in memory and lost on restart.
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub state_sync: StateSyncConfig,
}

impl Config {
    /// Reads and merges the given TOML files. A top-level key may only appear in one of the files.
    pub fn load<P: AsRef<Path>>(config_files: &[P]) -> Result<Self> {
        let mut merged_config = toml::Table::new();
        for config_file in config_files {
            let config_file = config_file.as_ref();
            let config = fs::read_to_string(config_file)?;
            let config: toml::Table = toml::from_str(&config)?;
            for key in config.keys() {
                if merged_config.contains_key(key) {
                    return Err(anyhow!(
                        "configuration conflict: {config_file:?} contained a key {key:?} that was already included in an earlier file"
                    ));
                }
            }
            merged_config.extend(config);
        }

        let config: Config = Deserialize::deserialize(merged_config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.state_sync.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateSyncConfig {
    /// When false, this node reports state sync as disabled without asking the core engine.
    #[serde(default = "state_sync_enabled_default")]
    pub enabled: bool,
    /// The largest batch of accepted summaries we will forward to the core engine.
    #[serde(default = "max_accepted_summaries_default")]
    pub max_accepted_summaries: usize,
    /// Nodes trusted to serve state, as hex-encoded node IDs.
    #[serde(default)]
    pub state_syncers: Vec<NodeId>,
}

impl Default for StateSyncConfig {
    fn default() -> Self {
        StateSyncConfig {
            enabled: state_sync_enabled_default(),
            max_accepted_summaries: max_accepted_summaries_default(),
            state_syncers: vec![],
        }
    }
}

impl StateSyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_accepted_summaries == 0 {
            return Err(anyhow!("max_accepted_summaries must be at least 1"));
        }
        Ok(())
    }
}

pub fn state_sync_enabled_default() -> bool {
    true
}

pub fn max_accepted_summaries_default() -> usize {
    64
}
