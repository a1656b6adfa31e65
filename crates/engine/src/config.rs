use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use modelstore_storage::MemoryStore;
use modelstore_storage::memory::DEFAULT_HISTORY_DEPTH;

use crate::error::EngineError;

/// How a transaction relates to newer published versions while it is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStrategy {
    /// The baseline captured at `begin` is kept for the transaction's whole
    /// life; a newer published version means a conflict at commit.
    #[default]
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Version records retained per resource.
    pub history_depth: usize,
    pub snapshot_strategy: SnapshotStrategy,
    /// Idle age after which `reap_expired` discards a transaction.
    /// `None` disables reaping.
    pub reap_after_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            snapshot_strategy: SnapshotStrategy::Fixed,
            reap_after_secs: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content).map_err(|e| EngineError::Config(format!("invalid TOML: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Apply `MODELSTORE_*` environment overrides.
    pub fn merge_with_env(&mut self) -> Result<(), EngineError> {
        self.merge_from(|key| std::env::var(key).ok())
    }

    pub fn merge_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), EngineError> {
        if let Some(depth) = lookup("MODELSTORE_HISTORY_DEPTH") {
            self.history_depth = depth.parse().map_err(|_| {
                EngineError::Config(format!("invalid MODELSTORE_HISTORY_DEPTH: {depth}"))
            })?;
        }
        if let Some(secs) = lookup("MODELSTORE_REAP_AFTER_SECS") {
            self.reap_after_secs = Some(secs.parse().map_err(|_| {
                EngineError::Config(format!("invalid MODELSTORE_REAP_AFTER_SECS: {secs}"))
            })?);
        }
        Ok(())
    }

    pub fn reap_after(&self) -> Option<Duration> {
        self.reap_after_secs.map(Duration::from_secs)
    }

    pub fn build_store(&self) -> MemoryStore {
        MemoryStore::with_history_depth(self.history_depth)
    }
}
