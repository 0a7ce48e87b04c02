use crate::core::{CollectionError, Result};
use serde::{Deserialize, Serialize};

/// What the repair engine does with a PARTIAL chain that has no reachable
/// COMPLETE ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HistoryGapPolicy {
    /// Merge the available deltas on top of an empty entity.
    MergeAvailable,
    /// Resolve to absent, exactly like a missing entity.
    #[default]
    TreatAsAbsent,
    /// Fail the read with `UnrepairableHistory`.
    Fail,
}

/// How a repaired entity is persisted back as a COMPLETE record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WriteBackMode {
    Off,
    /// Detached task on the current tokio runtime; skipped outside a runtime.
    #[default]
    Background,
    /// Awaited before the read returns. Failures are still only logged.
    Inline,
}

/// Engine configuration shared by every manager a factory creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Records fetched per backward repair window.
    pub repair_batch_size: usize,

    pub history_gap_policy: HistoryGapPolicy,

    pub write_back: WriteBackMode,

    /// Maximum number of Ids in one batch load
    pub max_load_set_size: usize,

    /// Single-entity loads kept in flight by a batch load
    pub load_concurrency: usize,

    /// Scoped managers cached by the factory
    pub manager_cache_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            repair_batch_size: 10,
            history_gap_policy: HistoryGapPolicy::default(),
            write_back: WriteBackMode::default(),
            max_load_set_size: 1_000,
            load_concurrency: 16,
            manager_cache_size: 128,
        }
    }
}

impl CollectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; absent keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CollectionError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn repair_batch_size(mut self, size: usize) -> Self {
        self.repair_batch_size = size;
        self
    }

    pub fn history_gap_policy(mut self, policy: HistoryGapPolicy) -> Self {
        self.history_gap_policy = policy;
        self
    }

    pub fn write_back(mut self, mode: WriteBackMode) -> Self {
        self.write_back = mode;
        self
    }

    pub fn max_load_set_size(mut self, max: usize) -> Self {
        self.max_load_set_size = max;
        self
    }

    pub fn load_concurrency(mut self, concurrency: usize) -> Self {
        self.load_concurrency = concurrency;
        self
    }

    pub fn manager_cache_size(mut self, size: usize) -> Self {
        self.manager_cache_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.repair_batch_size == 0 {
            return Err(CollectionError::Config(
                "repair_batch_size must be greater than 0".into(),
            ));
        }
        if self.load_concurrency == 0 {
            return Err(CollectionError::Config(
                "load_concurrency must be greater than 0".into(),
            ));
        }
        if self.manager_cache_size == 0 {
            return Err(CollectionError::Config(
                "manager_cache_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
