use super::CollectionManager;
use crate::config::CollectionConfig;
use crate::core::{CollectionError, CollectionScope, Result, SystemVersionClock, VersionClock};
use crate::storage::{InMemoryRecordStore, RecordStore};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::{Level, event};

/// Hands out collection managers bound to a scope.
///
/// Managers are cheap handles over shared pipelines; the factory keeps the
/// most recently used ones so repeated lookups for the same scope share them.
pub struct CollectionManagerFactory {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn VersionClock>,
    config: CollectionConfig,
    managers: Mutex<LruCache<CollectionScope, CollectionManager>>,
}

impl CollectionManagerFactory {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn VersionClock>,
        config: CollectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.manager_cache_size).ok_or_else(|| {
            CollectionError::Config("manager_cache_size must be greater than 0".into())
        })?;

        Ok(Self {
            store,
            clock,
            config,
            managers: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Factory over a fresh in-memory store and the system clock.
    pub fn in_memory(config: CollectionConfig) -> Result<Self> {
        Self::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(SystemVersionClock::new()),
            config,
        )
    }

    /// Manager for `scope`, reused from the cache when one exists.
    pub fn create_collection_manager(&self, scope: CollectionScope) -> Result<CollectionManager> {
        let mut managers = self.managers.lock()?;
        if let Some(manager) = managers.get(&scope) {
            return Ok(manager.clone());
        }

        let manager = CollectionManager::new(
            scope.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            &self.config,
        )?;
        event!(Level::DEBUG, collection = %scope, "collection manager created");
        managers.put(scope, manager.clone());
        Ok(manager)
    }

    pub fn cached_managers(&self) -> Result<usize> {
        Ok(self.managers.lock()?.len())
    }
}
