use super::codec::{decode_record, encode_record};
use super::engine::{RecordStore, RecordStream};
use super::record::VersionedRecord;
use crate::core::{CollectionScope, Id, Result, Version};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    scope: CollectionScope,
    id: Id,
}

#[derive(Debug, Default)]
struct StoreCounters {
    appends: AtomicU64,
    load_calls: AtomicU64,
    records_read: AtomicU64,
}

/// Point-in-time copy of the store's access counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub appends: u64,
    pub load_calls: u64,
    /// Records actually pulled out of `load_newest` streams.
    pub records_read: u64,
}

/// In-memory record store.
///
/// Every record is kept as an encoded cell in a per-entity version map, so a
/// reader always gets a fresh decoded copy and stored cells are never mutated
/// in place.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    cells: RwLock<HashMap<RecordKey, BTreeMap<Version, Arc<[u8]>>>>,
    counters: Arc<StoreCounters>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            appends: self.counters.appends.load(Ordering::SeqCst),
            load_calls: self.counters.load_calls.load(Ordering::SeqCst),
            records_read: self.counters.records_read.load(Ordering::SeqCst),
        }
    }

    pub fn reset_stats(&self) {
        self.counters.appends.store(0, Ordering::SeqCst);
        self.counters.load_calls.store(0, Ordering::SeqCst);
        self.counters.records_read.store(0, Ordering::SeqCst);
    }

    /// Number of stored versions for `id`, deleted markers included.
    pub async fn version_count(&self, scope: &CollectionScope, id: &Id) -> usize {
        let key = RecordKey {
            scope: scope.clone(),
            id: id.clone(),
        };
        let cells = self.cells.read().await;
        cells.get(&key).map(|versions| versions.len()).unwrap_or(0)
    }

    /// All stored versions for `id`, oldest first. Does not count as a read.
    pub async fn versions(&self, scope: &CollectionScope, id: &Id) -> Vec<Version> {
        let key = RecordKey {
            scope: scope.clone(),
            id: id.clone(),
        };
        let cells = self.cells.read().await;
        cells
            .get(&key)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append(&self, scope: &CollectionScope, record: VersionedRecord) -> Result<()> {
        let cell: Arc<[u8]> = encode_record(&record)?.into();
        let key = RecordKey {
            scope: scope.clone(),
            id: record.id().clone(),
        };

        let mut cells = self.cells.write().await;
        cells.entry(key).or_default().insert(record.version(), cell);
        self.counters.appends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_newest(
        &self,
        scope: &CollectionScope,
        id: &Id,
        version_max: Version,
        limit: usize,
    ) -> Result<RecordStream> {
        self.counters.load_calls.fetch_add(1, Ordering::SeqCst);
        let key = RecordKey {
            scope: scope.clone(),
            id: id.clone(),
        };

        let window: Vec<Arc<[u8]>> = {
            let cells = self.cells.read().await;
            match cells.get(&key) {
                Some(versions) => versions
                    .range(..=version_max)
                    .rev()
                    .take(limit)
                    .map(|(_, cell)| Arc::clone(cell))
                    .collect(),
                None => Vec::new(),
            }
        };

        let counters = Arc::clone(&self.counters);
        let records = stream::iter(window).map(move |cell| {
            counters.records_read.fetch_add(1, Ordering::SeqCst);
            decode_record(&cell)
        });
        Ok(records.boxed())
    }
}
