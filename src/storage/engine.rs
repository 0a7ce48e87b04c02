use super::record::VersionedRecord;
use crate::core::{CollectionScope, Id, Result, Version};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazily consumed sequence of records, newest first. Records not pulled from
/// the stream are never read from the backing store.
pub type RecordStream = BoxStream<'static, Result<VersionedRecord>>;

/// Versioned record store - the append-only backend the engine runs on.
///
/// Implementations resolve conflicting appends for the same `(scope, id,
/// version)` themselves; the last append wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append one immutable record.
    async fn append(&self, scope: &CollectionScope, record: VersionedRecord) -> Result<()>;

    /// Records for `id` with version `<= version_max`, newest first, at most
    /// `limit` of them.
    async fn load_newest(
        &self,
        scope: &CollectionScope,
        id: &Id,
        version_max: Version,
        limit: usize,
    ) -> Result<RecordStream>;

    /// Append a DELETED marker for `id` at `version`.
    async fn mark_deleted(&self, scope: &CollectionScope, id: &Id, version: Version) -> Result<()> {
        self.append(scope, VersionedRecord::deleted(id.clone(), version))
            .await
    }
}
