// ============================================================================
// Read repair
// ============================================================================
//
// Turns the newest visible record of an entity into the complete entity it
// stands for. COMPLETE records are returned as is, DELETED markers resolve to
// nothing, and a PARTIAL record is repaired by walking back in bounded windows
// to the nearest COMPLETE ancestor and replaying the deltas forward.
//
// For example, with v1 COMPLETE and v2..v20 PARTIAL and a window of 10, the
// walk reads v19..v10, then v9..v1, and stops pulling as soon as v1 arrives.
//
// ============================================================================

pub mod merge;

use crate::config::{CollectionConfig, HistoryGapPolicy, WriteBackMode};
use crate::core::{CollectionError, Entity, Result, Version};
use crate::stage::IoContext;
use crate::storage::{RecordStatus, RecordStore, VersionedRecord};
use futures::TryStreamExt;
use merge::{empty_base, merge_forward};
use std::sync::Arc;
use tracing::{Level, event};

/// Why the backward walk stopped without finding a COMPLETE ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Deleted,
    Exhausted,
}

/// A PARTIAL head plus everything the walk collected below it.
struct DeltaChain {
    base: std::result::Result<Entity, Boundary>,
    /// Newest first, head included.
    deltas: Vec<VersionedRecord>,
}

pub struct RepairEngine {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
    gap_policy: HistoryGapPolicy,
    write_back: WriteBackMode,
}

impl RepairEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: &CollectionConfig) -> Self {
        Self {
            store,
            batch_size: config.repair_batch_size.max(1),
            gap_policy: config.history_gap_policy,
            write_back: config.write_back,
        }
    }

    /// Resolves `record` to the complete entity it represents.
    ///
    /// `Ok(None)` means no entity state is derivable: the record is a deletion
    /// marker, or a delta chain with no base under `TreatAsAbsent`.
    pub async fn maybe_repair(
        &self,
        context: &IoContext,
        record: VersionedRecord,
    ) -> Result<Option<Entity>> {
        match record.status() {
            RecordStatus::Complete => {
                // A restatement carries the version of the head it restates.
                let version = record.version();
                Ok(record.into_entity().map(|mut entity| {
                    if entity.version().is_none() {
                        entity.set_version(version);
                    }
                    entity
                }))
            }
            RecordStatus::Deleted => Ok(None),
            RecordStatus::Partial => self.repair_partial(context, record).await,
        }
    }

    async fn repair_partial(
        &self,
        context: &IoContext,
        head: VersionedRecord,
    ) -> Result<Option<Entity>> {
        let id = head.id().clone();
        let head_version = head.version();
        let chain = self.walk_back(context, head).await?;

        let base = match chain.base {
            Ok(base) => base,
            Err(boundary) => match self.gap_policy {
                HistoryGapPolicy::MergeAvailable => {
                    event!(
                        Level::DEBUG,
                        entity_id = %id,
                        deltas = chain.deltas.len(),
                        boundary = ?boundary,
                        "no complete ancestor, merging available deltas"
                    );
                    empty_base(&id)
                }
                HistoryGapPolicy::TreatAsAbsent => {
                    event!(
                        Level::WARN,
                        entity_id = %id,
                        deltas = chain.deltas.len(),
                        boundary = ?boundary,
                        "no complete ancestor, resolving to absent"
                    );
                    return Ok(None);
                }
                HistoryGapPolicy::Fail => {
                    return Err(CollectionError::UnrepairableHistory(id.to_string()));
                }
            },
        };

        let merged = merge_forward(base, chain.deltas.iter().rev(), head_version);
        event!(
            Level::DEBUG,
            entity_id = %id,
            version = %head_version,
            deltas = chain.deltas.len(),
            "entity repaired"
        );

        self.write_back(context, &merged, head_version).await;
        Ok(Some(merged))
    }

    async fn walk_back(&self, context: &IoContext, head: VersionedRecord) -> Result<DeltaChain> {
        let id = head.id().clone();
        let mut cursor = head.version().predecessor();
        let mut deltas = vec![head];

        while let Some(version_max) = cursor {
            context.ensure_active()?;
            let mut window = self
                .store
                .load_newest(context.scope(), &id, version_max, self.batch_size)
                .await?;

            let mut pulled = 0;
            while let Some(record) = window.try_next().await? {
                pulled += 1;
                if record.version() > version_max {
                    return Err(CollectionError::StorageUnavailable(format!(
                        "store returned {} for {} above the requested bound {}",
                        record.version(),
                        id,
                        version_max
                    )));
                }
                cursor = record.version().predecessor();

                match record.status() {
                    RecordStatus::Complete => {
                        let base = record.into_entity().ok_or(Boundary::Exhausted);
                        return Ok(DeltaChain { base, deltas });
                    }
                    RecordStatus::Deleted => {
                        return Ok(DeltaChain {
                            base: Err(Boundary::Deleted),
                            deltas,
                        });
                    }
                    RecordStatus::Partial => deltas.push(record),
                }
            }

            if pulled < self.batch_size {
                break;
            }
        }

        Ok(DeltaChain {
            base: Err(Boundary::Exhausted),
            deltas,
        })
    }

    /// Persists `merged` as a COMPLETE restatement of `head_version`.
    ///
    /// The restatement sorts directly after the head and before any version a
    /// clock issues later, so a concurrent writer always supersedes it.
    async fn write_back(&self, context: &IoContext, merged: &Entity, head_version: Version) {
        if self.write_back == WriteBackMode::Off || context.cancellation().is_cancelled() {
            return;
        }

        let record =
            VersionedRecord::complete(merged.id().clone(), head_version.restated(), merged.clone());

        match self.write_back {
            WriteBackMode::Off => {}
            WriteBackMode::Inline => {
                if let Err(err) = self.store.append(context.scope(), record).await {
                    event!(Level::WARN, error = %err, entity_id = %merged.id(), "write-back failed");
                }
            }
            WriteBackMode::Background => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let store = Arc::clone(&self.store);
                    let scope = context.scope().clone();
                    handle.spawn(async move {
                        let id = record.id().clone();
                        if let Err(err) = store.append(&scope, record).await {
                            event!(Level::WARN, error = %err, entity_id = %id, "write-back failed");
                        }
                    });
                }
                Err(_) => {
                    event!(Level::DEBUG, entity_id = %merged.id(), "no runtime, write-back skipped");
                }
            },
        }
    }
}
