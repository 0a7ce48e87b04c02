use super::{CollectionIoEvent, Load, Stage};
use crate::core::{Entity, Result, VersionClock};
use crate::storage::{RecordStore, VersionedRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Level, event};

/// Layers the incoming fields on top of the current state of the entity.
///
/// Only the delta is persisted. The caller gets the merged entity back, i.e.
/// the prior resolved state with the change applied, stamped with the new
/// version. With no resolvable prior state there is nothing to layer on and
/// the change is stored as a COMPLETE record instead.
pub struct UpdateCommit {
    clock: Arc<dyn VersionClock>,
    store: Arc<dyn RecordStore>,
    load: Arc<Load>,
}

impl UpdateCommit {
    pub fn new(
        clock: Arc<dyn VersionClock>,
        store: Arc<dyn RecordStore>,
        load: Arc<Load>,
    ) -> Self {
        Self { clock, store, load }
    }
}

#[async_trait]
impl Stage<Entity, Entity> for UpdateCommit {
    fn name(&self) -> &'static str {
        "update_commit"
    }

    async fn run(&self, event: CollectionIoEvent<Entity>) -> Result<Option<Entity>> {
        let (context, mut delta) = event.into_parts();

        // Prior state is read just below the delta's version; a read at that
        // version must reconstruct exactly the merged result.
        let version = self.clock.now();
        let prior = match version.predecessor() {
            Some(horizon) => self.load.resolve(&context, delta.id(), horizon).await?,
            None => None,
        };

        context.ensure_active()?;
        delta.set_version(version);

        let merged = match prior {
            Some(mut prior) => {
                let record = VersionedRecord::partial(delta.id().clone(), version, delta.clone());
                self.store.append(context.scope(), record).await?;
                prior.apply_delta(&delta);
                prior.set_version(version);
                prior
            }
            None => {
                let record = VersionedRecord::complete(delta.id().clone(), version, delta.clone());
                self.store.append(context.scope(), record).await?;
                delta
            }
        };

        event!(
            Level::DEBUG,
            entity_id = %merged.id(),
            version = %version,
            fields = merged.field_count(),
            "entity updated"
        );
        Ok(Some(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectionConfig, WriteBackMode};
    use crate::core::{CollectionScope, Id, LogicalVersionClock, Value, Version};
    use crate::repair::RepairEngine;
    use crate::stage::IoContext;
    use crate::storage::{InMemoryRecordStore, RecordStatus, RecordStream};
    use futures::TryStreamExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        store: Arc<InMemoryRecordStore>,
        stage: UpdateCommit,
        context: IoContext,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRecordStore::new());
        let dyn_store: Arc<dyn RecordStore> = store.clone();
        let clock: Arc<dyn VersionClock> = Arc::new(LogicalVersionClock::new());
        let config = CollectionConfig::new().write_back(WriteBackMode::Off);
        let repair = Arc::new(RepairEngine::new(Arc::clone(&dyn_store), &config));
        let load = Arc::new(Load::new(Arc::clone(&clock), Arc::clone(&dyn_store), repair));
        let scope = CollectionScope::new(Id::new("organization"), Id::new("application"), "users");
        Fixture {
            store,
            stage: UpdateCommit::new(clock, dyn_store, load),
            context: IoContext::new(Arc::new(scope), CancellationToken::new()),
        }
    }

    async fn newest_status(f: &Fixture, id: &Id) -> RecordStatus {
        let mut stream = f
            .store
            .load_newest(f.context.scope(), id, Version::MAX, 1)
            .await
            .unwrap();
        stream.try_next().await.unwrap().unwrap().status()
    }

    #[tokio::test]
    async fn test_update_of_missing_entity_creates_it() {
        let f = fixture();
        let entity = Entity::new("user").field("name", "a");
        let id = entity.id().clone();

        let created = f
            .stage
            .run(CollectionIoEvent::new(f.context.clone(), entity))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(created.get("name"), Some(&Value::from("a")));
        assert_eq!(newest_status(&f, &id).await, RecordStatus::Complete);
    }

    #[tokio::test]
    async fn test_update_persists_delta_and_returns_merge() {
        let f = fixture();
        let entity = Entity::new("user").field("name", "a").field("age", 30i64);
        let id = entity.id().clone();
        f.stage
            .run(CollectionIoEvent::new(f.context.clone(), entity))
            .await
            .unwrap();

        let change = Entity::with_id(id.clone()).field("name", "b");
        let merged = f
            .stage
            .run(CollectionIoEvent::new(f.context.clone(), change))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.get("name"), Some(&Value::from("b")));
        assert_eq!(merged.get("age"), Some(&Value::Integer(30)));
        assert_eq!(newest_status(&f, &id).await, RecordStatus::Partial);
    }

    /// Store that commits a competing COMPLETE write, at the next clock
    /// tick, the first time anything reads from it.
    struct InterleavingStore {
        inner: InMemoryRecordStore,
        clock: Arc<LogicalVersionClock>,
        armed: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for InterleavingStore {
        async fn append(&self, scope: &CollectionScope, record: VersionedRecord) -> Result<()> {
            self.inner.append(scope, record).await
        }

        async fn load_newest(
            &self,
            scope: &CollectionScope,
            id: &Id,
            version_max: Version,
            limit: usize,
        ) -> Result<RecordStream> {
            if self.armed.swap(false, Ordering::SeqCst) {
                let competing = Entity::with_id(id.clone())
                    .field("name", "z")
                    .field("other", "x");
                let record = VersionedRecord::complete(id.clone(), self.clock.now(), competing);
                self.inner.append(scope, record).await?;
            }
            self.inner.load_newest(scope, id, version_max, limit).await
        }
    }

    #[tokio::test]
    async fn test_update_result_matches_stored_state_under_concurrent_write() {
        let clock = Arc::new(LogicalVersionClock::new());
        let store = Arc::new(InterleavingStore {
            inner: InMemoryRecordStore::new(),
            clock: Arc::clone(&clock),
            armed: AtomicBool::new(false),
        });
        let dyn_store: Arc<dyn RecordStore> = store.clone();
        let config = CollectionConfig::new().write_back(WriteBackMode::Off);
        let repair = Arc::new(RepairEngine::new(Arc::clone(&dyn_store), &config));
        let load = Arc::new(Load::new(clock.clone(), Arc::clone(&dyn_store), repair));
        let stage = UpdateCommit::new(clock.clone(), dyn_store, Arc::clone(&load));
        let scope = CollectionScope::new(Id::new("organization"), Id::new("application"), "users");
        let context = IoContext::new(Arc::new(scope), CancellationToken::new());

        let id = Id::new("user");
        let original = Entity::with_id(id.clone()).field("name", "a").field("age", 30i64);
        store
            .append(
                context.scope(),
                VersionedRecord::complete(id.clone(), clock.now(), original),
            )
            .await
            .unwrap();
        store.armed.store(true, Ordering::SeqCst);

        let change = Entity::with_id(id.clone()).field("name", "b");
        let merged = stage
            .run(CollectionIoEvent::new(context.clone(), change))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.get("name"), Some(&Value::from("b")));
        assert_eq!(merged.get("age"), Some(&Value::Integer(30)));
        assert_eq!(merged.get("other"), None);

        let version = merged.version().unwrap();
        let stored = load.resolve(&context, &id, version).await.unwrap();
        assert_eq!(stored, Some(merged));

        // The competing write landed after the update's version.
        let current = load.resolve_now(&context, &id).await.unwrap().unwrap();
        assert_eq!(current.get("name"), Some(&Value::from("z")));
        assert!(current.version().unwrap() > version);
    }
}
