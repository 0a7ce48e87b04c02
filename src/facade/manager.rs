use crate::config::CollectionConfig;
use crate::core::{
    CollectionError, CollectionScope, Entity, EntitySet, Id, Result, Version, VersionClock,
};
use crate::repair::RepairEngine;
use crate::stage::{
    IoContext, Load, MarkDeleted, Pipeline, SnapshotRead, UpdateCommit, VerifyEntity, VerifyId,
    WriteCommit,
};
use crate::storage::RecordStore;
use crate::validation::{verify_identity, verify_scope};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

/// The operations on one collection of entities.
///
/// Every operation is lazy: nothing runs until the returned future is polled,
/// and dropping the future abandons the operation between store calls.
#[async_trait]
pub trait EntityCollectionManager: Send + Sync {
    /// Write the entity as a new COMPLETE version. Its contents fully replace
    /// whatever state the entity had before.
    async fn write(&self, entity: Entity) -> Result<Entity>;

    /// Apply the entity's fields on top of the current state and return the
    /// result. Updating an entity that does not exist creates it.
    async fn update(&self, entity: Entity) -> Result<Entity>;

    /// Mark the entity deleted. Deleting twice is not an error.
    async fn delete(&self, id: &Id) -> Result<()>;

    /// Load the current state of the entity, `None` if it does not exist or
    /// has been deleted.
    async fn load(&self, id: &Id) -> Result<Option<Entity>>;

    /// Load several entities; ids that do not resolve are left out.
    async fn load_set(&self, ids: &[Id]) -> Result<EntitySet>;

    /// Load the entity as it was at `horizon`.
    async fn load_as_of(&self, id: &Id, horizon: Version) -> Result<Option<Entity>>;
}

/// Entity collection manager bound to one scope.
#[derive(Clone)]
pub struct CollectionManager {
    scope: Arc<CollectionScope>,
    cancel: CancellationToken,
    max_load_set_size: usize,
    load_concurrency: usize,
    load: Pipeline<Id, Entity>,
    load_as_of: Pipeline<SnapshotRead, Entity>,
    write: Pipeline<Entity, Entity>,
    update: Pipeline<Entity, Entity>,
    delete: Pipeline<Id, ()>,
}

impl std::fmt::Debug for CollectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionManager")
            .field("scope", &self.scope)
            .field("max_load_set_size", &self.max_load_set_size)
            .field("load_concurrency", &self.load_concurrency)
            .finish_non_exhaustive()
    }
}

impl CollectionManager {
    pub fn new(
        scope: CollectionScope,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn VersionClock>,
        config: &CollectionConfig,
    ) -> Result<Self> {
        verify_scope(&scope)?;
        config.validate()?;

        let repair = Arc::new(RepairEngine::new(Arc::clone(&store), config));
        let load = Arc::new(Load::new(Arc::clone(&clock), Arc::clone(&store), repair));

        Ok(Self {
            scope: Arc::new(scope),
            cancel: CancellationToken::new(),
            max_load_set_size: config.max_load_set_size,
            load_concurrency: config.load_concurrency,
            load: Pipeline::<Id, Entity>::start(Arc::clone(&load)),
            load_as_of: Pipeline::<SnapshotRead, Entity>::start(Arc::clone(&load)),
            write: Pipeline::start(VerifyEntity)
                .then(WriteCommit::new(Arc::clone(&clock), Arc::clone(&store))),
            update: Pipeline::start(VerifyEntity).then(UpdateCommit::new(
                Arc::clone(&clock),
                Arc::clone(&store),
                load,
            )),
            delete: Pipeline::start(VerifyId).then(MarkDeleted::new(clock, store)),
        })
    }

    pub fn scope(&self) -> &CollectionScope {
        &self.scope
    }

    /// A handle on the same collection whose operations stop once `token`
    /// is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut manager = self.clone();
        manager.cancel = token;
        manager
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn context(&self) -> IoContext {
        IoContext::new(Arc::clone(&self.scope), self.cancel.child_token())
    }
}

fn completed<T>(operation: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| {
        CollectionError::StorageUnavailable(format!("{} completed without a result", operation))
    })
}

#[async_trait]
impl EntityCollectionManager for CollectionManager {
    async fn write(&self, entity: Entity) -> Result<Entity> {
        let span = info_span!(
            "collection.write",
            collection = %self.scope.name(),
            entity_id = %entity.id()
        );
        async move {
            let written = self.write.execute(self.context(), entity).await?;
            completed("write", written)
        }
        .instrument(span)
        .await
    }

    async fn update(&self, entity: Entity) -> Result<Entity> {
        let span = info_span!(
            "collection.update",
            collection = %self.scope.name(),
            entity_id = %entity.id()
        );
        async move {
            let updated = self.update.execute(self.context(), entity).await?;
            completed("update", updated)
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, id: &Id) -> Result<()> {
        let span = info_span!(
            "collection.delete",
            collection = %self.scope.name(),
            entity_id = %id
        );
        async move {
            let done = self.delete.execute(self.context(), id.clone()).await?;
            completed("delete", done)
        }
        .instrument(span)
        .await
    }

    async fn load(&self, id: &Id) -> Result<Option<Entity>> {
        let span = info_span!(
            "collection.load",
            collection = %self.scope.name(),
            entity_id = %id
        );
        self.load
            .execute(self.context(), id.clone())
            .instrument(span)
            .await
    }

    async fn load_set(&self, ids: &[Id]) -> Result<EntitySet> {
        for id in ids {
            verify_identity(id)?;
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<Id> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        if unique.len() > self.max_load_set_size {
            return Err(CollectionError::Validation(format!(
                "Cannot load {} entities at once, the limit is {}",
                unique.len(),
                self.max_load_set_size
            )));
        }

        let span = info_span!(
            "collection.load_set",
            collection = %self.scope.name(),
            requested = unique.len()
        );
        async move {
            let loaded: Vec<Option<Entity>> = stream::iter(unique)
                .map(|id| self.load.execute(self.context(), id))
                .buffer_unordered(self.load_concurrency)
                .try_collect()
                .await?;

            let mut set = EntitySet::new();
            for entity in loaded.into_iter().flatten() {
                set.insert(entity);
            }
            Ok(set)
        }
        .instrument(span)
        .await
    }

    async fn load_as_of(&self, id: &Id, horizon: Version) -> Result<Option<Entity>> {
        let span = info_span!(
            "collection.load_as_of",
            collection = %self.scope.name(),
            entity_id = %id,
            horizon = %horizon
        );
        let read = SnapshotRead {
            id: id.clone(),
            horizon,
        };
        self.load_as_of
            .execute(self.context(), read)
            .instrument(span)
            .await
    }
}
