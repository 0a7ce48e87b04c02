use super::{CollectionIoEvent, IoContext, Stage};
use crate::core::{Entity, Id, Result, Version, VersionClock};
use crate::repair::RepairEngine;
use crate::storage::RecordStore;
use crate::validation::verify_identity;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{Level, event};

/// A read pinned to an explicit snapshot horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRead {
    pub id: Id,
    pub horizon: Version,
}

/// Resolves the newest version of one entity at or before a horizon and hands
/// it to the repair engine.
///
/// Only the single newest record is fetched here; anything deeper is the
/// repair engine's business, so a read of a COMPLETE head costs one record no
/// matter how long the history is.
pub struct Load {
    clock: Arc<dyn VersionClock>,
    store: Arc<dyn RecordStore>,
    repair: Arc<RepairEngine>,
}

impl Load {
    pub fn new(
        clock: Arc<dyn VersionClock>,
        store: Arc<dyn RecordStore>,
        repair: Arc<RepairEngine>,
    ) -> Self {
        Self {
            clock,
            store,
            repair,
        }
    }

    /// Resolves `id` as of `horizon`. Absent, deleted and unrepairable
    /// entities all come back as `Ok(None)`.
    pub async fn resolve(
        &self,
        context: &IoContext,
        id: &Id,
        horizon: Version,
    ) -> Result<Option<Entity>> {
        verify_identity(id)?;
        self.resolve_verified(context, id, horizon).await
    }

    /// Resolves `id` as of a horizon taken from the clock right now.
    pub async fn resolve_now(&self, context: &IoContext, id: &Id) -> Result<Option<Entity>> {
        verify_identity(id)?;
        let horizon = self.clock.now();
        self.resolve_verified(context, id, horizon).await
    }

    async fn resolve_verified(
        &self,
        context: &IoContext,
        id: &Id,
        horizon: Version,
    ) -> Result<Option<Entity>> {
        context.ensure_active()?;
        let mut newest = self
            .store
            .load_newest(context.scope(), id, horizon, 1)
            .await?;

        let Some(record) = newest.try_next().await? else {
            event!(Level::DEBUG, entity_id = %id, horizon = %horizon, "no version at or before horizon");
            return Ok(None);
        };
        drop(newest);

        event!(
            Level::DEBUG,
            entity_id = %id,
            horizon = %horizon,
            version = %record.version(),
            status = %record.status(),
            "newest version loaded"
        );
        self.repair.maybe_repair(context, record).await
    }
}

#[async_trait]
impl Stage<Id, Entity> for Load {
    fn name(&self) -> &'static str {
        "load"
    }

    async fn run(&self, event: CollectionIoEvent<Id>) -> Result<Option<Entity>> {
        let (context, id) = event.into_parts();
        self.resolve_now(&context, &id).await
    }
}

#[async_trait]
impl Stage<SnapshotRead, Entity> for Load {
    fn name(&self) -> &'static str {
        "load_as_of"
    }

    async fn run(&self, event: CollectionIoEvent<SnapshotRead>) -> Result<Option<Entity>> {
        let (context, read) = event.into_parts();
        self.resolve(&context, &read.id, read.horizon).await
    }
}
