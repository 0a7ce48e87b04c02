use super::{CollectionIoEvent, Stage};
use crate::core::{Entity, Result, VersionClock};
use crate::storage::{RecordStore, VersionedRecord};
use crate::validation::verify_entity;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Level, event};

/// Rejects malformed entities before anything touches the store.
pub struct VerifyEntity;

#[async_trait]
impl Stage<Entity, Entity> for VerifyEntity {
    fn name(&self) -> &'static str {
        "verify_entity"
    }

    async fn run(&self, event: CollectionIoEvent<Entity>) -> Result<Option<Entity>> {
        verify_entity(event.payload())?;
        Ok(Some(event.into_payload()))
    }
}

/// Appends the entity as a new COMPLETE version.
pub struct WriteCommit {
    clock: Arc<dyn VersionClock>,
    store: Arc<dyn RecordStore>,
}

impl WriteCommit {
    pub fn new(clock: Arc<dyn VersionClock>, store: Arc<dyn RecordStore>) -> Self {
        Self { clock, store }
    }
}

#[async_trait]
impl Stage<Entity, Entity> for WriteCommit {
    fn name(&self) -> &'static str {
        "write_commit"
    }

    async fn run(&self, event: CollectionIoEvent<Entity>) -> Result<Option<Entity>> {
        let (context, mut entity) = event.into_parts();
        let version = self.clock.now();
        entity.set_version(version);

        let record = VersionedRecord::complete(entity.id().clone(), version, entity.clone());
        self.store.append(context.scope(), record).await?;

        event!(Level::DEBUG, entity_id = %entity.id(), version = %version, "entity written");
        Ok(Some(entity))
    }
}
