use super::{CollectionIoEvent, Stage};
use crate::core::{Id, Result, VersionClock};
use crate::storage::RecordStore;
use crate::validation::verify_identity;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Level, event};

pub struct VerifyId;

#[async_trait]
impl Stage<Id, Id> for VerifyId {
    fn name(&self) -> &'static str {
        "verify_id"
    }

    async fn run(&self, event: CollectionIoEvent<Id>) -> Result<Option<Id>> {
        verify_identity(event.payload())?;
        Ok(Some(event.into_payload()))
    }
}

/// Appends a DELETED marker at a fresh version. Deleting an entity that is
/// already deleted, or never existed, just appends another marker.
pub struct MarkDeleted {
    clock: Arc<dyn VersionClock>,
    store: Arc<dyn RecordStore>,
}

impl MarkDeleted {
    pub fn new(clock: Arc<dyn VersionClock>, store: Arc<dyn RecordStore>) -> Self {
        Self { clock, store }
    }
}

#[async_trait]
impl Stage<Id, ()> for MarkDeleted {
    fn name(&self) -> &'static str {
        "mark_deleted"
    }

    async fn run(&self, event: CollectionIoEvent<Id>) -> Result<Option<()>> {
        let (context, id) = event.into_parts();
        let version = self.clock.now();
        self.store.mark_deleted(context.scope(), &id, version).await?;

        event!(Level::DEBUG, entity_id = %id, version = %version, "entity marked deleted");
        Ok(Some(()))
    }
}
