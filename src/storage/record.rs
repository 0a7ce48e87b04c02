use crate::core::{Entity, Id, Version};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Complete,
    Partial,
    Deleted,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Complete => write!(f, "COMPLETE"),
            RecordStatus::Partial => write!(f, "PARTIAL"),
            RecordStatus::Deleted => write!(f, "DELETED"),
        }
    }
}

/// What a physical write carries. Payload presence is part of the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum RecordBody {
    /// Full entity state.
    Complete(Entity),
    /// Only the fields changed relative to the prior state.
    Partial(Entity),
    Deleted,
}

/// One immutable physical write for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    id: Id,
    version: Version,
    body: RecordBody,
}

impl VersionedRecord {
    pub fn complete(id: Id, version: Version, entity: Entity) -> Self {
        Self {
            id,
            version,
            body: RecordBody::Complete(entity),
        }
    }

    pub fn partial(id: Id, version: Version, delta: Entity) -> Self {
        Self {
            id,
            version,
            body: RecordBody::Partial(delta),
        }
    }

    pub fn deleted(id: Id, version: Version) -> Self {
        Self {
            id,
            version,
            body: RecordBody::Deleted,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> RecordStatus {
        match self.body {
            RecordBody::Complete(_) => RecordStatus::Complete,
            RecordBody::Partial(_) => RecordStatus::Partial,
            RecordBody::Deleted => RecordStatus::Deleted,
        }
    }

    pub fn entity(&self) -> Option<&Entity> {
        match &self.body {
            RecordBody::Complete(entity) | RecordBody::Partial(entity) => Some(entity),
            RecordBody::Deleted => None,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self.body {
            RecordBody::Complete(entity) | RecordBody::Partial(entity) => Some(entity),
            RecordBody::Deleted => None,
        }
    }
}
