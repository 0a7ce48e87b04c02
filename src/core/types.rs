use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a logical entity: an opaque uuid plus the entity type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id {
    uuid: Uuid,
    entity_type: String,
}

impl Id {
    /// Assigns a fresh random identity for a new entity of `entity_type`.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            entity_type: entity_type.into(),
        }
    }

    pub fn from_parts(uuid: Uuid, entity_type: impl Into<String>) -> Self {
        Self {
            uuid,
            entity_type: entity_type.into(),
        }
    }

    /// Deterministic identity derived from a natural key, so that every writer
    /// naming the same `(entity_type, name)` addresses the same entity.
    pub fn from_name(entity_type: impl Into<String>, name: &str) -> Self {
        let entity_type = entity_type.into();
        let key = format!("{}:{}", entity_type, name);
        Self {
            uuid: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()),
            entity_type,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.uuid)
    }
}

/// Tenant namespace every collection operation runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionScope {
    owner: Id,
    application: Id,
    name: String,
}

impl CollectionScope {
    pub fn new(owner: Id, application: Id, name: impl Into<String>) -> Self {
        Self {
            owner,
            application,
            name: name.into(),
        }
    }

    pub fn owner(&self) -> &Id {
        &self.owner
    }

    pub fn application(&self) -> &Id {
        &self.application
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.application, self.name)
    }
}
