use super::{CollectionError, Id, Result, Value, Version};
use im::OrdMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The user-visible property bag of an entity at a version.
///
/// Fields live in a persistent ordered map: cloning an entity during merge or
/// write-back shares structure instead of copying every property, and the
/// iteration order is stable, so two equal entities serialize to the same
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: Id,
    version: Option<Version>,
    fields: OrdMap<String, Value>,
}

impl Entity {
    /// A new entity of `entity_type` with a freshly assigned Id.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self::with_id(Id::new(entity_type))
    }

    pub fn with_id(id: Id) -> Self {
        Self {
            id,
            version: None,
            fields: OrdMap::new(),
        }
    }

    /// Imports a JSON object as the property bag of entity `id`.
    pub fn from_json(id: Id, json: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(CollectionError::Validation(format!(
                "Entity {} must be built from a JSON object",
                id
            )));
        };

        let mut entity = Self::with_id(id);
        for (name, value) in map {
            entity.set(name, Value::from(value));
        }
        Ok(entity)
    }

    /// Builder-style field setter.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field, returning the previous value if there was one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// The version this state was resolved or written at; `None` until the
    /// entity has been persisted.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = Some(version);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Layers `delta` on top of this entity: every field present in the delta
    /// overwrites, every other field carries forward unchanged.
    pub(crate) fn apply_delta(&mut self, delta: &Entity) {
        for (name, value) in delta.fields.iter() {
            self.fields.insert(name.clone(), value.clone());
        }
    }
}

/// Result of a batch load: only Ids that resolved to a live entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySet {
    entities: HashMap<Id, Entity>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id().clone(), entity);
    }

    pub fn get(&self, id: &Id) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.entities.keys()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }
}

impl IntoIterator for EntitySet {
    type Item = (Id, Entity);
    type IntoIter = std::collections::hash_map::IntoIter<Id, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}
