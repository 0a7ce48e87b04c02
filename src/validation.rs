// Argument checks shared by every stage. All of them run before the first
// store call of an operation.

use crate::core::{CollectionError, CollectionScope, Entity, Id, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$")
        .expect("name pattern is a valid regex");
}

fn verify_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CollectionError::Validation(format!("{} must not be empty", kind)));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(CollectionError::Validation(format!(
            "{} '{}' contains invalid characters",
            kind, name
        )));
    }
    Ok(())
}

/// Fails with `Validation` when the id has a nil uuid or a malformed type tag.
pub fn verify_identity(id: &Id) -> Result<()> {
    if id.uuid().is_nil() {
        return Err(CollectionError::Validation(format!(
            "Entity id of type '{}' must not be nil",
            id.entity_type()
        )));
    }
    verify_name("Entity type", id.entity_type())
}

pub fn verify_scope(scope: &CollectionScope) -> Result<()> {
    verify_identity(scope.owner())?;
    verify_identity(scope.application())?;
    verify_name("Collection name", scope.name())
}

pub fn verify_entity(entity: &Entity) -> Result<()> {
    verify_identity(entity.id())?;
    if entity.fields().any(|(name, _)| name.is_empty()) {
        return Err(CollectionError::Validation(format!(
            "Entity {} has a field with an empty name",
            entity.id()
        )));
    }
    Ok(())
}
