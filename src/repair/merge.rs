use crate::core::{Entity, Id, Version};
use crate::storage::VersionedRecord;

/// Replays `deltas` (oldest first) on top of `base`, stamping the result with
/// `version`. Deltas that carry no payload are skipped.
pub fn merge_forward<'a, I>(base: Entity, deltas: I, version: Version) -> Entity
where
    I: IntoIterator<Item = &'a VersionedRecord>,
{
    let mut merged = base;
    for delta in deltas {
        if let Some(fields) = delta.entity() {
            merged.apply_delta(fields);
        }
    }
    merged.set_version(version);
    merged
}

/// The base a chain without a COMPLETE ancestor is merged onto.
pub fn empty_base(id: &Id) -> Entity {
    Entity::with_id(id.clone())
}
