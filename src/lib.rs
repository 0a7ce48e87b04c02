// ============================================================================
// mvcc-collection
// ============================================================================
//
// Versioned entity storage: every write appends a new immutable version, and
// reads resolve the newest version visible at a snapshot horizon, repairing
// partial updates into complete entities on the way out.
//
//   facade   - EntityCollectionManager and the scoped manager factory
//   stage    - typed stage pipelines every operation runs through
//   repair   - version resolution and read repair
//   storage  - record model, RecordStore contract, in-memory store
//   core     - ids, entities, values, versions, errors
//
// ============================================================================

pub mod config;
pub mod core;
pub mod facade;
pub mod repair;
pub mod stage;
pub mod storage;
pub mod validation;

pub use config::{CollectionConfig, HistoryGapPolicy, WriteBackMode};
pub use core::{
    CollectionError, CollectionScope, Entity, EntitySet, Id, LogicalVersionClock, Result,
    SystemVersionClock, Value, Version, VersionClock,
};
pub use facade::{CollectionManager, CollectionManagerFactory, EntityCollectionManager};
pub use storage::{InMemoryRecordStore, RecordStore, VersionedRecord};

/// Factory over an in-memory store with default configuration.
///
/// # Examples
///
/// ```
/// use mvcc_collection::{CollectionScope, Entity, EntityCollectionManager, Id};
///
/// # #[tokio::main]
/// # async fn main() -> mvcc_collection::Result<()> {
/// let factory = mvcc_collection::in_memory()?;
/// let scope = CollectionScope::new(Id::new("organization"), Id::new("application"), "users");
/// let users = factory.create_collection_manager(scope)?;
///
/// let alice = users.write(Entity::new("user").field("name", "alice")).await?;
/// let loaded = users.load(alice.id()).await?;
/// assert_eq!(loaded.and_then(|u| u.get("name").cloned()), Some("alice".into()));
/// # Ok(())
/// # }
/// ```
pub fn in_memory() -> Result<CollectionManagerFactory> {
    CollectionManagerFactory::in_memory(CollectionConfig::default())
}
