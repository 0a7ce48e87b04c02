/// Collection manager tests
///
/// Tests for write, update, delete and load through the public facade
/// Run with: cargo test --test collection_manager_tests

use futures::TryStreamExt;
use mvcc_collection::storage::RecordStatus;
use mvcc_collection::{
    CollectionConfig, CollectionError, CollectionManager, CollectionManagerFactory,
    CollectionScope, Entity, EntityCollectionManager, Id, InMemoryRecordStore,
    LogicalVersionClock, RecordStore, Value, Version, WriteBackMode,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn scope(name: &str) -> CollectionScope {
    CollectionScope::new(
        Id::from_name("organization", "acme"),
        Id::from_name("application", "portal"),
        name,
    )
}

fn setup() -> (Arc<InMemoryRecordStore>, CollectionManager) {
    let store = Arc::new(InMemoryRecordStore::new());
    let manager = CollectionManager::new(
        scope("users"),
        store.clone(),
        Arc::new(LogicalVersionClock::new()),
        &CollectionConfig::new().write_back(WriteBackMode::Off),
    )
    .unwrap();
    (store, manager)
}

async fn newest_status(store: &InMemoryRecordStore, id: &Id) -> Option<RecordStatus> {
    let mut newest = store
        .load_newest(&scope("users"), id, Version::MAX, 1)
        .await
        .unwrap();
    newest.try_next().await.unwrap().map(|record| record.status())
}

fn name_of(entity: &Entity) -> Option<&str> {
    entity.get("name").and_then(|v| v.as_str())
}

#[tokio::test]
async fn test_write_then_load() {
    let (_, users) = setup();

    let written = assert_ok!(users.write(Entity::new("user").field("name", "a")).await);
    assert!(written.version().is_some());

    let loaded = users.load(written.id()).await.unwrap().unwrap();
    assert_eq!(loaded, written);
}

#[tokio::test]
async fn test_update_replaces_only_changed_fields() {
    let (store, users) = setup();

    let written = users
        .write(Entity::new("user").field("name", "a").field("age", 30i64))
        .await
        .unwrap();
    let id = written.id().clone();

    let updated = users
        .update(Entity::with_id(id.clone()).field("name", "b"))
        .await
        .unwrap();
    assert_eq!(name_of(&updated), Some("b"));
    assert_eq!(updated.get("age"), Some(&Value::Integer(30)));
    assert!(updated.version() > written.version());

    // Only the delta is persisted.
    assert_eq!(newest_status(&store, &id).await, Some(RecordStatus::Partial));

    let loaded = users.load(&id).await.unwrap().unwrap();
    assert_eq!(loaded, updated);
}

#[tokio::test]
async fn test_update_creates_missing_entity() {
    let (store, users) = setup();

    let entity = Entity::new("user").field("name", "new");
    let id = entity.id().clone();
    let created = users.update(entity).await.unwrap();

    assert_eq!(name_of(&created), Some("new"));
    assert_eq!(newest_status(&store, &id).await, Some(RecordStatus::Complete));
    assert_eq!(users.load(&id).await.unwrap(), Some(created));
}

#[tokio::test]
async fn test_delete_hides_entity_from_later_horizons() {
    let (_, users) = setup();

    let written = users.write(Entity::new("user").field("name", "a")).await.unwrap();
    let id = written.id().clone();
    let v1 = written.version().unwrap();

    users.delete(&id).await.unwrap();

    assert_eq!(users.load(&id).await.unwrap(), None);

    let before_delete = users.load_as_of(&id, v1).await.unwrap().unwrap();
    assert_eq!(name_of(&before_delete), Some("a"));

    let before_write = users.load_as_of(&id, Version::MIN).await.unwrap();
    assert!(before_write.is_none());
}

#[tokio::test]
async fn test_deletion_wins_over_older_records() {
    let (store, users) = setup();

    let written = users.write(Entity::new("user").field("name", "a")).await.unwrap();
    let id = written.id().clone();
    users
        .update(Entity::with_id(id.clone()).field("name", "b"))
        .await
        .unwrap();
    users.delete(&id).await.unwrap();

    assert_eq!(users.load(&id).await.unwrap(), None);
    assert_eq!(store.version_count(&scope("users"), &id).await, 3);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (store, users) = setup();

    let written = users.write(Entity::new("user").field("name", "a")).await.unwrap();
    let id = written.id().clone();

    assert_ok!(users.delete(&id).await);
    assert_ok!(users.delete(&id).await);
    assert_eq!(users.load(&id).await.unwrap(), None);

    let never_written = Id::new("user");
    assert_ok!(users.delete(&never_written).await);
    assert_eq!(users.load(&never_written).await.unwrap(), None);
    assert_eq!(
        newest_status(&store, &never_written).await,
        Some(RecordStatus::Deleted)
    );
}

#[tokio::test]
async fn test_write_after_delete() {
    let (_, users) = setup();

    let written = users.write(Entity::new("user").field("name", "a")).await.unwrap();
    let id = written.id().clone();
    users.delete(&id).await.unwrap();

    users
        .write(Entity::with_id(id.clone()).field("name", "again"))
        .await
        .unwrap();
    let loaded = users.load(&id).await.unwrap().unwrap();
    assert_eq!(name_of(&loaded), Some("again"));
}

#[tokio::test]
async fn test_malformed_ids_never_reach_the_store() {
    let (store, users) = setup();

    for bad in [
        Id::from_parts(Uuid::nil(), "user"),
        Id::from_parts(Uuid::new_v4(), ""),
        Id::from_parts(Uuid::new_v4(), "user type"),
    ] {
        assert!(assert_err!(users.load(&bad).await).is_validation());
        assert!(assert_err!(users.delete(&bad).await).is_validation());
        assert!(assert_err!(users.load_as_of(&bad, Version::MAX).await).is_validation());
        assert!(
            assert_err!(users.write(Entity::with_id(bad.clone()).field("name", "a")).await)
                .is_validation()
        );
        assert!(
            assert_err!(users.update(Entity::with_id(bad.clone()).field("name", "a")).await)
                .is_validation()
        );
        assert!(
            assert_err!(users.load_set(&[Id::new("user"), bad.clone()]).await).is_validation()
        );
    }

    let stats = store.stats();
    assert_eq!(stats.appends, 0);
    assert_eq!(stats.load_calls, 0);
}

#[tokio::test]
async fn test_load_set_returns_only_live_entities() {
    let (_, users) = setup();

    let alive = users.write(Entity::new("user").field("name", "a")).await.unwrap();
    let deleted = users.write(Entity::new("user").field("name", "b")).await.unwrap();
    users.delete(deleted.id()).await.unwrap();
    let missing = Id::new("user");

    let set = users
        .load_set(&[alive.id().clone(), deleted.id().clone(), missing.clone()])
        .await
        .unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(set.get(alive.id()), Some(&alive));
    assert_eq!(set.ids().collect::<Vec<_>>(), vec![alive.id()]);
    assert_eq!(set.entities().collect::<Vec<_>>(), vec![&alive]);
    assert!(!set.contains(deleted.id()));
    assert!(!set.contains(&missing));
}

#[tokio::test]
async fn test_load_set_of_nothing() {
    let (store, users) = setup();
    let set = users.load_set(&[]).await.unwrap();
    assert!(set.is_empty());
    assert_eq!(store.stats().load_calls, 0);
}

#[tokio::test]
async fn test_operations_are_lazy() {
    let (store, users) = setup();
    let entity = Entity::new("user").field("name", "a");
    let id = entity.id().clone();

    let pending = users.write(entity);
    assert_eq!(store.stats().appends, 0);
    drop(pending);
    assert_eq!(store.stats().appends, 0);

    let pending = users.load(&id);
    drop(pending);
    assert_eq!(store.stats().load_calls, 0);
}

#[tokio::test]
async fn test_cancelled_manager_stops_before_the_store() {
    let (store, users) = setup();
    let token = CancellationToken::new();
    let cancellable = users.with_cancellation(token.clone());
    assert!(!cancellable.cancellation_token().is_cancelled());

    let written = cancellable
        .write(Entity::new("user").field("name", "a"))
        .await
        .unwrap();
    store.reset_stats();

    token.cancel();
    assert!(cancellable.cancellation_token().is_cancelled());
    let err = cancellable.load(written.id()).await.unwrap_err();
    assert!(matches!(err, CollectionError::Cancelled));
    let err = cancellable.delete(written.id()).await.unwrap_err();
    assert!(matches!(err, CollectionError::Cancelled));
    assert_eq!(store.stats().load_calls, 0);
    assert_eq!(store.stats().appends, 0);

    // The original handle is unaffected.
    assert!(users.load(written.id()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_writes_get_distinct_versions() {
    let factory = CollectionManagerFactory::in_memory(CollectionConfig::default()).unwrap();
    let users = factory.create_collection_manager(scope("users")).unwrap();

    let mut handles = Vec::new();
    for i in 0..32i64 {
        let users = users.clone();
        handles.push(tokio::spawn(async move {
            users.write(Entity::new("user").field("n", i)).await
        }));
    }

    let mut versions = HashSet::new();
    for handle in handles {
        let written = handle.await.unwrap().unwrap();
        assert!(versions.insert(written.version().unwrap()));
    }
    assert_eq!(versions.len(), 32);
}

#[tokio::test]
async fn test_factory_managers_share_store_per_scope() {
    let factory = CollectionManagerFactory::in_memory(CollectionConfig::default()).unwrap();

    let users = factory.create_collection_manager(scope("users")).unwrap();
    let written = users.write(Entity::new("user").field("name", "a")).await.unwrap();

    let same = factory.create_collection_manager(scope("users")).unwrap();
    assert_eq!(same.load(written.id()).await.unwrap(), Some(written.clone()));

    let other = factory.create_collection_manager(scope("groups")).unwrap();
    assert_eq!(other.load(written.id()).await.unwrap(), None);
}

#[test]
fn test_blocking_caller() {
    let (_, users) = setup();
    let written =
        tokio_test::block_on(users.write(Entity::new("user").field("name", "a"))).unwrap();
    let loaded = tokio_test::block_on(users.load(written.id())).unwrap();
    assert_eq!(loaded, Some(written));
}

#[tokio::test]
async fn test_entities_from_json() {
    let (_, users) = setup();
    let id = Id::new("user");
    let entity = Entity::from_json(
        id.clone(),
        serde_json::json!({ "name": "a", "age": 30, "admin": false }),
    )
    .unwrap();

    users.write(entity).await.unwrap();
    let loaded = users.load(&id).await.unwrap().unwrap();
    assert_eq!(loaded.get("age"), Some(&Value::Integer(30)));
    assert_eq!(loaded.get("admin"), Some(&Value::Boolean(false)));
}
