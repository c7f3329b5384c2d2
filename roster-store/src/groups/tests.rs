// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::groups::GroupStore;
use crate::sqlite::{SqliteError, SqliteStore};
use crate::test_utils::seed_groups;
use crate::traits::Transaction;

#[tokio::test]
async fn insert_and_get_group() {
    let store = SqliteStore::temporary().await;

    let permit = store.begin().await.unwrap();
    let group = store.insert_group("turtles").await.unwrap();
    store.commit(permit).await.unwrap();

    assert_eq!(group.name, "turtles");
    assert_eq!(store.get_group("turtles").await.unwrap(), Some(group));
    assert!(store.has_group("turtles").await.unwrap());
    assert!(!store.has_group("foot clan").await.unwrap());
    assert!(store.members_of_group("turtles").await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_group_name() {
    let store = SqliteStore::temporary().await;
    seed_groups(&store, &["turtles"]).await;

    let permit = store.begin().await.unwrap();
    let result = store.insert_group("turtles").await;
    assert!(matches!(result, Err(ref err) if err.is_unique_violation()));
    store.rollback(permit).await.unwrap();
}

#[tokio::test]
async fn delete_and_list_groups() {
    let store = SqliteStore::temporary().await;

    assert!(matches!(
        store.delete_group("turtles").await,
        Err(SqliteError::TransactionMissing)
    ));

    seed_groups(&store, &["turtles", "foot clan"]).await;

    let permit = store.begin().await.unwrap();
    assert!(store.delete_group("foot clan").await.unwrap());
    assert!(!store.delete_group("foot clan").await.unwrap());
    store.commit(permit).await.unwrap();

    let names: Vec<String> = store
        .list_groups()
        .await
        .unwrap()
        .into_iter()
        .map(|group| group.name)
        .collect();
    assert_eq!(names, vec!["turtles"]);
}
