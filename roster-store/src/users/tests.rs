// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::sqlite::{SqliteError, SqliteStore};
use crate::test_utils::{seed_groups, seed_users};
use crate::traits::Transaction;
use crate::users::{UserStore, UserUpdate};

#[tokio::test]
async fn insert_and_get_user() {
    let store = SqliteStore::temporary().await;

    let permit = store.begin().await.unwrap();
    let user = store.insert_user("casey", "Casey", "Jones").await.unwrap();
    store.commit(permit).await.unwrap();

    assert_eq!(user.id, "casey");
    assert_eq!(user.first_name, "Casey");
    assert_eq!(user.last_name, "Jones");
    assert!(user.created_at > 0);

    assert_eq!(store.get_user("casey").await.unwrap(), Some(user));
    assert!(store.has_user("casey").await.unwrap());

    assert_eq!(store.get_user("april").await.unwrap(), None);
    assert!(!store.has_user("april").await.unwrap());
}

#[tokio::test]
async fn writes_require_transaction() {
    let store = SqliteStore::temporary().await;

    assert!(matches!(
        store.insert_user("casey", "Casey", "Jones").await,
        Err(SqliteError::TransactionMissing)
    ));
    assert!(matches!(
        store.delete_user("casey").await,
        Err(SqliteError::TransactionMissing)
    ));
}

#[tokio::test]
async fn duplicate_user_id() {
    let store = SqliteStore::temporary().await;
    seed_users(&store, &["casey"]).await;

    let permit = store.begin().await.unwrap();
    let err = store
        .insert_user("casey", "Another", "Casey")
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());
    store.rollback(permit).await.unwrap();

    assert_eq!(store.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn partial_update() {
    let store = SqliteStore::temporary().await;
    seed_users(&store, &["casey", "april"]).await;

    let permit = store.begin().await.unwrap();

    // Only the last name changes.
    let user = store
        .update_user(
            "casey",
            &UserUpdate {
                last_name: Some("Smith".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.first_name, "casey first");
    assert_eq!(user.last_name, "Smith");

    // Renaming works as long as the new id is free.
    let user = store
        .update_user(
            "casey",
            &UserUpdate {
                id: Some("casey.jones".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, "casey.jones");

    let err = store
        .update_user(
            "casey.jones",
            &UserUpdate {
                id: Some("april".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_unique_violation());

    // Unknown users are reported as `None`.
    let result = store
        .update_user(
            "leonardo",
            &UserUpdate {
                first_name: Some("Leo".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result, None);

    store.commit(permit).await.unwrap();

    assert!(store.has_user("casey.jones").await.unwrap());
    assert!(!store.has_user("casey").await.unwrap());
}

#[tokio::test]
async fn delete_and_list_users() {
    let store = SqliteStore::temporary().await;
    seed_users(&store, &["casey", "april", "leonardo"]).await;

    let ids: Vec<String> = store
        .list_users()
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect();
    assert_eq!(ids, vec!["casey", "april", "leonardo"]);

    let permit = store.begin().await.unwrap();
    assert!(store.delete_user("april").await.unwrap());
    assert!(!store.delete_user("april").await.unwrap());
    store.commit(permit).await.unwrap();

    let ids: Vec<String> = store
        .list_users()
        .await
        .unwrap()
        .into_iter()
        .map(|user| user.id)
        .collect();
    assert_eq!(ids, vec!["casey", "leonardo"]);
}

#[tokio::test]
async fn user_without_groups() {
    let store = SqliteStore::temporary().await;
    seed_users(&store, &["casey"]).await;
    seed_groups(&store, &["vigilantes"]).await;

    assert!(store.groups_of_user("casey").await.unwrap().is_empty());
    assert!(store.groups_of_user("nobody").await.unwrap().is_empty());
}

#[test]
fn empty_update() {
    assert!(UserUpdate::default().is_empty());
    assert!(
        !UserUpdate {
            first_name: Some("Leo".into()),
            ..Default::default()
        }
        .is_empty()
    );
}
