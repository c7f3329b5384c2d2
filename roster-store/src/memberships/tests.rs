// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use sqlx::query;
use thiserror::Error;
use tokio::time::timeout;

use crate::assert_all_dialects;
use crate::dialect::Dialect;
use crate::groups::GroupStore;
use crate::memberships::sqlite::{insert_missing_statement, remove_unlisted_statement};
use crate::memberships::{Direction, MembershipStore, Reconciler, SyncError, SyncReport};
use crate::sqlite::{SqliteError, SqliteStore};
use crate::test_utils::{seed_groups, seed_users, setup_logging};
use crate::traits::{Transaction, TransactionScope};
use crate::users::UserStore;

fn report(added: u64, removed: u64, unchanged: u64) -> SyncReport {
    SyncReport {
        added,
        removed,
        unchanged,
    }
}

async fn seed(store: &SqliteStore) {
    seed_users(store, &["u1", "u2", "u3", "u4"]).await;
    seed_groups(store, &["g1", "g2", "g3"]).await;
}

#[derive(Debug, Error)]
#[error("{0}")]
struct BrokenStoreError(&'static str);

/// Store whose inserts and rollbacks always fail.
struct BrokenStore;

impl Transaction for BrokenStore {
    type Error = BrokenStoreError;

    type Permit = ();

    async fn begin(&self) -> Result<(), BrokenStoreError> {
        Ok(())
    }

    async fn rollback(&self, _permit: ()) -> Result<(), BrokenStoreError> {
        Err(BrokenStoreError("connection lost"))
    }

    async fn commit(&self, _permit: ()) -> Result<(), BrokenStoreError> {
        Ok(())
    }
}

impl MembershipStore for BrokenStore {
    type Error = BrokenStoreError;

    async fn remove_unlisted(
        &self,
        _direction: Direction,
        _key: &str,
        _keep: &[&str],
    ) -> Result<u64, BrokenStoreError> {
        Ok(0)
    }

    async fn insert_missing(
        &self,
        _direction: Direction,
        _key: &str,
        _add: &[&str],
    ) -> Result<u64, BrokenStoreError> {
        Err(BrokenStoreError("disk full"))
    }
}

#[test]
fn rendered_statements() {
    assert_eq!(
        remove_unlisted_statement(Dialect::SQLITE, Direction::GROUP_MEMBERS, 2),
        "DELETE FROM memberships_v1 WHERE pk IN (\
         SELECT memberships_v1.pk FROM memberships_v1 \
         JOIN groups_v1 ON groups_v1.pk = memberships_v1.group_pk \
         JOIN users_v1 ON users_v1.pk = memberships_v1.user_pk \
         WHERE groups_v1.name = ? AND users_v1.id NOT IN (?, ?))"
    );

    // Nothing to keep, no need to look at the counterparts at all.
    assert_eq!(
        remove_unlisted_statement(Dialect::POSTGRES, Direction::USER_GROUPS, 0),
        "DELETE FROM memberships_v1 WHERE pk IN (\
         SELECT memberships_v1.pk FROM memberships_v1 \
         JOIN users_v1 ON users_v1.pk = memberships_v1.user_pk \
         WHERE users_v1.id = $1)"
    );

    assert_eq!(
        insert_missing_statement(Dialect::SQLITE, Direction::GROUP_MEMBERS, 1),
        "INSERT OR IGNORE INTO memberships_v1 (created_at, group_pk, user_pk) \
         SELECT ?, groups_v1.pk, users_v1.pk FROM groups_v1, users_v1 \
         WHERE groups_v1.name = ? AND users_v1.id IN (?)"
    );

    assert_eq!(
        insert_missing_statement(Dialect::POSTGRES, Direction::USER_GROUPS, 2),
        "INSERT INTO memberships_v1 (created_at, user_pk, group_pk) \
         SELECT $1, users_v1.pk, groups_v1.pk FROM users_v1, groups_v1 \
         WHERE users_v1.id = $2 AND groups_v1.name IN ($3, $4) \
         ON CONFLICT DO NOTHING"
    );
}

#[test]
fn reversed_direction() {
    assert_eq!(Direction::USER_GROUPS.fixed.table, "users_v1");
    assert_eq!(Direction::USER_GROUPS.counterpart.table, "groups_v1");
    assert_eq!(Direction::GROUP_MEMBERS.reversed(), Direction::USER_GROUPS);
    assert_eq!(Direction::USER_GROUPS.reversed(), Direction::GROUP_MEMBERS);
}

#[tokio::test]
async fn same_counts_in_both_directions() {
    assert_all_dialects!(|store| async {
        seed_users(&store, &["u1", "u2"]).await;
        seed_groups(&store, &["g1", "g2"]).await;
        let reconciler = Reconciler::new(store.clone());

        let expected = [
            report(2, 0, 0),
            report(0, 0, 2),
            report(0, 1, 1),
            report(1, 0, 1),
        ];

        for (targets, expected) in [&["u1", "u2"][..], &["u1", "u2"][..], &["u1"][..], &["u1", "u2"][..]]
            .into_iter()
            .zip(expected)
        {
            let result = reconciler.sync_group_members("g1", targets).await.unwrap();
            assert_eq!(result, expected);
        }

        // Same sequence with the roles of users and groups swapped.
        reconciler.sync_group_members("g1", &[] as &[&str]).await.unwrap();
        for (targets, expected) in [&["g1", "g2"][..], &["g1", "g2"][..], &["g1"][..], &["g1", "g2"][..]]
            .into_iter()
            .zip(expected)
        {
            let result = reconciler.sync_user_groups("u1", targets).await.unwrap();
            assert_eq!(result, expected);
        }
    });
}

#[tokio::test]
async fn group_members_step_by_step() {
    setup_logging();

    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        let steps: [(&[&str], SyncReport); 6] = [
            (&["u1", "u2"], report(2, 0, 0)),
            (&["u1", "u2"], report(0, 0, 2)),
            (&["u1", "u3"], report(1, 1, 1)),
            (&["u2", "u3", "u4"], report(2, 1, 1)),
            (&["u4"], report(0, 2, 1)),
            (&[], report(0, 1, 0)),
        ];

        for (targets, expected) in steps {
            let result = reconciler.sync_group_members("g1", targets).await.unwrap();
            assert_eq!(result, expected, "syncing {targets:?}");
            assert_eq!(store.members_of_group("g1").await.unwrap(), targets);
        }
    });
}

#[tokio::test]
async fn user_groups_step_by_step() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        let steps: [(&[&str], SyncReport); 5] = [
            (&["g1", "g2"], report(2, 0, 0)),
            (&["g1", "g2"], report(0, 0, 2)),
            (&["g2", "g3"], report(1, 1, 1)),
            (&["g3"], report(0, 1, 1)),
            (&[], report(0, 1, 0)),
        ];

        for (targets, expected) in steps {
            let result = reconciler.sync_user_groups("u1", targets).await.unwrap();
            assert_eq!(result, expected, "syncing {targets:?}");
            assert_eq!(store.groups_of_user("u1").await.unwrap(), targets);
        }
    });
}

#[tokio::test]
async fn counts_add_up() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        let targets: [&[&str]; 5] = [&["u3"], &["u1", "u2", "u3"], &[], &["u4", "u2"], &["u2"]];

        let mut before = 0;
        for targets in targets {
            let result = reconciler.sync_group_members("g2", targets).await.unwrap();
            let after = store.members_of_group("g2").await.unwrap().len() as u64;

            assert_eq!(after, before + result.added - result.removed);
            assert_eq!(result.added + result.unchanged, targets.len() as u64);
            before = after;
        }
    });
}

#[tokio::test]
async fn other_memberships_untouched() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler
            .sync_group_members("g1", &["u1", "u2"])
            .await
            .unwrap();
        reconciler
            .sync_group_members("g2", &["u1", "u2"])
            .await
            .unwrap();

        assert_eq!(
            reconciler.sync_group_members("g1", &["u3"]).await.unwrap(),
            report(1, 2, 0)
        );
        assert_eq!(store.members_of_group("g2").await.unwrap(), ["u1", "u2"]);
        assert_eq!(store.groups_of_user("u1").await.unwrap(), ["g2"]);
    });
}

#[tokio::test]
async fn both_directions_share_memberships() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler.sync_group_members("g1", &["u1"]).await.unwrap();

        // The membership created through the group is seen from the user.
        assert_eq!(
            reconciler
                .sync_user_groups("u1", &["g1", "g2"])
                .await
                .unwrap(),
            report(1, 0, 1)
        );

        assert_eq!(
            reconciler.sync_user_groups("u1", &["g2"]).await.unwrap(),
            report(0, 1, 1)
        );
        assert!(store.members_of_group("g1").await.unwrap().is_empty());
        assert_eq!(store.members_of_group("g2").await.unwrap(), ["u1"]);
    });
}

#[tokio::test]
async fn unknown_keys_are_ignored() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        assert_eq!(
            reconciler
                .sync_group_members("g1", &["u1", "shredder"])
                .await
                .unwrap(),
            report(1, 0, 1)
        );
        assert_eq!(store.members_of_group("g1").await.unwrap(), ["u1"]);

        // Nothing to reconcile for a group which does not exist.
        assert_eq!(
            reconciler
                .sync_group_members("foot clan", &["u1", "u2"])
                .await
                .unwrap(),
            report(0, 0, 2)
        );
        assert_eq!(store.groups_of_user("u1").await.unwrap(), ["g1"]);
        assert!(store.groups_of_user("u2").await.unwrap().is_empty());
    });
}

#[tokio::test]
async fn duplicate_targets() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        let targets = vec!["u2".to_string(), "u1".to_string(), "u2".to_string()];
        assert_eq!(
            reconciler.sync_group_members("g1", &targets).await.unwrap(),
            report(2, 0, 0)
        );
        assert_eq!(
            reconciler.sync_group_members("g1", &targets).await.unwrap(),
            report(0, 0, 2)
        );
        assert_eq!(store.members_of_group("g1").await.unwrap(), ["u1", "u2"]);
    });
}

#[tokio::test]
async fn failed_insert_rolls_back_delete() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler
            .sync_group_members("g1", &["u1", "u2"])
            .await
            .unwrap();

        store
            .execute(async |pool| {
                query(
                    "
                    CREATE TRIGGER reject_memberships
                    BEFORE INSERT ON memberships_v1
                    BEGIN
                        SELECT RAISE(ABORT, 'memberships are read-only');
                    END
                    ",
                )
                .execute(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await
            .unwrap();

        // Removing u2 succeeds, adding u3 fails afterwards.
        let err = reconciler
            .sync_group_members("g1", &["u1", "u3"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "membership statement failed");
        assert!(matches!(err, SyncError::Store(SqliteError::Sqlite(_))));
        assert_eq!(store.members_of_group("g1").await.unwrap(), ["u1", "u2"]);

        // The store is usable again, a pure removal does not hit the trigger.
        assert_eq!(
            reconciler.sync_group_members("g1", &[] as &[&str]).await.unwrap(),
            report(0, 2, 0)
        );
    });
}

#[tokio::test]
async fn abandoned_scope_changes_nothing() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler
            .sync_group_members("g1", &["u1", "u2"])
            .await
            .unwrap();

        {
            let _scope = TransactionScope::begin(&store).await.unwrap();
            let removed = store
                .remove_unlisted(Direction::GROUP_MEMBERS, "g1", &[])
                .await
                .unwrap();
            assert_eq!(removed, 2);
            // Dropped here, like a reconciliation cancelled between its two statements.
        }

        assert_eq!(
            reconciler
                .sync_group_members("g1", &["u1", "u2"])
                .await
                .unwrap(),
            report(0, 0, 2)
        );
    });
}

#[tokio::test]
async fn abandoned_scope_releases_connection() {
    setup_logging();

    // A single pooled connection, reads wait for it like writes do.
    let store = SqliteStore::temporary().await;
    seed(&store).await;
    let reconciler = Reconciler::new(store.clone());

    reconciler
        .sync_group_members("g1", &["u1", "u2"])
        .await
        .unwrap();

    {
        let _scope = TransactionScope::begin(&store).await.unwrap();
        store
            .remove_unlisted(Direction::GROUP_MEMBERS, "g1", &[])
            .await
            .unwrap();
    }

    let members = timeout(Duration::from_secs(3), store.members_of_group("g1"))
        .await
        .expect("dropped scope still holds the connection")
        .unwrap();
    assert_eq!(members, ["u1", "u2"]);
}

#[tokio::test]
async fn failed_commit_changes_nothing() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler.sync_group_members("g1", &["u1"]).await.unwrap();

        // Every inserted membership leaves a dangling audit row behind. The foreign key is only
        // checked on commit, so both statements succeed and committing fails.
        store
            .execute(async |pool| {
                for statement in [
                    "CREATE TABLE auditors (pk INTEGER PRIMARY KEY)",
                    "
                    CREATE TABLE membership_audit (
                        auditor_pk INTEGER NOT NULL
                            REFERENCES auditors(pk) DEFERRABLE INITIALLY DEFERRED
                    )
                    ",
                    "
                    CREATE TRIGGER audit_memberships
                    AFTER INSERT ON memberships_v1
                    BEGIN
                        INSERT INTO membership_audit (auditor_pk) VALUES (NEW.user_pk);
                    END
                    ",
                ] {
                    query(statement).execute(pool).await?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let result = reconciler.sync_group_members("g1", &["u1", "u2"]).await;
        assert!(matches!(
            result,
            Err(SyncError::Transaction(SqliteError::Sqlite(_)))
        ));
        assert_eq!(store.members_of_group("g1").await.unwrap(), ["u1"]);

        // Nothing gets inserted, the commit goes through.
        assert_eq!(
            reconciler.sync_group_members("g1", &[] as &[&str]).await.unwrap(),
            report(0, 1, 0)
        );
    });
}

#[tokio::test]
async fn failed_rollback_keeps_statement_error() {
    let result = Reconciler::new(BrokenStore)
        .sync_group_members("g1", &["u1"])
        .await;
    let Err(err) = result else {
        panic!("reconciliation against a broken store succeeded");
    };

    assert_eq!(
        err.to_string(),
        "membership statement failed and rolling back failed: connection lost"
    );
    assert_eq!(
        std::error::Error::source(&err).map(ToString::to_string),
        Some("disk full".to_string())
    );
    assert!(matches!(
        err,
        SyncError::Rollback {
            statement: BrokenStoreError("disk full"),
            rollback: BrokenStoreError("connection lost"),
        }
    ));
}

#[tokio::test]
async fn concurrent_reconciliations_are_serialized() {
    let store = SqliteStore::temporary().await;
    seed(&store).await;

    let first = Reconciler::new(store.clone());
    let second = Reconciler::new(store.clone());

    let (a, b) = tokio::join!(
        first.sync_group_members("g1", &["u1", "u2"]),
        second.sync_group_members("g1", &["u3"]),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let members = store.members_of_group("g1").await.unwrap();
    if members == ["u3"] {
        assert_eq!(a, report(2, 0, 0));
        assert_eq!(b, report(1, 2, 0));
    } else {
        assert_eq!(members, ["u1", "u2"]);
        assert_eq!(b, report(1, 0, 0));
        assert_eq!(a, report(2, 1, 0));
    }
}

#[tokio::test]
async fn deleting_entities_removes_memberships() {
    assert_all_dialects!(|store| async {
        seed(&store).await;
        let reconciler = Reconciler::new(store.clone());

        reconciler
            .sync_group_members("g1", &["u1", "u2"])
            .await
            .unwrap();
        reconciler.sync_user_groups("u2", &["g1", "g2"]).await.unwrap();

        let scope = TransactionScope::begin(&store).await.unwrap();
        assert!(store.delete_user("u2").await.unwrap());
        assert!(store.delete_group("g2").await.unwrap());
        scope.commit().await.unwrap();

        assert_eq!(store.members_of_group("g1").await.unwrap(), ["u1"]);
        assert_eq!(store.groups_of_user("u1").await.unwrap(), ["g1"]);

        // A recreated user starts without memberships.
        seed_users(&store, &["u2"]).await;
        assert!(store.groups_of_user("u2").await.unwrap().is_empty());
    });
}
