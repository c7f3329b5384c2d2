// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::groups::GroupStore;
use crate::sqlite::SqliteStore;
use crate::traits::Transaction;
use crate::users::UserStore;

/// Print logs of tests when `RUST_LOG` is set.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Create users with the given ids and derived names, all in one transaction.
pub async fn seed_users(store: &SqliteStore, ids: &[&str]) {
    let permit = store.begin().await.unwrap();
    for id in ids {
        store
            .insert_user(id, &format!("{id} first"), &format!("{id} last"))
            .await
            .unwrap();
    }
    store.commit(permit).await.unwrap();
}

/// Create empty groups with the given names, all in one transaction.
pub async fn seed_groups(store: &SqliteStore, names: &[&str]) {
    let permit = store.begin().await.unwrap();
    for name in names {
        store.insert_group(name).await.unwrap();
    }
    store.commit(permit).await.unwrap();
}

/// Macro to run the same test logic against a temporary store for every statement dialect.
///
/// ## Example
///
/// ```rust
/// # use roster_store::assert_all_dialects;
/// # use roster_store::users::UserStore;
/// # async fn run() {
/// assert_all_dialects!(|store| async {
///     assert!(store.list_users().await.unwrap().is_empty());
/// });
/// # }
/// ```
#[macro_export]
macro_rules! assert_all_dialects {
    (|$store:ident| $test_body:expr) => {
        for dialect in [$crate::Dialect::SQLITE, $crate::Dialect::POSTGRES] {
            let $store = $crate::SqliteStore::temporary_with_dialect(dialect).await;
            $test_body.await;
        }
    };
}
