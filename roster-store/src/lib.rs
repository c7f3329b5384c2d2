// SPDX-License-Identifier: MIT OR Apache-2.0

#![cfg_attr(doctest, doc=include_str!("../README.md"))]

//! Persistence of users, groups and their memberships on top of SQLite.
//!
//! Users are identified by a unique, mutable `id`, groups by a unique `name`. Memberships relate
//! one user with one group and are never written directly: the `Reconciler` sets all memberships
//! of one group (or of one user) to exactly a given set of keys and reports how many got added,
//! removed or stayed as they were.
//!
//! ## Write transactions
//!
//! All writes need a transaction which is begun and committed explicitly through the
//! `Transaction` trait. Only one transaction can be held at a time, every other process calling
//! `begin` waits until the current holder committed or rolled back. A holder which goes away
//! without doing either (for example a cancelled request) does not leave anything behind, its
//! changes get rolled back before the next transaction begins.
//!
//! ```rust
//! # use roster_store::{SqliteStore, Transaction, Reconciler};
//! # use roster_store::groups::GroupStore;
//! # use roster_store::users::UserStore;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = SqliteStore::temporary().await;
//!
//! let permit = store.begin().await.unwrap();
//! store.insert_user("april", "April", "O'Neil").await.unwrap();
//! store.insert_group("reporters").await.unwrap();
//! store.commit(permit).await.unwrap();
//!
//! let reconciler = Reconciler::new(store.clone());
//! let report = reconciler
//!     .sync_group_members("reporters", &["april"])
//!     .await
//!     .unwrap();
//! assert_eq!(report.added, 1);
//! # }
//! ```
pub mod dialect;
pub mod groups;
pub mod memberships;
pub mod sqlite;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;
pub mod users;

pub use dialect::Dialect;
pub use memberships::{Direction, Reconciler, SyncError, SyncReport};
pub use sqlite::{SqliteError, SqliteStore, SqliteStoreBuilder};
pub use traits::{Transaction, TransactionScope};
