// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::error::Error as StdError;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::memberships::{Direction, MembershipStore};
use crate::traits::{Transaction, TransactionScope};

/// Outcome of one reconciliation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Memberships which got inserted.
    pub added: u64,

    /// Memberships which got deleted.
    pub removed: u64,

    /// Target keys for which no membership got inserted, because it existed already or because
    /// no entity with that key exists.
    pub unchanged: u64,
}

#[derive(Debug, Error)]
pub enum SyncError<E>
where
    E: StdError + 'static,
{
    /// A membership statement failed, nothing got changed.
    #[error("membership statement failed")]
    Store(#[source] E),

    /// Committing the reconciliation failed, nothing got changed.
    #[error("committing memberships failed")]
    Transaction(#[source] E),

    /// A membership statement failed and rolling back the transaction failed as well.
    #[error("membership statement failed and rolling back failed: {rollback}")]
    Rollback {
        #[source]
        statement: E,
        rollback: E,
    },
}

/// Sets the memberships of a user or a group to exactly a given set.
///
/// Every reconciliation runs in its own transaction. Concurrent reconciliations are serialized by
/// the store's transaction permits, the later one sees the outcome of the earlier one.
#[derive(Clone, Debug)]
pub struct Reconciler<S> {
    store: S,
}

impl<S, E> Reconciler<S>
where
    S: Transaction<Error = E> + MembershipStore<Error = E>,
    E: StdError + 'static,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Set the members of the group `name` to exactly the users with the given ids.
    pub async fn sync_group_members<T>(
        &self,
        name: &str,
        user_ids: &[T],
    ) -> Result<SyncReport, SyncError<E>>
    where
        T: AsRef<str>,
    {
        self.sync(Direction::GROUP_MEMBERS, name, user_ids).await
    }

    /// Set the groups of the user `id` to exactly the groups with the given names.
    pub async fn sync_user_groups<T>(
        &self,
        id: &str,
        group_names: &[T],
    ) -> Result<SyncReport, SyncError<E>>
    where
        T: AsRef<str>,
    {
        self.sync(Direction::USER_GROUPS, id, group_names).await
    }

    /// Reconcile the memberships of the fixed entity `key` with the `targets` counterpart keys.
    ///
    /// Memberships towards counterparts not listed get deleted, missing ones towards existing
    /// counterparts get inserted. Target keys are treated as a set, unknown ones are ignored.
    /// When `key` does not name an existing entity nothing is changed.
    ///
    /// On error the transaction is rolled back and the memberships are left as they were.
    pub async fn sync<T>(
        &self,
        direction: Direction,
        key: &str,
        targets: &[T],
    ) -> Result<SyncReport, SyncError<E>>
    where
        T: AsRef<str>,
    {
        let targets: Vec<&str> = targets
            .iter()
            .map(AsRef::as_ref)
            .collect::<BTreeSet<&str>>()
            .into_iter()
            .collect();

        let scope = TransactionScope::begin(&self.store)
            .await
            .map_err(SyncError::Store)?;

        let removed = match self.store.remove_unlisted(direction, key, &targets).await {
            Ok(removed) => removed,
            Err(err) => return Err(abort(scope, err).await),
        };

        let added = if targets.is_empty() {
            0
        } else {
            match self.store.insert_missing(direction, key, &targets).await {
                Ok(added) => added,
                Err(err) => return Err(abort(scope, err).await),
            }
        };

        scope.commit().await.map_err(SyncError::Transaction)?;

        let report = SyncReport {
            added,
            removed,
            unchanged: (targets.len() as u64).saturating_sub(added),
        };

        debug!(
            fixed = direction.fixed.table,
            %key,
            added = report.added,
            removed = report.removed,
            unchanged = report.unchanged,
            "reconciled memberships"
        );

        Ok(report)
    }
}

async fn abort<S>(scope: TransactionScope<'_, S>, err: S::Error) -> SyncError<S::Error>
where
    S: Transaction,
    S::Error: 'static,
{
    match scope.rollback().await {
        Ok(()) => SyncError::Store(err),
        Err(rollback) => {
            warn!(%err, %rollback, "rolling back failed membership statement failed");
            SyncError::Rollback {
                statement: err,
                rollback,
            }
        }
    }
}
