// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

/// Traits to implement database transaction provider.
///
/// To guard against sharing transactions unknowingly across unrelated database queries, a concept
/// of a "permit" was introduced which does not protect from misuse but helps to make "holding" a
/// transaction explicit.
pub trait Transaction {
    type Error: Error;

    type Permit;

    /// Begins a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Permit, Self::Error>>;

    /// Rolls back the transaction and with that all uncommitted changes.
    fn rollback(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;

    /// Commits the transaction.
    fn commit(&self, permit: Self::Permit) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Scoped acquisition of a transaction.
///
/// Holds the permit from `begin` until the scope is either committed or rolled back. A scope
/// which gets dropped without either (an early return, a cancelled future) drops its permit and
/// with that the unfinished transaction. Nothing written inside such a scope is ever persisted.
pub struct TransactionScope<'s, S>
where
    S: Transaction,
{
    store: &'s S,
    permit: S::Permit,
}

impl<'s, S> TransactionScope<'s, S>
where
    S: Transaction,
{
    pub async fn begin(store: &'s S) -> Result<Self, S::Error> {
        let permit = store.begin().await?;
        Ok(Self { store, permit })
    }

    pub async fn commit(self) -> Result<(), S::Error> {
        self.store.commit(self.permit).await
    }

    pub async fn rollback(self) -> Result<(), S::Error> {
        self.store.rollback(self.permit).await
    }
}
