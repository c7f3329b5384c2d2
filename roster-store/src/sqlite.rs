// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, migrate};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::dialect::Dialect;

/// Create SQLite database if it doesn't already exist.
pub async fn create_database(url: &str) -> Result<(), SqliteError> {
    if !Sqlite::database_exists(url).await? {
        Sqlite::create_database(url).await?
    }
    Ok(())
}

/// Create SQLite connection pool.
pub async fn connection_pool(
    url: &str,
    max_connections: u32,
) -> Result<sqlx::SqlitePool, SqliteError> {
    let pool: sqlx::SqlitePool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Get migrations from folder without running them.
pub fn migrations() -> Migrator {
    migrate!()
}

/// Run any pending database migrations from inside the application.
pub async fn run_pending_migrations(pool: &sqlx::SqlitePool) -> Result<(), SqliteError> {
    migrations().run(pool).await?;
    Ok(())
}

/// Seconds since the UNIX epoch, used for `created_at` columns.
pub(crate) fn timestamp_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
        })
}

pub struct SqliteStoreBuilder {
    url: String,
    max_connections: u32,
    run_migrations: bool,
    create_database: bool,
    dialect: Dialect,
}

impl Default for SqliteStoreBuilder {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".into(),
            max_connections: 16,
            create_database: true,
            run_migrations: true,
            dialect: Dialect::SQLITE,
        }
    }
}

impl SqliteStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn random_memory_url(mut self) -> Self {
        // Combining Rust tests with in-memory databases can lead to unsound behaviour, this
        // "workaround" assigns every temporary database a different, random name and keeps them
        // isolated from other tests.
        //
        // See related issue: https://github.com/launchbadge/sqlx/issues/2510
        self.url = format!(
            "sqlite://dbmem{}?mode=memory&cache=private",
            rand::random::<u32>()
        );
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn create_database(mut self, create_database: bool) -> Self {
        self.create_database = create_database;
        self
    }

    pub fn run_default_migrations(mut self, run_migrations: bool) -> Self {
        self.run_migrations = run_migrations;
        self
    }

    /// Statement flavour used for conflict-ignoring inserts and bind parameters.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub async fn build(self) -> Result<SqliteStore, SqliteError> {
        if self.create_database {
            create_database(&self.url).await?;
        }

        let pool = connection_pool(&self.url, self.max_connections).await?;

        if self.run_migrations {
            run_pending_migrations(&pool).await?;
        }

        debug!(max_connections = self.max_connections, dialect = ?self.dialect, "opened store");

        Ok(SqliteStore::new(pool, self.dialect))
    }
}

pub type Transaction = sqlx::Transaction<'static, Sqlite>;

/// SQLite database with connection pool and transaction provider.
///
/// This struct can be cloned and used in multiple places in the application. Every cloned instance
/// will re-use the same connection pool and have access to the same transaction instance if one
/// was started. To guard against sharing transactions unknowingly across unrelated database
/// queries, a concept of a `TransactionPermit` was introduced which does not protect from misuse
/// but helps to make "holding" a transaction explicit.
///
/// SQLite strictly serializes transactions with _writes_ and will block any parallel attempt to
/// begin another one. Processes starting a transaction acquire a `TransactionPermit` and keep it
/// until the transaction was committed or rolled back. Queries which only _read_ committed state
/// go through `execute` and never wait for a permit.
///
/// ```text
/// Transaction I:
/// begin ---------------------> commit
///
/// Process I:
///       --> write --> read -->
///
///                                             Transaction II:
///                                             begin ----------------------> commit
///
///                                             Process II:
///                                                   --> write --> write -->
/// ```
///
/// Higher-level store traits (`UserStore`, `GroupStore`, `MembershipStore`) never take a
/// transaction argument. Their writes run inside whatever transaction is currently held and fail
/// with `SqliteError::TransactionMissing` if there is none.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    tx: Arc<Mutex<Option<Transaction>>>,
    pool: sqlx::SqlitePool,
    semaphore: Arc<Semaphore>,
    dialect: Dialect,
}

impl SqliteStore {
    pub(crate) fn new(pool: sqlx::SqlitePool, dialect: Dialect) -> Self {
        Self {
            tx: Arc::default(),
            pool,
            // SQLite only ever allows _one_ writing transaction at a time. This might be a
            // repetition of what sqlx and SQLite do under the hood, but we want to make this
            // behaviour explicit right from the beginning with this semaphore.
            semaphore: Arc::new(Semaphore::new(1)),
            dialect,
        }
    }

    /// Shortcut building an in-memory SQLite database with a randomised name for testing purposes.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn temporary() -> Self {
        Self::temporary_with_dialect(Dialect::SQLITE).await
    }

    /// Same as `temporary` but rendering statements in the given dialect.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn temporary_with_dialect(dialect: Dialect) -> Self {
        SqliteStoreBuilder::new()
            .random_memory_url()
            .max_connections(1)
            .dialect(dialect)
            .build()
            .await
            .expect("migrations succeeded")
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Close all pooled connections, waiting for checked out ones to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Execute SQL query within transaction.
    ///
    /// This method will return an error when no transaction is currently given. Make sure to call
    /// `begin` before.
    ///
    /// If the query fails the user probably wants to roll back the transaction and free the
    /// permit. This is _not_ handled automatically, see `TransactionScope` for that.
    pub async fn tx<F, R>(&self, f: F) -> Result<R, SqliteError>
    where
        F: AsyncFnOnce(&mut Transaction) -> Result<R, SqliteError>,
    {
        let mut tx_ref = self.tx.lock().await;
        let tx = tx_ref.as_mut().ok_or(SqliteError::TransactionMissing)?;

        f(tx).await
    }

    /// Execute SQL query directly.
    pub async fn execute<F, R>(&self, f: F) -> Result<R, SqliteError>
    where
        F: AsyncFnOnce(&sqlx::SqlitePool) -> Result<R, SqliteError>,
    {
        f(&self.pool).await
    }
}

impl crate::traits::Transaction for SqliteStore {
    type Error = SqliteError;

    type Permit = TransactionPermit;

    /// Begins a transaction.
    ///
    /// Transactions are strictly serialized, this is expressed in form of a `TransactionPermit`
    /// processes need to hold when acquiring access to a new transaction. Any concurrent process
    /// calling it will await here if there's already another process holding a permit.
    ///
    /// A dropped permit discards its unfinished transaction right away (see `TransactionPermit`).
    /// When that was not possible, the transaction is still present after the permit was
    /// acquired and gets rolled back here before anything else happens.
    async fn begin(&self) -> Result<TransactionPermit, SqliteError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SqliteError::Closed)?;

        // Access the transaction object which we've placed behind a Mutex. This lock follows a
        // different logic and only makes sure that mutable access to it is exclusive _within_ a
        // process "holding" the transaction permit.
        let mut tx_ref = self.tx.lock().await;
        if let Some(abandoned) = tx_ref.take() {
            warn!("rolling back transaction abandoned by its previous holder");
            abandoned.rollback().await?;
        }

        let tx = self.pool.begin().await?;
        tx_ref.replace(tx);

        Ok(TransactionPermit {
            _permit: permit,
            slot: self.tx.clone(),
        })
    }

    /// Rolls back the transaction and with that all uncommitted changes.
    ///
    /// This takes the permit and frees it after the rollback has finished. Other processes can now
    /// begin new transactions.
    async fn rollback(&self, permit: TransactionPermit) -> Result<(), SqliteError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(SqliteError::TransactionMissing)?;

        let result = tx.rollback().await.map_err(SqliteError::Sqlite);

        // Always drop the permit, both on successful rollback and error. This will allow other
        // processes now to begin a new transaction and acquire the permit.
        drop(permit);

        result
    }

    /// Commits the transaction.
    ///
    /// This takes the permit and frees it after the commit has finished. Other processes can now
    /// begin new transactions.
    async fn commit(&self, permit: TransactionPermit) -> Result<(), SqliteError> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(SqliteError::TransactionMissing)?;

        let result = tx.commit().await.map_err(SqliteError::Sqlite);

        drop(permit);

        result
    }
}

/// Exclusive right to use the store's transaction, handed out by `begin`.
///
/// Dropping a permit without passing it to `commit` or `rollback` discards the unfinished
/// transaction. Its connection gets rolled back before returning to the pool, so neither the
/// connection nor the database write lock stay taken by a cancelled holder.
pub struct TransactionPermit {
    _permit: OwnedSemaphorePermit,
    slot: Arc<Mutex<Option<Transaction>>>,
}

impl Drop for TransactionPermit {
    fn drop(&mut self) {
        // `commit` and `rollback` empty the slot before the permit goes away. The lock is only
        // contended by queries of other store clones, `begin` catches what is left then.
        if let Ok(mut slot) = self.slot.try_lock() {
            if slot.take().is_some() {
                warn!("discarded transaction of a dropped permit");
            }
        }
    }
}

impl fmt::Debug for TransactionPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionPermit").finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum SqliteError {
    /// This is a critical error as it indicates that something is wrong with the usage of this
    /// API: Queries using transactions can only ever occur if a transaction was started _before_.
    #[error("tried to interact with inexistant transaction")]
    TransactionMissing,

    /// The permit semaphore was closed, no transactions can be started anymore.
    #[error("transaction provider is closed")]
    Closed,

    /// SQLite database and connection error.
    #[error(transparent)]
    Sqlite(#[from] sqlx::Error),

    /// SQL table schema migration error.
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl SqliteError {
    /// Returns `true` if a UNIQUE constraint rejected the statement.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            SqliteError::Sqlite(sqlx::Error::Database(err)) => err.is_unique_violation(),
            _ => false,
        }
    }
}
