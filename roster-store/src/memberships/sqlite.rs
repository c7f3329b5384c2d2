// SPDX-License-Identifier: MIT OR Apache-2.0

use sqlx::query;

use crate::dialect::Dialect;
use crate::memberships::{Direction, MembershipStore};
use crate::sqlite::{SqliteError, SqliteStore, timestamp_now};

const MEMBERSHIPS: &str = "memberships_v1";

/// Delete memberships of one fixed entity whose counterpart is not among `keep` keys.
///
/// Binds the fixed key first, followed by the `keep` keys. Without any keys to keep the
/// counterpart table is not joined and all memberships of the fixed entity are deleted.
pub(crate) fn remove_unlisted_statement(
    dialect: Dialect,
    direction: Direction,
    keep: usize,
) -> String {
    let Direction { fixed, counterpart } = direction;

    let mut subquery = format!(
        "SELECT {MEMBERSHIPS}.pk FROM {MEMBERSHIPS} \
         JOIN {fixed_table} ON {fixed_table}.pk = {MEMBERSHIPS}.{fixed_link}",
        fixed_table = fixed.table,
        fixed_link = fixed.link,
    );

    if keep > 0 {
        subquery.push_str(&format!(
            " JOIN {table} ON {table}.pk = {MEMBERSHIPS}.{link}",
            table = counterpart.table,
            link = counterpart.link,
        ));
    }

    subquery.push_str(&format!(
        " WHERE {}.{} = {}",
        fixed.table,
        fixed.key,
        dialect.placeholder(1)
    ));

    if keep > 0 {
        subquery.push_str(&format!(
            " AND {}.{} NOT IN ({})",
            counterpart.table,
            counterpart.key,
            dialect.placeholder_list(2, keep)
        ));
    }

    format!("DELETE FROM {MEMBERSHIPS} WHERE pk IN ({subquery})")
}

/// Insert memberships between one fixed entity and all existing counterparts among `add` keys.
///
/// Binds the creation timestamp first, followed by the fixed key and the `add` keys. Must not be
/// rendered for an empty `add` list.
pub(crate) fn insert_missing_statement(
    dialect: Dialect,
    direction: Direction,
    add: usize,
) -> String {
    let Direction { fixed, counterpart } = direction;

    let target = format!(
        "{MEMBERSHIPS} (created_at, {}, {})",
        fixed.link, counterpart.link
    );
    let source = format!(
        "SELECT {now}, {fixed_table}.pk, {counterpart_table}.pk \
         FROM {fixed_table}, {counterpart_table} \
         WHERE {fixed_table}.{fixed_key} = {key} \
         AND {counterpart_table}.{counterpart_key} IN ({add})",
        now = dialect.placeholder(1),
        key = dialect.placeholder(2),
        add = dialect.placeholder_list(3, add),
        fixed_table = fixed.table,
        fixed_key = fixed.key,
        counterpart_table = counterpart.table,
        counterpart_key = counterpart.key,
    );

    dialect.insert_ignoring_conflicts(&target, &source)
}

impl MembershipStore for SqliteStore {
    type Error = SqliteError;

    async fn remove_unlisted(
        &self,
        direction: Direction,
        key: &str,
        keep: &[&str],
    ) -> Result<u64, Self::Error> {
        let statement = remove_unlisted_statement(self.dialect(), direction, keep.len());

        let result = self
            .tx(async |tx| {
                let mut delete = query(&statement).bind(key);
                for counterpart in keep {
                    delete = delete.bind(*counterpart);
                }
                delete.execute(&mut **tx).await.map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_missing(
        &self,
        direction: Direction,
        key: &str,
        add: &[&str],
    ) -> Result<u64, Self::Error> {
        if add.is_empty() {
            return Ok(0);
        }

        let statement = insert_missing_statement(self.dialect(), direction, add.len());

        let result = self
            .tx(async |tx| {
                let mut insert = query(&statement).bind(timestamp_now()).bind(key);
                for counterpart in add {
                    insert = insert.bind(*counterpart);
                }
                insert.execute(&mut **tx).await.map_err(SqliteError::Sqlite)
            })
            .await?;

        Ok(result.rows_affected())
    }
}
