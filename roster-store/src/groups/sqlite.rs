// SPDX-License-Identifier: MIT OR Apache-2.0

use sqlx::{query, query_as, query_scalar};

use crate::groups::{Group, GroupStore};
use crate::sqlite::{SqliteError, SqliteStore, timestamp_now};

impl GroupStore for SqliteStore {
    type Error = SqliteError;

    async fn insert_group(&self, name: &str) -> Result<Group, Self::Error> {
        self.tx(async |tx| {
            query_as::<_, Group>(
                "
                INSERT INTO
                    groups_v1 (
                        name,
                        created_at
                    )
                VALUES
                    (?, ?)
                RETURNING
                    name,
                    created_at
                ",
            )
            .bind(name)
            .bind(timestamp_now())
            .fetch_one(&mut **tx)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }

    async fn get_group(&self, name: &str) -> Result<Option<Group>, Self::Error> {
        self.execute(async |pool| {
            query_as::<_, Group>(
                "
                SELECT
                    name,
                    created_at
                FROM
                    groups_v1
                WHERE
                    name = ?
                ",
            )
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }

    async fn has_group(&self, name: &str) -> Result<bool, Self::Error> {
        let result = self
            .execute(async |pool| {
                query(
                    "
                    SELECT
                        1
                    FROM
                        groups_v1
                    WHERE
                        name = ?
                    ",
                )
                .bind(name)
                .fetch_optional(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.is_some())
    }

    async fn delete_group(&self, name: &str) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        groups_v1
                    WHERE
                        name = ?
                    ",
                )
                .bind(name)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, Self::Error> {
        self.execute(async |pool| {
            query_as::<_, Group>(
                "
                SELECT
                    name,
                    created_at
                FROM
                    groups_v1
                ORDER BY
                    pk ASC
                ",
            )
            .fetch_all(pool)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }

    async fn members_of_group(&self, name: &str) -> Result<Vec<String>, Self::Error> {
        self.execute(async |pool| {
            query_scalar::<_, String>(
                "
                SELECT
                    users_v1.id
                FROM
                    memberships_v1
                JOIN users_v1
                    ON users_v1.pk = memberships_v1.user_pk
                JOIN groups_v1
                    ON groups_v1.pk = memberships_v1.group_pk
                WHERE
                    groups_v1.name = ?
                ORDER BY
                    users_v1.id ASC
                ",
            )
            .bind(name)
            .fetch_all(pool)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }
}
