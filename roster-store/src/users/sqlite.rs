// SPDX-License-Identifier: MIT OR Apache-2.0

use sqlx::{query, query_as, query_scalar};

use crate::sqlite::{SqliteError, SqliteStore, timestamp_now};
use crate::users::{User, UserStore, UserUpdate};

impl UserStore for SqliteStore {
    type Error = SqliteError;

    async fn insert_user(
        &self,
        id: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, Self::Error> {
        self.tx(async |tx| {
            query_as::<_, User>(
                "
                INSERT INTO
                    users_v1 (
                        id,
                        first_name,
                        last_name,
                        created_at
                    )
                VALUES
                    (?, ?, ?, ?)
                RETURNING
                    id,
                    first_name,
                    last_name,
                    created_at
                ",
            )
            .bind(id)
            .bind(first_name)
            .bind(last_name)
            .bind(timestamp_now())
            .fetch_one(&mut **tx)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, Self::Error> {
        self.execute(async |pool| {
            query_as::<_, User>(
                "
                SELECT
                    id,
                    first_name,
                    last_name,
                    created_at
                FROM
                    users_v1
                WHERE
                    id = ?
                ",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }

    async fn has_user(&self, id: &str) -> Result<bool, Self::Error> {
        let result = self
            .execute(async |pool| {
                query(
                    "
                    SELECT
                        1
                    FROM
                        users_v1
                    WHERE
                        id = ?
                    ",
                )
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.is_some())
    }

    async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<Option<User>, Self::Error> {
        self.tx(async |tx| {
            query_as::<_, User>(
                "
                UPDATE
                    users_v1
                SET
                    id = COALESCE(?, id),
                    first_name = COALESCE(?, first_name),
                    last_name = COALESCE(?, last_name)
                WHERE
                    id = ?
                RETURNING
                    id,
                    first_name,
                    last_name,
                    created_at
                ",
            )
            .bind(update.id.as_deref())
            .bind(update.first_name.as_deref())
            .bind(update.last_name.as_deref())
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }

    async fn delete_user(&self, id: &str) -> Result<bool, Self::Error> {
        let result = self
            .tx(async |tx| {
                query(
                    "
                    DELETE FROM
                        users_v1
                    WHERE
                        id = ?
                    ",
                )
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(SqliteError::Sqlite)
            })
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, Self::Error> {
        self.execute(async |pool| {
            query_as::<_, User>(
                "
                SELECT
                    id,
                    first_name,
                    last_name,
                    created_at
                FROM
                    users_v1
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

    async fn groups_of_user(&self, id: &str) -> Result<Vec<String>, Self::Error> {
        self.execute(async |pool| {
            query_scalar::<_, String>(
                "
                SELECT
                    groups_v1.name
                FROM
                    memberships_v1
                JOIN groups_v1
                    ON groups_v1.pk = memberships_v1.group_pk
                JOIN users_v1
                    ON users_v1.pk = memberships_v1.user_pk
                WHERE
                    users_v1.id = ?
                ORDER BY
                    groups_v1.name ASC
                ",
            )
            .bind(id)
            .fetch_all(pool)
            .await
            .map_err(SqliteError::Sqlite)
        })
        .await
    }
}
