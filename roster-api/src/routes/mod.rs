// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::Json;
use roster_store::{SqliteError, SqliteStore, TransactionScope};
use serde_json::{Value, json};

pub mod groups;
pub mod users;

/// `GET /`, never requires authentication.
pub async fn health() -> Json<Value> {
    Json(json!({ "health": "okay!" }))
}

/// Commit the scope when the write succeeded, roll it back otherwise.
async fn finish<T>(
    scope: TransactionScope<'_, SqliteStore>,
    result: Result<T, SqliteError>,
) -> Result<T, SqliteError> {
    match result {
        Ok(value) => {
            scope.commit().await?;
            Ok(value)
        }
        Err(err) => {
            scope.rollback().await?;
            Err(err)
        }
    }
}
