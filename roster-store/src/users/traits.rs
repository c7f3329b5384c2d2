// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User as it is stored in the database, identified by its external `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: i64,
}

/// Fields to change on an existing user, `None` leaves the field as it is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }
}

/// Interface for creating, changing and querying users.
///
/// Writes are executed within the currently held transaction.
pub trait UserStore {
    type Error: Error;

    /// Insert a new user.
    ///
    /// Fails with a unique constraint violation if a user with the same id already exists.
    fn insert_user(
        &self,
        id: &str,
        first_name: &str,
        last_name: &str,
    ) -> impl Future<Output = Result<User, Self::Error>>;

    /// Get a user by id.
    fn get_user(&self, id: &str) -> impl Future<Output = Result<Option<User>, Self::Error>>;

    /// Query the existence of a user.
    fn has_user(&self, id: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Apply the given changes to a user.
    ///
    /// Returns the changed user or `None` if no user with that id was found.
    fn update_user(
        &self,
        id: &str,
        update: &UserUpdate,
    ) -> impl Future<Output = Result<Option<User>, Self::Error>>;

    /// Delete a user together with all of its memberships.
    ///
    /// Returns `true` when the removal occurred and `false` when the user was not found.
    fn delete_user(&self, id: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    /// All users in order of creation.
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>, Self::Error>>;

    /// Names of all groups the user is a member of, sorted by name.
    fn groups_of_user(&self, id: &str) -> impl Future<Output = Result<Vec<String>, Self::Error>>;
}
