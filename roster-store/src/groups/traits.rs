// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Group as it is stored in the database, identified by its unique `name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub name: String,
    pub created_at: i64,
}

/// Interface for creating, deleting and querying groups.
pub trait GroupStore {
    type Error: Error;

    /// Insert a new, empty group.
    ///
    /// Fails with a unique constraint violation if the name is already taken.
    fn insert_group(&self, name: &str) -> impl Future<Output = Result<Group, Self::Error>>;

    fn get_group(&self, name: &str) -> impl Future<Output = Result<Option<Group>, Self::Error>>;

    fn has_group(&self, name: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Delete a group together with all of its memberships.
    ///
    /// Returns `true` when the removal occurred and `false` when the group was not found.
    fn delete_group(&self, name: &str) -> impl Future<Output = Result<bool, Self::Error>>;

    fn list_groups(&self) -> impl Future<Output = Result<Vec<Group>, Self::Error>>;

    /// Ids of all users which are members of the group, sorted by id.
    fn members_of_group(&self, name: &str)
    -> impl Future<Output = Result<Vec<String>, Self::Error>>;
}
