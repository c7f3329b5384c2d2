// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::memberships::Direction;

/// Write statements the `Reconciler` is built from.
///
/// Both statements are executed within the currently held transaction and identify entities by
/// their external keys only.
pub trait MembershipStore {
    type Error: Error;

    /// Delete every membership of the fixed entity `key` whose counterpart key is not contained
    /// in `keep`. An empty `keep` deletes all memberships of the entity.
    ///
    /// Returns the number of deleted memberships.
    fn remove_unlisted(
        &self,
        direction: Direction,
        key: &str,
        keep: &[&str],
    ) -> impl Future<Output = Result<u64, Self::Error>>;

    /// Insert a membership between the fixed entity `key` and every existing counterpart listed
    /// in `add`. Memberships which already exist are skipped, counterpart keys without an entity
    /// are ignored.
    ///
    /// Returns the number of inserted memberships.
    fn insert_missing(
        &self,
        direction: Direction,
        key: &str,
        add: &[&str],
    ) -> impl Future<Output = Result<u64, Self::Error>>;
}
