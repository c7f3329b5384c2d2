// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciling the set of memberships of one user or one group with a target set.
//!
//! The `Reconciler` brings all membership rows of a "fixed" entity (a group when setting its
//! members, a user when setting its groups) to exactly the given set of counterpart keys. It does
//! so in one transaction with exactly two statements: a delete of every membership whose
//! counterpart is not in the target set, followed by a conflict-ignoring insert of every
//! membership which is missing. Both statements resolve external keys themselves through joins,
//! there is no read of the current state beforehand.
//!
//! ```text
//! before:  g1 -> { u1, u2 }          target: { u1, u3 }
//!
//! delete:  g1 -> u2                  removed   = 1
//! insert:  g1 -> u3 (u1 ignored)     added     = 1
//!                                    unchanged = |target| - added = 1
//! after:   g1 -> { u1, u3 }
//! ```
mod direction;
mod reconciler;
mod sqlite;
#[cfg(test)]
mod tests;
mod traits;

pub use direction::{Direction, Side};
pub use reconciler::{Reconciler, SyncError, SyncReport};
pub use traits::MembershipStore;
