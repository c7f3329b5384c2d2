// SPDX-License-Identifier: MIT OR Apache-2.0

//! `GroupStore` trait for managing groups as well as a concrete `SqliteStore` implementation.
mod sqlite;
#[cfg(test)]
mod tests;
mod traits;

pub use traits::{Group, GroupStore};
