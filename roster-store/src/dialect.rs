// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flavours of SQL the store renders its hand-written statements in.
//!
//! Only two things differ between the supported flavours: how an insert skips rows which would
//! violate a uniqueness constraint, and how bind parameters are written. SQLite understands both
//! renderings, which is why the store can be configured with either of them.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Syntax used to make an insert skip rows which already exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictClause {
    /// `INSERT OR IGNORE INTO ...`
    InsertOrIgnore,

    /// `INSERT INTO ... ON CONFLICT DO NOTHING`
    OnConflictDoNothing,
}

/// Syntax of bind parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholders {
    /// `?`, bound in order of appearance.
    Anonymous,

    /// `$1`, `$2`, ...
    Numbered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dialect {
    pub conflict: ConflictClause,
    pub placeholders: Placeholders,
}

impl Dialect {
    pub const SQLITE: Self = Self {
        conflict: ConflictClause::InsertOrIgnore,
        placeholders: Placeholders::Anonymous,
    };

    pub const POSTGRES: Self = Self {
        conflict: ConflictClause::OnConflictDoNothing,
        placeholders: Placeholders::Numbered,
    };

    /// Bind parameter at the given 1-based position.
    pub fn placeholder(&self, index: usize) -> String {
        match self.placeholders {
            Placeholders::Anonymous => "?".to_string(),
            Placeholders::Numbered => format!("${index}"),
        }
    }

    /// Comma-separated list of `count` bind parameters, the first one at position `start`.
    pub fn placeholder_list(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|index| self.placeholder(index))
            .collect::<Vec<String>>()
            .join(", ")
    }

    /// Insert `source` rows into `target`, silently skipping rows which conflict with an
    /// existing one.
    pub fn insert_ignoring_conflicts(&self, target: &str, source: &str) -> String {
        match self.conflict {
            ConflictClause::InsertOrIgnore => format!("INSERT OR IGNORE INTO {target} {source}"),
            ConflictClause::OnConflictDoNothing => {
                format!("INSERT INTO {target} {source} ON CONFLICT DO NOTHING")
            }
        }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::SQLITE
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::POSTGRES {
            write!(f, "postgres")
        } else {
            write!(f, "sqlite")
        }
    }
}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::SQLITE),
            "postgres" | "postgresql" => Ok(Self::POSTGRES),
            _ => Err(UnknownDialect(value.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown sql dialect '{0}'")]
pub struct UnknownDialect(String);
