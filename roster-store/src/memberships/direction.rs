// SPDX-License-Identifier: MIT OR Apache-2.0

/// One end of the membership relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Side {
    /// Table holding the entities of this side.
    pub table: &'static str,

    /// Column holding the external, unique key of an entity.
    pub key: &'static str,

    /// Column in the memberships table referencing an entity of this side.
    pub link: &'static str,
}

impl Side {
    pub const USERS: Self = Self {
        table: "users_v1",
        key: "id",
        link: "user_pk",
    };

    pub const GROUPS: Self = Self {
        table: "groups_v1",
        key: "name",
        link: "group_pk",
    };
}

/// Which side of the relation stays fixed while the memberships towards the other side get
/// reconciled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Direction {
    pub fixed: Side,
    pub counterpart: Side,
}

impl Direction {
    /// Set the members of one group.
    pub const GROUP_MEMBERS: Self = Self {
        fixed: Side::GROUPS,
        counterpart: Side::USERS,
    };

    /// Set the groups of one user.
    pub const USER_GROUPS: Self = Self::GROUP_MEMBERS.reversed();

    pub const fn reversed(self) -> Self {
        Self {
            fixed: self.counterpart,
            counterpart: self.fixed,
        }
    }
}
