// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response bodies.
use axum::Json;
use roster_store::groups::Group;
use roster_store::users::{User, UserUpdate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Serialize)]
pub struct UserJson {
    pub userid: String,
    pub first_name: String,
    pub last_name: String,
    pub created: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

impl UserJson {
    pub fn new(user: User, groups: Vec<String>) -> Self {
        Self {
            userid: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            created: user.created_at,
            groups,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupJson {
    pub name: String,
    pub created: i64,
}

impl From<Group> for GroupJson {
    fn from(group: Group) -> Self {
        Self {
            name: group.name,
            created: group.created_at,
        }
    }
}

/// Envelope of every response carrying data, only the set field is serialized.
#[derive(Debug, Default, Serialize)]
pub struct RootJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupJson>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
}

/// Body of successful responses which have nothing else to say.
pub fn okay() -> Json<Value> {
    Json(json!({ "response": "okay!" }))
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub userid: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Partial update of a user. Empty strings count as not given, `groups` replaces all
/// memberships of the user whenever it is present, even when empty.
#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub userid: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub groups: Option<Vec<String>>,
}

impl UpdateUser {
    pub fn fields(&self) -> UserUpdate {
        let given = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
        UserUpdate {
            id: given(&self.userid),
            first_name: given(&self.first_name),
            last_name: given(&self.last_name),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGroup {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetMembers {
    pub userids: Vec<String>,
}
