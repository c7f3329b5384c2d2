// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use roster_store::groups::GroupStore;
use roster_store::{SyncReport, TransactionScope};
use serde_json::Value;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;
use crate::json::{CreateGroup, GroupJson, RootJson, SetMembers, okay};
use crate::routes::finish;

fn not_found(name: &str) -> ApiError {
    ApiError::NotFound(format!("group {name:?} does not exist"))
}

/// `GET /groups`
pub async fn list(State(state): State<AppState>) -> Result<Json<RootJson>, ApiError> {
    let groups = state
        .store()
        .list_groups()
        .await?
        .into_iter()
        .map(GroupJson::from)
        .collect();

    Ok(Json(RootJson {
        groups: Some(groups),
        ..Default::default()
    }))
}

/// `GET /groups/{name}`, the ids of all members.
pub async fn members(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RootJson>, ApiError> {
    let store = state.store();
    if !store.has_group(&name).await? {
        return Err(not_found(&name));
    }

    let members = store.members_of_group(&name).await?;

    Ok(Json(RootJson {
        members: Some(members),
        ..Default::default()
    }))
}

/// `POST /groups`, creates an empty group.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateGroup>, JsonRejection>,
) -> Result<Json<RootJson>, ApiError> {
    let Json(request) = payload?;
    if request.name.is_empty() {
        return Err(ApiError::BadRequest("required fields missing".into()));
    }

    let store = state.store();
    let scope = TransactionScope::begin(store).await?;
    let result = store.insert_group(&request.name).await;
    let group = finish(scope, result).await.map_err(|err| {
        ApiError::from_write(err, || format!("group {:?} already exists", request.name))
    })?;

    Ok(Json(RootJson {
        group: Some(group.into()),
        ..Default::default()
    }))
}

/// `PUT /groups/{name}`, replaces all members of the group.
pub async fn set_members(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<SetMembers>, JsonRejection>,
) -> Result<Json<SyncReport>, ApiError> {
    let Json(request) = payload?;

    if !state.store().has_group(&name).await? {
        return Err(not_found(&name));
    }

    let report = state
        .reconciler()
        .sync_group_members(&name, &request.userids)
        .await?;
    debug!(group = %name, ?report, "replaced members of group");

    Ok(Json(report))
}

/// `DELETE /groups/{name}`
pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store();
    let scope = TransactionScope::begin(store).await?;
    let result = store.delete_group(&name).await;

    if finish(scope, result).await? {
        Ok(okay())
    } else {
        Err(not_found(&name))
    }
}
