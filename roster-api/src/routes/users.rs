// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use roster_store::TransactionScope;
use roster_store::users::{User, UserStore};
use serde_json::Value;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;
use crate::json::{CreateUser, RootJson, UpdateUser, UserJson, okay};
use crate::routes::finish;

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("user {id:?} does not exist"))
}

/// `GET /users`
pub async fn list(State(state): State<AppState>) -> Result<Json<RootJson>, ApiError> {
    let users = state
        .store()
        .list_users()
        .await?
        .into_iter()
        .map(|user| UserJson::new(user, Vec::new()))
        .collect();

    Ok(Json(RootJson {
        users: Some(users),
        ..Default::default()
    }))
}

/// `GET /users/{user_id}`
pub async fn get(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<RootJson>, ApiError> {
    let user = state
        .store()
        .get_user(&user_id)
        .await?
        .ok_or_else(|| not_found(&user_id))?;

    user_response(&state, user).await
}

/// `POST /users`
///
/// Creates the user and, when `groups` is not empty, sets its memberships afterwards.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateUser>, JsonRejection>,
) -> Result<Json<RootJson>, ApiError> {
    let Json(request) = payload?;
    if request.userid.is_empty() || request.first_name.is_empty() || request.last_name.is_empty()
    {
        return Err(ApiError::BadRequest("required fields missing".into()));
    }

    let store = state.store();
    let scope = TransactionScope::begin(store).await?;
    let result = store
        .insert_user(&request.userid, &request.first_name, &request.last_name)
        .await;
    let user = finish(scope, result).await.map_err(|err| {
        ApiError::from_write(err, || format!("user {:?} already exists", request.userid))
    })?;

    if !request.groups.is_empty() {
        let report = state
            .reconciler()
            .sync_user_groups(&user.id, &request.groups)
            .await?;
        debug!(userid = %user.id, ?report, "set groups of new user");
    }

    user_response(&state, user).await
}

/// `PUT /users/{user_id}`
///
/// Changes the given fields. A present `groups` list replaces all memberships of the user.
pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Json<RootJson>, ApiError> {
    let Json(request) = payload?;
    let fields = request.fields();
    if fields.is_empty() && request.groups.is_none() {
        return Err(ApiError::BadRequest("no updates in request".into()));
    }

    let store = state.store();

    let user = if fields.is_empty() {
        store
            .get_user(&user_id)
            .await?
            .ok_or_else(|| not_found(&user_id))?
    } else {
        let scope = TransactionScope::begin(store).await?;
        let result = store.update_user(&user_id, &fields).await;
        finish(scope, result)
            .await
            .map_err(|err| {
                ApiError::from_write(err, || {
                    format!("user {:?} already exists", fields.id.as_deref().unwrap_or_default())
                })
            })?
            .ok_or_else(|| not_found(&user_id))?
    };

    if let Some(groups) = &request.groups {
        let report = state
            .reconciler()
            .sync_user_groups(&user.id, groups)
            .await?;
        debug!(userid = %user.id, ?report, "replaced groups of user");
    }

    user_response(&state, user).await
}

/// `DELETE /users/{user_id}`
pub async fn delete(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store();
    let scope = TransactionScope::begin(store).await?;
    let result = store.delete_user(&user_id).await;

    if finish(scope, result).await? {
        Ok(okay())
    } else {
        Err(not_found(&user_id))
    }
}

async fn user_response(state: &AppState, user: User) -> Result<Json<RootJson>, ApiError> {
    let groups = state.store().groups_of_user(&user.id).await?;

    Ok(Json(RootJson {
        user: Some(UserJson::new(user, groups)),
        ..Default::default()
    }))
}
