// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for managing users, groups and the memberships between them.
//!
//! Memberships are never edited one by one. `PUT /groups/{name}` replaces all members of a group
//! and `PUT /users/{user_id}` with a `groups` list replaces all groups of a user, both answering
//! with how many memberships got added, removed or stayed the same.
use std::time::Duration;

use axum::routing::get;
use axum::{Router, middleware};
use roster_store::{Reconciler, SqliteStore};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod json;
mod routes;

/// Shared state of all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    store: SqliteStore,
    reconciler: Reconciler<SqliteStore>,
}

impl AppState {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler<SqliteStore> {
        &self.reconciler
    }
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Serve all routes without checking for a bearer token.
    pub insecure_requests: bool,

    /// Deadline for handling one request, after which it is cancelled.
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            insecure_requests: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&config::Config> for RouterConfig {
    fn from(config: &config::Config) -> Self {
        Self {
            insecure_requests: config.insecure_requests,
            request_timeout: config.request_timeout,
        }
    }
}

pub fn create_router(state: AppState, config: &RouterConfig) -> Router {
    let mut api = Router::new()
        .route("/users", get(routes::users::list).post(routes::users::create))
        .route(
            "/users/{user_id}",
            get(routes::users::get)
                .put(routes::users::update)
                .delete(routes::users::delete),
        )
        .route(
            "/groups",
            get(routes::groups::list).post(routes::groups::create),
        )
        .route(
            "/groups/{name}",
            get(routes::groups::members)
                .put(routes::groups::set_members)
                .delete(routes::groups::delete),
        );

    if !config.insecure_requests {
        api = api.route_layer(middleware::from_fn(auth::require_token));
    }

    Router::new()
        .route("/", get(routes::health))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .with_state(state)
}
