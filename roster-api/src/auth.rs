// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::ApiError;

/// Reject requests without a bearer token.
///
/// The header needs to consist of exactly two whitespace-separated parts, a scheme and a token.
/// Tokens are not verified any further.
pub async fn require_token(request: Request, next: Next) -> Result<Response, ApiError> {
    debug!("checking that the request is authenticated");

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthenticated("no authorization header".into()))?
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("bad authorization header".into()))?;

    if header.split_whitespace().count() != 2 {
        return Err(ApiError::Unauthenticated("bad authorization header".into()));
    }

    Ok(next.run(request).await)
}
