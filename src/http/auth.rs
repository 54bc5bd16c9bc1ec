//! Bearer-token authentication
//!
//! The render and listing endpoints require `Authorization: Bearer <token>`;
//! tokens map to owner names via configuration. Token issuance itself lives
//! outside this service.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;

use super::handlers::ApiError;
use crate::error::RenderError;
use crate::state::AppState;

/// The authenticated owner extracted from the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError(RenderError::Unauthorized))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(ApiError(RenderError::Unauthorized))?
            .trim();

        match state.owner_for_token(token) {
            Some(owner) => Ok(CurrentUser(owner)),
            None => Err(ApiError(RenderError::Unauthorized)),
        }
    }
}
