//! Admin token extractor
//!
//! Protects routes that only operators may call (notification send/clear).

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use sha2::{Digest, Sha256};

use crate::AppState;
use crate::error::AppError;

fn extract_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare digests so the comparison time does not depend on the token prefix
fn token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Admin access extractor
///
/// Rejects with 401 unless the request carries `Authorization: Bearer <auth.admin_token>`.
/// When no admin token is configured every request passes.
///
/// # Example
/// ```ignore
/// async fn handler(_admin: AdminAccess) -> impl IntoResponse {
///     // Only reached by operators
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[async_trait]
impl<S> FromRequestParts<S> for AdminAccess
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let Some(expected) = state.config.auth.admin_token.as_deref() else {
            return Ok(AdminAccess);
        };

        let presented = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        if !token_matches(presented, expected) {
            tracing::warn!("Rejected admin request with invalid token");
            return Err(AppError::Unauthorized);
        }

        Ok(AdminAccess)
    }
}
