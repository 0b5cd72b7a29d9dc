use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{error, warn};
use uuid::Uuid;

use super::{jwt::JwtKeys, policy::Capability, repo_types::User};
use crate::{error::ApiError, state::AppState};

/// Extracts and validates the bearer access token, returning the user ID.
pub struct AuthUser(pub Uuid);

/// Caller resolved from the store; passes `IsAuthenticated`.
pub struct CurrentUser(pub User);

/// Caller resolved from the store; passes `IsAdminRole`.
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized("Authentication credentials were not provided.".into())
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        Ok(AuthUser(claims.sub))
    }
}

async fn resolve(parts: &mut Parts, state: &AppState, cap: Capability) -> Result<User, ApiError> {
    let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
    let user = state.store.find_by_id(user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "user lookup failed");
        ApiError::from(e)
    })?;
    if user.is_none() {
        warn!(%user_id, "token for unknown user");
    }
    cap.check(user.as_ref())?;
    user.ok_or_else(|| ApiError::Unauthorized("User not found".into()))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state, Capability::IsAuthenticated)
            .await
            .map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve(parts, state, Capability::IsAdminRole).await.map_err(|e| {
            if matches!(e, ApiError::Forbidden(_)) {
                warn!("non-admin caller on admin route");
            }
            e
        })?;
        Ok(AdminUser(user))
    }
}
