use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::{
    auth::tokens::{TokenError, TokenService},
    error::ApiError,
    users::repo_types::User,
};

/// The acting user resolved from a `Bearer` token, plus the token itself.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Token from an exact `Bearer <token>` header, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            warn!("missing or malformed Authorization header");
            return Err(ApiError::InvalidAccessToken);
        };

        let tokens = TokenService::from_ref(state);
        match tokens.validate(token).await {
            Ok(user) => Ok(AuthUser {
                user,
                token: token.to_owned(),
            }),
            Err(TokenError::Invalid) => {
                warn!("invalid or expired token");
                Err(ApiError::InvalidAccessToken)
            }
            Err(TokenError::Store(e)) => Err(e.into()),
        }
    }
}

/// Owner-only gate for mutations.
pub fn ensure_owner(acting: &User, target: &User) -> Result<(), ApiError> {
    if acting.id != target.id {
        warn!(acting_id = acting.id, target_id = target.id, "permission denied");
        return Err(ApiError::PermissionDeny);
    }
    Ok(())
}
