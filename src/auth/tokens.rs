use std::sync::Arc;

use axum::extract::FromRef;
use thiserror::Error;
use tracing::debug;

use crate::{
    auth::jwt::JwtKeys,
    state::AppState,
    users::{
        repo::{StoreError, UserStore},
        repo_types::User,
    },
};

#[derive(Debug, Error)]
pub enum TokenError {
    /// Malformed, badly signed, expired, or no longer the stored session.
    #[error("invalid token")]
    Invalid,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues bearer tokens and tracks the single active one per user.
#[derive(Clone)]
pub struct TokenService {
    keys: JwtKeys,
    store: Arc<dyn UserStore>,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            keys: JwtKeys::from_ref(state),
            store: state.store.clone(),
        }
    }
}

impl TokenService {
    /// Signs a fresh token and stores it, replacing any previous session.
    pub async fn issue(&self, user: &User) -> anyhow::Result<String> {
        let token = self.keys.sign(user.id)?;
        self.store.set_token(user.id, &token).await?;
        Ok(token)
    }

    /// Resolves a token to its user. The token must both verify and be the
    /// value currently stored on that user.
    pub async fn validate(&self, token: &str) -> Result<User, TokenError> {
        let claims = self.keys.verify(token).map_err(|e| {
            debug!(error = %e, "token failed verification");
            TokenError::Invalid
        })?;
        match self.store.find_by_token(token).await? {
            Some(user) if user.id == claims.sub => Ok(user),
            _ => Err(TokenError::Invalid),
        }
    }

    /// Clears the stored session if `token` is still the current one.
    pub async fn revoke(&self, user: &User, token: &str) -> Result<bool, StoreError> {
        self.store.clear_token(user.id, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::NewUser;

    async fn setup() -> (AppState, TokenService, User) {
        let state = AppState::fake();
        let user = state
            .store
            .insert(NewUser {
                name: "a".into(),
                email: "a@x.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        let tokens = TokenService::from_ref(&state);
        (state, tokens, user)
    }

    #[tokio::test]
    async fn issued_token_validates() {
        let (_state, tokens, user) = setup().await;
        let token = tokens.issue(&user).await.unwrap();
        assert_eq!(tokens.validate(&token).await.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn new_login_invalidates_previous_token() {
        let (_state, tokens, user) = setup().await;
        let first = tokens.issue(&user).await.unwrap();
        let second = tokens.issue(&user).await.unwrap();
        assert!(matches!(tokens.validate(&first).await, Err(TokenError::Invalid)));
        assert!(tokens.validate(&second).await.is_ok());
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_despite_valid_signature() {
        let (_state, tokens, user) = setup().await;
        let token = tokens.issue(&user).await.unwrap();
        assert!(tokens.revoke(&user, &token).await.unwrap());
        assert!(matches!(tokens.validate(&token).await, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn signed_but_never_stored_token_is_rejected() {
        let (state, tokens, user) = setup().await;
        let stray = JwtKeys::from_ref(&state).sign(user.id).unwrap();
        assert!(matches!(tokens.validate(&stray).await, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn token_of_deleted_user_is_rejected() {
        let (state, tokens, user) = setup().await;
        let token = tokens.issue(&user).await.unwrap();
        state.store.delete(user.id).await.unwrap();
        assert!(matches!(tokens.validate(&token).await, Err(TokenError::Invalid)));
    }
}
