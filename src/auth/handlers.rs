use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse},
        extractors::AuthUser,
        password::{verify_decoy, verify_password},
        tokens::TokenService,
    },
    error::{method_not_allowed, ApiError},
    response::ApiResponse,
    state::AppState,
    users::dto::{present, PublicUser},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route(
        "/auth",
        post(login).delete(logout).fallback(method_not_allowed),
    )
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "unreadable login body");
        ApiError::MissingFields
    })?;
    let (Some(email), Some(password)) = (present(payload.email), present(payload.password))
    else {
        warn!("login missing fields");
        return Err(ApiError::MissingFields);
    };

    // Unknown email and wrong password look the same, in body and in cost.
    let Some(user) = state.store.find_by_email(&email).await? else {
        verify_decoy(&password);
        warn!("login unknown email");
        return Err(ApiError::InvalidLogin);
    };
    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(ApiError::InvalidLogin);
    }

    let access_token = TokenService::from_ref(&state).issue(&user).await?;

    info!(user_id = user.id, "user logged in");
    Ok(ApiResponse::Ok(LoginResponse {
        user: PublicUser::from(&user),
        access_token,
    }))
}

#[instrument(skip(state, auth))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<()>, ApiError> {
    let revoked = TokenService::from_ref(&state)
        .revoke(&auth.user, &auth.token)
        .await?;
    info!(user_id = auth.user.id, revoked, "user logged out");
    Ok(ApiResponse::NoContent)
}
