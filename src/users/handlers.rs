use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::{ensure_owner, AuthUser},
        password::hash_password,
    },
    config::AccountPolicy,
    error::{method_not_allowed, ApiError},
    response::ApiResponse,
    state::AppState,
    users::{
        dto::{is_blank, present, CreateUserRequest, PublicUser, UpdateUserRequest},
        repo_types::{NewUser, User, UserPatch},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(list_users)
                .post(create_user)
                .fallback(method_not_allowed),
        )
        .route(
            "/users/:id",
            get(get_user)
                .put(update_user)
                .delete(delete_user)
                .fallback(method_not_allowed),
        )
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<PublicUser>>, ApiError> {
    let users = state.store.list_all().await?;
    Ok(ApiResponse::Ok(users.iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, id))]
pub async fn get_user(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let user = load_target(&state, id).await?;
    Ok(ApiResponse::Ok(PublicUser::from(&user)))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let policy = state.config.policy;
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "unreadable create body");
        ApiError::MissingFields
    })?;
    let (Some(name), Some(email), Some(password)) = (
        present(payload.name),
        present(payload.email),
        present(payload.password),
    ) else {
        warn!("create missing fields");
        return Err(ApiError::MissingFields);
    };

    if state.store.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(ApiError::EmailExists);
    }
    check_password_len(&policy, &password)?;

    let password_hash = hash_password(&password)?;
    // A concurrent create of the same email surfaces here as DuplicateEmail.
    let user = state
        .store
        .insert(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "user created");
    Ok(ApiResponse::Created(PublicUser::from(&user)))
}

/// Responds 201 on success, kept for client compatibility.
#[instrument(skip(state, auth, id, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let policy = state.config.policy;
    let target = load_target(&state, id).await?;
    authorize_mutation(&policy, &auth.user, &target)?;

    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "unreadable update body");
        ApiError::MissingFields
    })?;
    let patch = build_patch(&policy, payload)?;

    let user = state
        .store
        .update(target.id, patch)
        .await?
        .ok_or(ApiError::UserNotExists)?;

    info!(user_id = user.id, "user updated");
    Ok(ApiResponse::Created(PublicUser::from(&user)))
}

#[instrument(skip(state, auth, id))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<ApiResponse<()>, ApiError> {
    let policy = state.config.policy;
    let target = load_target(&state, id).await?;
    authorize_mutation(&policy, &auth.user, &target)?;

    if !state.store.delete(target.id).await? {
        return Err(ApiError::UserNotExists);
    }

    info!(user_id = target.id, "user deleted");
    Ok(ApiResponse::NoContent)
}

async fn load_target(
    state: &AppState,
    id: Result<Path<i64>, PathRejection>,
) -> Result<User, ApiError> {
    let Ok(Path(id)) = id else {
        return Err(ApiError::UserNotExists);
    };
    state
        .store
        .find_by_id(id)
        .await?
        .ok_or(ApiError::UserNotExists)
}

fn authorize_mutation(
    policy: &AccountPolicy,
    acting: &User,
    target: &User,
) -> Result<(), ApiError> {
    if policy.owner_only {
        ensure_owner(acting, target)?;
    }
    Ok(())
}

fn check_password_len(policy: &AccountPolicy, password: &str) -> Result<(), ApiError> {
    if password.chars().count() < policy.min_password_len {
        warn!("password too short");
        return Err(ApiError::PasswordTooShort);
    }
    Ok(())
}

/// Validates an update payload and hashes a new password if present.
fn build_patch(policy: &AccountPolicy, req: UpdateUserRequest) -> Result<UserPatch, ApiError> {
    let blank = |v: &Option<String>| v.as_deref().is_some_and(is_blank);
    if policy.reject_blank_updates && (blank(&req.name) || blank(&req.email) || blank(&req.password))
    {
        warn!("update with blank field");
        return Err(ApiError::MissingFields);
    }

    let password_hash = match req.password {
        Some(p) => {
            check_password_len(policy, &p)?;
            Some(hash_password(&p)?)
        }
        None => None,
    };

    Ok(UserPatch {
        name: req.name,
        email: req.email,
        password_hash,
    })
}
