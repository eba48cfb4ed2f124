use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::{response::Envelope, users::repo::StoreError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing fields")]
    MissingFields,
    #[error("email already exists")]
    EmailExists,
    #[error("user does not exist")]
    UserNotExists,
    #[error("password too short")]
    PasswordTooShort,
    #[error("invalid login")]
    InvalidLogin,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("permission denied")]
    PermissionDeny,
    #[error("resource not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Stable code clients match on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields => "MSG_MISSING_FIELDS",
            Self::EmailExists => "MSG_EMAIL_EXISTS",
            Self::UserNotExists => "MSG_USER_NOT_EXISTS",
            Self::PasswordTooShort => "MSG_PASSWORD_TOO_SHORT",
            Self::InvalidLogin => "MSG_INVALID_LOGIN",
            Self::InvalidAccessToken => "MSG_INVALID_ACCESS_TOKEN",
            Self::PermissionDeny => "MSG_PERMISSION_DENY",
            Self::NotFound => "MSG_NOT_FOUND",
            Self::MethodNotAllowed => "MSG_METHOD_NOT_ALLOWED",
            Self::Internal(_) => "MSG_INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFields | Self::EmailExists | Self::PasswordTooShort => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidLogin | Self::InvalidAccessToken => StatusCode::UNAUTHORIZED,
            Self::PermissionDeny => StatusCode::FORBIDDEN,
            Self::UserNotExists | Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => ApiError::EmailExists,
            StoreError::Database(e) => ApiError::Internal(e.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            error!(error = %e, "internal error");
        }
        (self.status(), Json(Envelope::fail(self.code()))).into_response()
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
