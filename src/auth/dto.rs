use serde::{Deserialize, Serialize};

use crate::users::dto::PublicUser;

/// Request body for login. Fields are optional so absence can be reported.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Logged-in user record plus the issued bearer token.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: PublicUser,
    pub access_token: String,
}
