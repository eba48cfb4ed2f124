use serde::{Deserialize, Serialize};

use crate::users::repo_types::User;

/// Request body for user creation.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for a partial update; absent fields stay untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

/// Only `""` counts as blank; whitespace is a real value.
pub(crate) fn is_blank(v: &str) -> bool {
    v.is_empty()
}

/// `Some` only for a non-empty value.
pub(crate) fn present(v: Option<String>) -> Option<String> {
    v.filter(|s| !is_blank(s))
}
