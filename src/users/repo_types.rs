use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the store.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string, never exposed
    pub access_token: Option<String>, // current session, if logged in
    pub created_at: OffsetDateTime,
}

/// Fields needed to insert a user; the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

