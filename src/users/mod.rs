use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod seed;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
