mod app;
mod auth;
mod config;
mod error;
mod response;
mod state;
mod users;

use crate::{app::build_app, state::AppState, users::seed::seed_users};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "user_service=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    if app_state.config.seed_users {
        seed_users(app_state.store.as_ref()).await?;
    }

    app::serve(build_app(app_state)).await
}
