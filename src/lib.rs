pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::SqlitePool;

use crate::services::{
    account_service::AccountService, run_service::RunService, session_service::SessionTracker,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub accounts: AccountService,
    pub runs: RunService,
    pub sessions: SessionTracker,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        let config = crate::config::get_config();
        Self::with_session_grace(pool, config.session_grace_secs)
    }

    pub fn with_session_grace(pool: SqlitePool, grace_secs: u64) -> Self {
        let accounts = AccountService::new(pool.clone());
        let runs = RunService::new(pool.clone());
        let sessions = SessionTracker::new(runs.clone(), grace_secs);

        Self {
            pool,
            accounts,
            runs,
            sessions,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/auth/signup", post(routes::auth::signup))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/taxonomy", get(routes::trainer::get_taxonomy));

    let trainer_api = Router::new()
        .route("/api/tests", post(routes::trainer::start_test))
        .route("/api/tests/:id/answers", post(routes::trainer::record_answer))
        .route("/api/tests/:id", get(routes::trainer::get_snapshot))
        .layer(axum::middleware::from_fn(
            middleware::auth::optional_bearer_auth,
        ));

    let account_api = Router::new()
        .route("/api/auth/me", get(routes::auth::me))
        .route("/api/history", get(routes::history::list_history))
        .route("/api/history/:id", get(routes::history::get_run))
        .route(
            "/api/history/:id/categories",
            patch(routes::history::update_categories),
        )
        .route("/api/stats", get(routes::history::get_stats))
        .layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ));

    Router::new()
        .merge(public)
        .merge(trainer_api)
        .merge(account_api)
        .with_state(state)
}
