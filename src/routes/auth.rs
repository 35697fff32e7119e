use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
    Extension,
};
use validator::Validate;

use crate::dto::auth_dto::{AuthResponse, LoginRequest, MeResponse, SignupRequest};
use crate::middleware::auth::{issue_token, Claims};
use crate::AppState;

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let account = state.accounts.register(&req.username, &req.password).await?;
    let token = issue_token(&account.id)?;
    Ok(Json(AuthResponse {
        token,
        account_id: account.id,
        username: account.username,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let account = state
        .accounts
        .authenticate(&req.username, &req.password)
        .await?;
    let token = issue_token(&account.id)?;
    Ok(Json(AuthResponse {
        token,
        account_id: account.id,
        username: account.username,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> crate::error::Result<Response> {
    let account = state.accounts.account_by_id(&claims.sub).await?;
    Ok(Json(MeResponse {
        account_id: account.id,
        username: account.username,
        created_at: account.created_at,
    })
    .into_response())
}
