use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::Utc;
use validator::Validate;

use crate::dto::trainer_dto::{HistoryQuery, UpdateCategoriesRequest};
use crate::middleware::auth::Claims;
use crate::services::stats;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>,
) -> crate::error::Result<Response> {
    let runs = state
        .runs
        .list_for_account(&claims.sub, query.limit)
        .await?;
    Ok(Json(runs).into_response())
}

#[axum::debug_handler]
pub async fn get_run(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(run_id): Path<String>,
) -> crate::error::Result<Response> {
    let run = state.runs.get(&run_id, &claims.sub).await?;
    Ok(Json(run).into_response())
}

#[axum::debug_handler]
pub async fn update_categories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(run_id): Path<String>,
    Json(req): Json<UpdateCategoriesRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    state
        .runs
        .update_categories(
            &run_id,
            &claims.sub,
            req.ordinal,
            &req.category,
            &req.subcategory,
        )
        .await?;
    let run = state.runs.get(&run_id, &claims.sub).await?;
    Ok(Json(run).into_response())
}

#[axum::debug_handler]
pub async fn get_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> crate::error::Result<Response> {
    let runs = state.runs.list_for_account(&claims.sub, None).await?;
    let dashboard = stats::dashboard(&runs, Utc::now().date_naive());
    Ok(Json(dashboard).into_response())
}
