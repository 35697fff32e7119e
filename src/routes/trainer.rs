use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use validator::Validate;

use crate::dto::trainer_dto::{RecordAnswerRequest, StartTestRequest, StartTestResponse};
use crate::middleware::auth::Claims;
use crate::models::session::SessionOwner;
use crate::models::taxonomy::CategoryTaxonomy;
use crate::services::session_service::WrongAnswerTag;
use crate::AppState;

fn caller(claims: Option<&Claims>) -> SessionOwner {
    match claims {
        Some(claims) => SessionOwner::Account(claims.sub.clone()),
        None => SessionOwner::Guest,
    }
}

#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<StartTestRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let owner = caller(claims.as_ref().map(|ext| &ext.0));
    let started = state
        .sessions
        .start(owner, req.kind, req.num_questions, req.time_limit_secs)?;
    Ok(Json(StartTestResponse {
        session_id: started.session_id,
        kind: req.kind,
        total_questions: req.num_questions,
        time_limit_secs: req.time_limit_secs,
        started_at: started.started_at,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn record_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    claims: Option<Extension<Claims>>,
    Json(req): Json<RecordAnswerRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let caller = caller(claims.as_ref().map(|ext| &ext.0));
    let wrong = req.wrong.map(|tag| WrongAnswerTag {
        category: tag.category,
        subcategory: tag.subcategory,
    });
    let outcome = state
        .sessions
        .record_answer(&session_id, &caller, req.ordinal, req.seconds, wrong)
        .await?;
    Ok(Json(outcome).into_response())
}

#[axum::debug_handler]
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    claims: Option<Extension<Claims>>,
) -> crate::error::Result<Response> {
    let caller = caller(claims.as_ref().map(|ext| &ext.0));
    let snapshot = state.sessions.get_snapshot(&session_id, &caller).await?;
    Ok(Json(snapshot).into_response())
}

#[axum::debug_handler]
pub async fn get_taxonomy() -> Response {
    Json(CategoryTaxonomy::as_json()).into_response()
}
