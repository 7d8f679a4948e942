//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic::{self, Control};
use crate::protocol::*;
use crate::session::SessionRequest;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, questions: state.bank.len() })
}

#[instrument(level = "info", skip(state, body), fields(learner = ?body.learner))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
  let (_, out) = logic::start_session(&state, body).await?;
  info!(target: "assessment", id = %out.session_id, question = %out.question.id, "HTTP session started");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_restart_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<SessionRequest>,
) -> Result<Json<SessionOut>, ApiError> {
  Ok(Json(logic::restart_session(&state, &id, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_question(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<CurrentQuestionOut>, ApiError> {
  Ok(Json(logic::current_question(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(question_id = ?body.question_id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let out = logic::submit_answer(&state, &id, body).await?;
  info!(target: "assessment", %id, accepted = out.accepted, correct = out.correct, score = out.progress.score, "HTTP answer registered");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state))]
pub async fn http_pause(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ControlOut>, ApiError> {
  Ok(Json(logic::control(&state, &id, Control::Pause).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_resume(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ControlOut>, ApiError> {
  Ok(Json(logic::control(&state, &id, Control::Resume).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quit(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<ControlOut>, ApiError> {
  Ok(Json(logic::control(&state, &id, Control::Quit).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::progress(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_estimate(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<EstimateOut>, ApiError> {
  Ok(Json(logic::estimate(&state, &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  logic::discard(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_snapshot(
  State(state): State<Arc<AppState>>,
  Path(learner): Path<String>,
) -> impl IntoResponse {
  Json(logic::learner_snapshot(&state, &learner))
}
