//! Error types for configuration, sessions, grading and persistence, plus the HTTP mapping.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

use crate::protocol::ErrorOut;

/// Invalid configuration: rejected before a session starts, never clamped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("totalPlanned must be a positive integer, got {0}")]
  TotalPlanned(i64),

  #[error("startingDifficulty must be between 0 and 5, got {0}")]
  StartingDifficulty(i64),

  #[error("fixed target level must be between 0 and 5, got {0}")]
  TargetLevel(i64),

  #[error("targetMode must be \"auto\" or a level 0..5, got {0}")]
  TargetMode(String),

  #[error("startingDifficulty only applies to targetMode \"auto\"")]
  StartingDifficultyWithFixedTarget,

  #[error("question '{id}' is invalid: {reason}")]
  InvalidQuestion { id: String, reason: String },

  #[error("engine setting `{name}` {reason}")]
  Setting { name: &'static str, reason: String },

  #[error("question bank is empty")]
  EmptyBank,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("a session is already running; quit it first")]
  AlreadyRunning,

  #[error("unknown session: {0}")]
  UnknownSession(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GradeError {
  #[error("a {response} response cannot answer a {question} question")]
  Mismatch { question: &'static str, response: &'static str },
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("snapshot io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("snapshot encoding error: {0}")]
  Encoding(#[from] serde_json::Error),
}

/// Error surface of the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Session(#[from] SessionError),

  #[error(transparent)]
  Grade(#[from] GradeError),

  #[error("{0}")]
  BadRequest(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Session(SessionError::UnknownSession(_)) => StatusCode::NOT_FOUND,
      ApiError::Session(SessionError::AlreadyRunning) => StatusCode::CONFLICT,
      ApiError::Session(SessionError::Config(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Grade(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
    }
  }
}

impl From<ConfigError> for ApiError {
  fn from(e: ConfigError) -> Self {
    ApiError::Session(SessionError::Config(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(ErrorOut { message: self.to_string() })).into_response()
  }
}
