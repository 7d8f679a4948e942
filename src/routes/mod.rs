//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - session API under `/api/v1/sessions/...`
/// - learner snapshots under `/api/v1/learners/...`
/// - static SPA from `./static` with index fallback
/// - permissive CORS and a per-request trace span
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/sessions", post(http::http_start_session))
        .route("/api/v1/sessions/:id", delete(http::http_delete_session))
        .route("/api/v1/sessions/:id/restart", post(http::http_restart_session))
        .route("/api/v1/sessions/:id/question", get(http::http_get_question))
        .route("/api/v1/sessions/:id/answer", post(http::http_post_answer))
        .route("/api/v1/sessions/:id/pause", post(http::http_pause))
        .route("/api/v1/sessions/:id/resume", post(http::http_resume))
        .route("/api/v1/sessions/:id/quit", post(http::http_quit))
        .route("/api/v1/sessions/:id/progress", get(http::http_get_progress))
        .route("/api/v1/sessions/:id/estimate", get(http::http_get_estimate))
        .route("/api/v1/learners/:learner/snapshot", get(http::http_get_snapshot))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::bank::QuestionBank;
    use crate::config::EngineSettings;
    use crate::domain::{Question, QuestionKind};
    use crate::persistence::MemoryStore;
    use crate::seeds::seed_questions;

    fn app() -> (Router, Arc<AppState>) {
        let bank = QuestionBank::assemble(Vec::new(), seed_questions()).unwrap();
        let state = Arc::new(AppState::with_parts(
            bank,
            EngineSettings::default(),
            Arc::new(MemoryStore::default()),
        ));
        (build_router(state.clone()), state)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_bank_size() {
        let (app, _) = app();
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["questions"], 30);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let (app, state) = app();
        let (status, body) = call(&app, Method::POST, "/api/v1/sessions", Some(json!({ "totalPlanned": 0 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().contains("totalPlanned"));
        assert!(state.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn session_flow_over_http() {
        let (app, state) = app();
        let (status, started) = call(
            &app,
            Method::POST,
            "/api/v1/sessions",
            Some(json!({ "targetMode": 2, "totalPlanned": 2, "learner": "ana" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = started["sessionId"].as_str().unwrap().to_string();
        let first = started["question"]["id"].as_str().unwrap().to_string();
        assert_eq!(started["progress"]["difficulty"], 2);

        let (status, answered) = call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/answer"),
            Some(json!({ "questionId": first, "correct": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answered["accepted"], true);
        assert_eq!(answered["newlySolved"], true);
        assert!(answered["progress"]["score"].as_u64().unwrap() > 0);

        // Answering the old question again is stale.
        let (_, stale) = call(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{id}/answer"),
            Some(json!({ "questionId": first, "correct": true })),
        )
        .await;
        assert_eq!(stale["accepted"], false);

        let (status, quit) = call(&app, Method::POST, &format!("/api/v1/sessions/{id}/quit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(quit["changed"], true);
        assert_eq!(quit["summary"]["quitEarly"], true);

        let (_, snapshot) = call(&app, Method::GET, "/api/v1/learners/ana/snapshot", None).await;
        assert_eq!(snapshot["solvedKeys"].as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::DELETE, &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn graded_response_over_http() {
        let solo = Question {
            id: "solo-mcq".into(),
            level: 2,
            points: 10,
            time_limit_secs: 30,
            prompt: "Is this right?".into(),
            explanation: "Because.".into(),
            kind: QuestionKind::MultipleChoice { options: vec!["no".into(), "yes".into()], correct: 1 },
        };
        let state = Arc::new(AppState::with_parts(
            QuestionBank::new(vec![solo]).unwrap(),
            EngineSettings::default(),
            Arc::new(MemoryStore::default()),
        ));
        let app = build_router(state);

        let (_, started) = call(&app, Method::POST, "/api/v1/sessions", Some(json!({ "totalPlanned": 1 }))).await;
        let id = started["sessionId"].as_str().unwrap().to_string();
        assert_eq!(started["question"]["id"], "solo-mcq");
        let uri = format!("/api/v1/sessions/{id}/answer");

        let (status, body) = call(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "questionId": "solo-mcq", "response": { "type": "text", "value": "yes" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().is_some());

        let (status, answered) = call(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "questionId": "solo-mcq", "response": { "type": "choice", "index": 0 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answered["accepted"], true);
        assert_eq!(answered["correct"], false);
        assert_eq!(answered["expected"], "yes");
        assert_eq!(answered["summary"]["answered"], 1);
        assert!(answered["next"].is_null());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (app, _) = app();
        let (status, body) = call(&app, Method::GET, "/api/v1/sessions/nope/progress", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("nope"));
    }
}
