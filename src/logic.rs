//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting and restarting sessions (config validation, preferences, snapshots)
//!   - Registering answers (client verdicts or server-side grading) and awarding points
//!   - Pause / resume / quit and the read-only views (question, progress, estimate)

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::EngineSettings;
use crate::engine::{AssessmentEngine, SubmitOutcome};
use crate::error::{ApiError, SessionError};
use crate::grading::{grade, model_answer};
use crate::persistence::{load_snapshot, save_snapshot, Snapshot};
use crate::protocol::{
  to_out, AnswerIn, AnswerOut, ControlOut, CurrentQuestionOut, EstimateOut, SessionOut,
};
use crate::session::{Progress, SessionConfig, SessionRequest};
use crate::state::{AppState, LiveSession};

pub const ANONYMOUS: &str = "anonymous";

fn learner_key(req: &SessionRequest) -> String {
  req
    .learner
    .as_deref()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .unwrap_or(ANONYMOUS)
    .to_string()
}

fn remember_preferences(snapshot: &mut Snapshot, cfg: &SessionConfig) {
  snapshot.preferences.target_mode = Some(cfg.target);
  snapshot.preferences.total_planned = Some(cfg.total_planned);
}

#[instrument(level = "info", skip(state, req), fields(learner = ?req.learner))]
pub async fn start_session(state: &AppState, req: SessionRequest) -> Result<(Arc<LiveSession>, SessionOut), ApiError> {
  let learner = learner_key(&req);
  let mut snapshot = load_snapshot(state.store.as_ref(), &learner).unwrap_or_default();
  let cfg = req.validate(&state.settings, Some(&snapshot.preferences))?;

  let mut engine = state.new_engine();
  let question = to_out(engine.start(&cfg)?, &state.settings);
  let progress = engine.progress();

  remember_preferences(&mut snapshot, &cfg);
  save_snapshot(state.store.as_ref(), &learner, &snapshot);

  let live = state.insert_session(learner, engine, snapshot).await;
  let events = live.engine.lock().await.drain_events();
  live.publish(events, state.store.as_ref()).await;

  info!(target: "assessment", id = %live.id, question = %question.id, "Session started");
  let out = SessionOut { session_id: live.id.clone(), question, progress };
  Ok((live, out))
}

/// Start a finished (or never started) session again with a fresh configuration.
#[instrument(level = "info", skip(state, req))]
pub async fn restart_session(state: &AppState, id: &str, req: SessionRequest) -> Result<SessionOut, ApiError> {
  let live = state.get_session(id).await?;
  let (question, progress, events) = {
    let mut engine = live.engine.lock().await;
    let mut snapshot = live.snapshot.lock().await;
    let cfg = req.validate(&state.settings, Some(&snapshot.preferences))?;
    let question = to_out(engine.start(&cfg)?, &state.settings);
    remember_preferences(&mut snapshot, &cfg);
    save_snapshot(state.store.as_ref(), &live.learner, &snapshot);
    (question, engine.progress(), engine.drain_events())
  };
  live.publish(events, state.store.as_ref()).await;
  Ok(SessionOut { session_id: live.id.clone(), question, progress })
}

/// Answer that lost a race with the timer, or arrived while the run was paused or over.
fn ignored(engine: &AssessmentEngine, settings: &EngineSettings) -> AnswerOut {
  AnswerOut {
    accepted: false,
    correct: false,
    expected: String::new(),
    explanation: String::new(),
    awarded: 0,
    newly_solved: false,
    progress: engine.progress(),
    next: engine.current_question().map(|q| to_out(q, settings)),
    summary: engine.summary().cloned(),
  }
}

#[instrument(level = "info", skip(state, answer), fields(question_id = ?answer.question_id))]
pub async fn submit_answer(state: &AppState, id: &str, answer: AnswerIn) -> Result<AnswerOut, ApiError> {
  if answer.response.is_none() && answer.correct.is_none() {
    return Err(ApiError::BadRequest("either `correct` or `response` is required".into()));
  }
  let live = state.get_session(id).await?;
  let mut engine = live.engine.lock().await;

  // Race and phase checks come first: a late answer is never graded against whatever replaced it.
  let (correct, expected) = match engine.answerable(answer.question_id.as_deref()) {
    Err(reason) => {
      warn!(target: "assessment", %id, ?reason, "Answer ignored");
      return Ok(ignored(&engine, &state.settings));
    }
    Ok(current) => match (&answer.response, answer.correct) {
      (Some(response), _) => {
        let g = grade(current, response)?;
        (g.correct, Some(g.expected))
      }
      (None, Some(verdict)) => (verdict, None),
      (None, None) => return Err(ApiError::BadRequest("either `correct` or `response` is required".into())),
    },
  };

  let outcome = engine.submit_answer(answer.question_id.as_deref(), correct);
  let SubmitOutcome::Accepted { question, effect, finished } = outcome else {
    return Ok(ignored(&engine, &state.settings));
  };
  let next = engine.current_question().map(|q| to_out(q, &state.settings));
  let progress = engine.progress();
  let summary = if finished { engine.summary().cloned() } else { None };
  let events = engine.drain_events();
  drop(engine);

  let mut newly_solved = false;
  if effect.correct {
    let mut snapshot = live.snapshot.lock().await;
    newly_solved = snapshot.award(&question.id, question.points);
    if newly_solved && !finished {
      // Finished runs are saved once by `publish`.
      save_snapshot(state.store.as_ref(), &live.learner, &snapshot);
    }
  }
  let out = AnswerOut {
    accepted: true,
    correct: effect.correct,
    expected: expected.unwrap_or_else(|| model_answer(&question)),
    explanation: question.explanation.clone(),
    awarded: effect.awarded,
    newly_solved,
    progress,
    next,
    summary,
  };

  live.publish(events, state.store.as_ref()).await;
  Ok(out)
}

#[derive(Clone, Copy, Debug)]
pub enum Control {
  Pause,
  Resume,
  Quit,
}

#[instrument(level = "info", skip(state))]
pub async fn control(state: &AppState, id: &str, action: Control) -> Result<ControlOut, ApiError> {
  let live = state.get_session(id).await?;
  let (changed, progress, summary, events) = {
    let mut engine = live.engine.lock().await;
    let changed = match action {
      Control::Pause => engine.pause(),
      Control::Resume => engine.resume(),
      Control::Quit => engine.quit(),
    };
    (changed, engine.progress(), engine.summary().cloned(), engine.drain_events())
  };
  debug!(target: "assessment", %id, ?action, changed, "Control applied");
  live.publish(events, state.store.as_ref()).await;
  Ok(ControlOut { changed, progress, summary })
}

pub async fn current_question(state: &AppState, id: &str) -> Result<CurrentQuestionOut, SessionError> {
  let live = state.get_session(id).await?;
  let engine = live.engine.lock().await;
  Ok(CurrentQuestionOut {
    question: engine.current_question().map(|q| to_out(q, &state.settings)),
    progress: engine.progress(),
  })
}

pub async fn progress(state: &AppState, id: &str) -> Result<Progress, SessionError> {
  let live = state.get_session(id).await?;
  let progress = live.engine.lock().await.progress();
  Ok(progress)
}

pub async fn estimate(state: &AppState, id: &str) -> Result<EstimateOut, SessionError> {
  let live = state.get_session(id).await?;
  let estimate = live.engine.lock().await.estimate();
  Ok(EstimateOut {
    label: estimate.as_ref().map(|e| e.to_string()),
    average: estimate.as_ref().map(|e| e.average),
    accuracy: estimate.as_ref().map(|e| e.accuracy),
  })
}

/// Quit if still running, then drop the session.
#[instrument(level = "info", skip(state))]
pub async fn discard(state: &AppState, id: &str) -> Result<(), SessionError> {
  let live = state.get_session(id).await?;
  let events = {
    let mut engine = live.engine.lock().await;
    engine.quit();
    engine.drain_events()
  };
  live.publish(events, state.store.as_ref()).await;
  state.remove_session(id).await;
  Ok(())
}

pub fn learner_snapshot(state: &AppState, learner: &str) -> Snapshot {
  load_snapshot(state.store.as_ref(), learner).unwrap_or_default()
}
