//! WebSocket upgrade + message loop. Each client message is parsed as JSON and forwarded to core
//! logic; we reply with a single JSON message per request. Engine notifications (question changed,
//! timeout, session finished) are pushed as they happen, including ones caused by the timer.
//! A connection owns at most one session, discarded when the socket closes.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, instrument, warn};

use crate::engine::SessionEvent;
use crate::error::{ApiError, SessionError};
use crate::logic::{self, Control};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::util::trunc_for_log;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "cloe_prep_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Per-connection session binding.
#[derive(Default)]
struct Binding {
  session_id: Option<String>,
  events: Option<broadcast::Receiver<SessionEvent>>,
  /// Sequence index of the last question this client received, whether in a reply or a push.
  delivered: Option<u32>,
}

async fn next_event(events: &mut Option<broadcast::Receiver<SessionEvent>>) -> Result<SessionEvent, RecvError> {
  match events {
    Some(rx) => rx.recv().await,
    None => std::future::pending().await,
  }
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "cloe_prep_backend", error = %e, "WS send error");
    return false;
  }
  true
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "cloe_prep_backend", "WebSocket connected");
  let mut binding = Binding::default();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            // Parse, dispatch, serialize response.
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "cloe_prep_backend", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state, &mut binding).await
              }
              Err(e) => {
                warn!(target: "cloe_prep_backend", payload = %trunc_for_log(&txt, 200), error = %e, "WS invalid message");
                ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }
              }
            };
            if !send_json(&mut socket, &reply).await {
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }

      event = next_event(&mut binding.events) => {
        let push = match event {
          Ok(ev) => event_message(ev, &state, &mut binding).await,
          Err(RecvError::Lagged(skipped)) => {
            warn!(target: "cloe_prep_backend", skipped, "WS subscriber lagged; dropping events");
            None
          }
          Err(RecvError::Closed) => {
            binding.events = None;
            None
          }
        };
        if let Some(msg) = push {
          if !send_json(&mut socket, &msg).await {
            break;
          }
        }
      }
    }
  }

  if let Some(id) = binding.session_id.take() {
    if let Err(e) = logic::discard(&state, &id).await {
      debug!(target: "cloe_prep_backend", %id, error = %e, "Session already gone at disconnect");
    }
  }
  info!(target: "cloe_prep_backend", "WebSocket disconnected");
}

async fn event_message(ev: SessionEvent, state: &AppState, binding: &mut Binding) -> Option<ServerWsMessage> {
  let id = binding.session_id.as_deref()?;
  match ev {
    SessionEvent::QuestionChanged { question_id, index } => {
      // Answers and starts already carry the next question in their reply.
      if binding.delivered == Some(index) {
        return None;
      }
      debug!(target: "cloe_prep_backend", %id, %question_id, index, "Pushing next question");
      let current = logic::current_question(state, id).await.ok()?;
      let question = current.question?;
      binding.delivered = Some(current.progress.index);
      Some(ServerWsMessage::Question { question, progress: current.progress })
    }
    SessionEvent::TimedOut { question_id } => {
      let progress = logic::progress(state, id).await.ok()?;
      Some(ServerWsMessage::Timeout { question_id, progress })
    }
    SessionEvent::Finished { summary } => Some(ServerWsMessage::SessionFinished { summary }),
  }
}

fn error_message(e: impl Into<ApiError>) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.into().to_string() }
}

fn bound_id(binding: &Binding) -> Result<&str, SessionError> {
  binding
    .session_id
    .as_deref()
    .ok_or_else(|| SessionError::UnknownSession("(none on this connection)".into()))
}

async fn control_reply(state: &AppState, binding: &Binding, action: Control) -> ServerWsMessage {
  let id = match bound_id(binding) {
    Ok(id) => id,
    Err(e) => return error_message(e),
  };
  match logic::control(state, id, action).await {
    Ok(control) => ServerWsMessage::Control { control },
    Err(e) => error_message(e),
  }
}

#[instrument(level = "info", skip(state, binding))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, binding: &mut Binding) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartSession { config } => {
      if let Some(old) = binding.session_id.take() {
        binding.events = None;
        binding.delivered = None;
        let _ = logic::discard(state, &old).await;
      }
      match logic::start_session(state, config).await {
        Ok((live, started)) => {
          binding.session_id = Some(live.id.clone());
          binding.events = Some(live.subscribe());
          binding.delivered = Some(started.progress.index);
          info!(target: "assessment", id = %live.id, "WS session started");
          ServerWsMessage::SessionStarted { started }
        }
        Err(e) => error_message(e),
      }
    }

    ClientWsMessage::Restart { config } => {
      let id = match bound_id(binding) {
        Ok(id) => id.to_string(),
        Err(e) => return error_message(e),
      };
      match logic::restart_session(state, &id, config).await {
        Ok(started) => {
          binding.delivered = Some(started.progress.index);
          ServerWsMessage::SessionStarted { started }
        }
        Err(e) => error_message(e),
      }
    }

    ClientWsMessage::SubmitAnswer { answer } => {
      let id = match bound_id(binding) {
        Ok(id) => id.to_string(),
        Err(e) => return error_message(e),
      };
      match logic::submit_answer(state, &id, answer).await {
        Ok(result) => {
          info!(target: "assessment", %id, accepted = result.accepted, correct = result.correct, "WS answer registered");
          if result.next.is_some() {
            binding.delivered = Some(result.progress.index);
          }
          ServerWsMessage::AnswerResult { result }
        }
        Err(e) => error_message(e),
      }
    }

    ClientWsMessage::Pause => control_reply(state, binding, Control::Pause).await,
    ClientWsMessage::Resume => control_reply(state, binding, Control::Resume).await,
    ClientWsMessage::Quit => control_reply(state, binding, Control::Quit).await,

    ClientWsMessage::Progress => {
      let result = match bound_id(binding) {
        Ok(id) => logic::progress(state, id).await,
        Err(e) => Err(e),
      };
      match result {
        Ok(progress) => ServerWsMessage::Progress { progress },
        Err(e) => error_message(e),
      }
    }

    ClientWsMessage::Estimate => {
      let result = match bound_id(binding) {
        Ok(id) => logic::estimate(state, id).await,
        Err(e) => Err(e),
      };
      match result {
        Ok(estimate) => ServerWsMessage::Estimate { estimate },
        Err(e) => error_message(e),
      }
    }

    ClientWsMessage::CurrentQuestion => {
      let result = match bound_id(binding) {
        Ok(id) => logic::current_question(state, id).await,
        Err(e) => Err(e),
      };
      match result {
        Ok(current) => match current.question {
          Some(question) => {
            binding.delivered = Some(current.progress.index);
            ServerWsMessage::Question { question, progress: current.progress }
          }
          None => ServerWsMessage::Progress { progress: current.progress },
        },
        Err(e) => error_message(e),
      }
    }
  }
}
