//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::domain::{Question, QuestionKind, GAP};
use crate::grading::Response;
use crate::session::{Progress, SessionRequest, SessionSummary};
use crate::timer::time_budget;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartSession {
        #[serde(default)]
        config: SessionRequest,
    },
    /// Start again on the current connection's finished session.
    Restart {
        #[serde(default)]
        config: SessionRequest,
    },
    SubmitAnswer {
        #[serde(flatten)]
        answer: AnswerIn,
    },
    Pause,
    Resume,
    Quit,
    Progress,
    Estimate,
    CurrentQuestion,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    SessionStarted {
        #[serde(flatten)]
        started: SessionOut,
    },
    Question {
        question: QuestionOut,
        progress: Progress,
    },
    AnswerResult {
        #[serde(flatten)]
        result: AnswerOut,
    },
    Timeout {
        #[serde(rename = "questionId")]
        question_id: String,
        progress: Progress,
    },
    Control {
        #[serde(flatten)]
        control: ControlOut,
    },
    Progress {
        progress: Progress,
    },
    Estimate {
        #[serde(flatten)]
        estimate: EstimateOut,
    },
    SessionFinished {
        summary: SessionSummary,
    },
    Error {
        message: String,
    },
}

/// Text handed to the client's speech synthesiser.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SpeechCue {
    pub text: String,
    pub locale: String,
}

/// Kind-specific public payload. Answer keys never leave the server.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionBody {
    MultipleChoice { options: Vec<String> },
    Cloze { text: String, gaps: usize },
    WordBank { text: String, bank: Vec<String> },
    WordOrder { tokens: Vec<String> },
    ParagraphOrder { paragraphs: Vec<String> },
    Listening { options: Vec<String>, speech: SpeechCue },
    Reading { passage: String, options: Vec<String> },
    Reformulation { source: String },
}

/// DTO used by both WS and HTTP for question delivery.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub id: String,
    pub level: String,
    pub points: u32,
    pub prompt: String,
    pub time_budget_secs: u32,
    #[serde(flatten)]
    pub body: QuestionBody,
}

fn shuffled(items: &[String]) -> Vec<String> {
    let mut out = items.to_vec();
    out.shuffle(&mut rand::thread_rng());
    out
}

/// Convert a full `Question` (internal) to the public DTO.
pub fn to_out(q: &Question, settings: &EngineSettings) -> QuestionOut {
    let body = match &q.kind {
        QuestionKind::MultipleChoice { options, .. } => QuestionBody::MultipleChoice { options: options.clone() },
        QuestionKind::Cloze { text, .. } => QuestionBody::Cloze { text: text.clone(), gaps: text.matches(GAP).count() },
        QuestionKind::WordBank { text, bank, .. } => QuestionBody::WordBank { text: text.clone(), bank: shuffled(bank) },
        QuestionKind::WordOrder { tokens } => QuestionBody::WordOrder { tokens: shuffled(tokens) },
        QuestionKind::ParagraphOrder { paragraphs } => QuestionBody::ParagraphOrder { paragraphs: shuffled(paragraphs) },
        QuestionKind::Listening { transcript, locale, options, .. } => QuestionBody::Listening {
            options: options.clone(),
            speech: SpeechCue { text: transcript.clone(), locale: locale.clone() },
        },
        QuestionKind::Reading { passage, options, .. } => QuestionBody::Reading {
            passage: passage.clone(),
            options: options.clone(),
        },
        QuestionKind::Reformulation { source, .. } => QuestionBody::Reformulation { source: source.clone() },
    };

    QuestionOut {
        id: q.id.clone(),
        level: q.band().to_string(),
        points: q.points,
        prompt: q.prompt.clone(),
        time_budget_secs: time_budget(q, settings),
        body,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session_id: String,
    pub question: QuestionOut,
    pub progress: Progress,
}

/// Either a bare verdict from a client-side checker, or a response for the server to grade.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    #[serde(default)]
    pub question_id: Option<String>,
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub response: Option<Response>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    /// False when the answer lost a race with the timer or the session was not running.
    pub accepted: bool,
    pub correct: bool,
    pub expected: String,
    pub explanation: String,
    pub awarded: u32,
    /// True the first time this learner solves the question.
    pub newly_solved: bool,
    pub progress: Progress,
    pub next: Option<QuestionOut>,
    pub summary: Option<SessionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlOut {
    pub changed: bool,
    pub progress: Progress,
    pub summary: Option<SessionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateOut {
    /// `B1`, `B1-`, `B1+`; None until something has been answered.
    pub label: Option<String>,
    pub average: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentQuestionOut {
    pub question: Option<QuestionOut>,
    pub progress: Progress,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub questions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::seed_questions;

    #[test]
    fn client_messages_parse() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"start_session","config":{"targetMode":"auto","totalPlanned":3}}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::StartSession { config } if config.total_planned == Some(3)));

        let m: ClientWsMessage = serde_json::from_str(
            r#"{"type":"submit_answer","questionId":"q1","response":{"type":"choice","index":2}}"#,
        )
        .unwrap();
        match m {
            ClientWsMessage::SubmitAnswer { answer } => {
                assert_eq!(answer.question_id.as_deref(), Some("q1"));
                assert_eq!(answer.response, Some(Response::Choice { index: 2 }));
                assert_eq!(answer.correct, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"pause"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::Pause));
    }

    #[test]
    fn public_question_hides_answer_keys() {
        let settings = EngineSettings::default();
        for q in seed_questions() {
            let json = serde_json::to_value(to_out(&q, &settings)).unwrap();
            assert!(json.get("correct").is_none(), "{} leaks correct", q.id);
            assert!(json.get("answers").is_none(), "{} leaks answers", q.id);
            assert!(json.get("accepted").is_none(), "{} leaks accepted", q.id);
            assert_eq!(json["kind"], q.kind.name());
        }
    }

    #[test]
    fn listening_carries_speech_cue() {
        let q = seed_questions().into_iter().find(|q| q.id == "a1-listen-time").unwrap();
        let out = to_out(&q, &EngineSettings::default());
        assert_eq!(out.level, "A1");
        assert_eq!(out.time_budget_secs, 25);
        match out.body {
            QuestionBody::Listening { speech, .. } => {
                assert_eq!(speech.locale, "en-GB");
                assert_eq!(speech.text, "It is half past seven.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
