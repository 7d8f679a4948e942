//! Server-side answer checking, one rule per question kind.

use serde::{Deserialize, Serialize};

use crate::domain::{Question, QuestionKind};
use crate::error::GradeError;
use crate::util::{matches_any, normalize_answer};

/// A learner response. The shape must fit the question kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
  Choice { index: usize },
  Blanks { values: Vec<String> },
  Sequence { items: Vec<String> },
  Text { value: String },
}

impl Response {
  fn name(&self) -> &'static str {
    match self {
      Response::Choice { .. } => "choice",
      Response::Blanks { .. } => "blanks",
      Response::Sequence { .. } => "sequence",
      Response::Text { .. } => "text",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Grade {
  pub correct: bool,
  /// Human-readable model answer.
  pub expected: String,
}

/// The answer shown to the learner after a miss.
pub fn model_answer(question: &Question) -> String {
  match &question.kind {
    QuestionKind::MultipleChoice { options, correct }
    | QuestionKind::Listening { options, correct, .. }
    | QuestionKind::Reading { options, correct, .. } => options[*correct].clone(),
    QuestionKind::Cloze { answers, .. } => answers
      .iter()
      .map(|a| a.first().cloned().unwrap_or_default())
      .collect::<Vec<_>>()
      .join(", "),
    QuestionKind::WordBank { answers, .. } => answers.join(", "),
    QuestionKind::WordOrder { tokens } => tokens.join(" "),
    QuestionKind::ParagraphOrder { paragraphs } => paragraphs.join("\n"),
    QuestionKind::Reformulation { accepted, .. } => accepted.first().cloned().unwrap_or_default(),
  }
}

pub fn grade(question: &Question, response: &Response) -> Result<Grade, GradeError> {
  let correct = match (&question.kind, response) {
    (
      QuestionKind::MultipleChoice { correct, .. }
      | QuestionKind::Listening { correct, .. }
      | QuestionKind::Reading { correct, .. },
      Response::Choice { index },
    ) => index == correct,

    (QuestionKind::Cloze { answers, .. }, Response::Blanks { values }) => {
      values.len() == answers.len() && values.iter().zip(answers).all(|(v, accepted)| matches_any(v, accepted))
    }

    (QuestionKind::WordBank { answers, .. }, Response::Blanks { values }) => same_sequence(values, answers),

    (QuestionKind::WordOrder { tokens }, Response::Sequence { items }) => same_sequence(items, tokens),

    (QuestionKind::ParagraphOrder { paragraphs }, Response::Sequence { items }) => same_sequence(items, paragraphs),

    (QuestionKind::Reformulation { accepted, .. }, Response::Text { value }) => matches_any(value, accepted),

    _ => {
      return Err(GradeError::Mismatch { question: question.kind.name(), response: response.name() });
    }
  };
  Ok(Grade { correct, expected: model_answer(question) })
}

fn same_sequence(items: &[String], expected: &[String]) -> bool {
  items.len() == expected.len()
    && items.iter().zip(expected).all(|(a, b)| normalize_answer(a) == normalize_answer(b))
}
