//! Domain models: proficiency levels, question kinds, and the question record itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Highest difficulty index (C2).
pub const MAX_LEVEL: u8 = 5;

/// Six-band proficiency scale, low to high.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
  A1,
  A2,
  B1,
  B2,
  C1,
  C2,
}

impl Level {
  pub const ALL: [Level; 6] = [Level::A1, Level::A2, Level::B1, Level::B2, Level::C1, Level::C2];

  /// Map a difficulty index to its band. Indices above 5 land on C2.
  pub fn from_index(index: u8) -> Self {
    Self::ALL[usize::from(index.min(MAX_LEVEL))]
  }

  pub fn index(self) -> u8 {
    self as u8
  }

  pub fn label(self) -> &'static str {
    match self {
      Level::A1 => "A1",
      Level::A2 => "A2",
      Level::B1 => "B1",
      Level::B2 => "B2",
      Level::C1 => "C1",
      Level::C2 => "C2",
    }
  }
}

impl fmt::Display for Level {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Task variants. Each carries the fields needed to present and grade it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
  /// Pick one option; `correct` indexes `options`.
  MultipleChoice { options: Vec<String>, correct: usize },
  /// Free-typed gaps. `text` marks each gap with `___`; `answers[i]` lists accepted fillers for gap i.
  Cloze { text: String, answers: Vec<Vec<String>> },
  /// Gaps filled from a fixed bank of words.
  WordBank { text: String, bank: Vec<String>, answers: Vec<String> },
  /// Rebuild a sentence. `tokens` is stored in the correct order.
  WordOrder { tokens: Vec<String> },
  /// Rebuild a text. `paragraphs` is stored in the correct order.
  ParagraphOrder { paragraphs: Vec<String> },
  /// Listen to `transcript` (synthesised client side) then answer.
  Listening { transcript: String, locale: String, options: Vec<String>, correct: usize },
  Reading { passage: String, options: Vec<String>, correct: usize },
  /// Rewrite `source` keeping its meaning; any of `accepted` passes.
  Reformulation { source: String, accepted: Vec<String> },
}

impl QuestionKind {
  pub fn name(&self) -> &'static str {
    match self {
      QuestionKind::MultipleChoice { .. } => "multiple_choice",
      QuestionKind::Cloze { .. } => "cloze",
      QuestionKind::WordBank { .. } => "word_bank",
      QuestionKind::WordOrder { .. } => "word_order",
      QuestionKind::ParagraphOrder { .. } => "paragraph_order",
      QuestionKind::Listening { .. } => "listening",
      QuestionKind::Reading { .. } => "reading",
      QuestionKind::Reformulation { .. } => "reformulation",
    }
  }
}

/// Gap marker inside cloze / word-bank text.
pub const GAP: &str = "___";

/// Immutable question record. The bank hands out owned clones, never references.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
  pub id: String,
  /// 0..=5, see [`Level`].
  pub level: u8,
  pub points: u32,
  pub time_limit_secs: u32,
  pub prompt: String,
  #[serde(default)] pub explanation: String,
  #[serde(flatten)]
  pub kind: QuestionKind,
}

impl Question {
  pub fn band(&self) -> Level {
    Level::from_index(self.level)
  }

  /// Structural checks applied to config-provided questions before they enter the bank.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let bad = |reason: String| ConfigError::InvalidQuestion { id: self.id.clone(), reason };

    if self.id.trim().is_empty() {
      return Err(bad("empty id".into()));
    }
    if self.level > MAX_LEVEL {
      return Err(bad(format!("level {} is above {}", self.level, MAX_LEVEL)));
    }
    if self.points == 0 {
      return Err(bad("points must be positive".into()));
    }

    match &self.kind {
      QuestionKind::MultipleChoice { options, correct }
      | QuestionKind::Listening { options, correct, .. }
      | QuestionKind::Reading { options, correct, .. } => {
        if options.len() < 2 {
          return Err(bad("needs at least two options".into()));
        }
        if *correct >= options.len() {
          return Err(bad(format!("correct index {} out of {} options", correct, options.len())));
        }
      }
      QuestionKind::Cloze { text, answers } => {
        let gaps = text.matches(GAP).count();
        if gaps == 0 || gaps != answers.len() {
          return Err(bad(format!("{} gaps but {} answer lists", gaps, answers.len())));
        }
        if answers.iter().any(|a| a.is_empty()) {
          return Err(bad("every gap needs an accepted answer".into()));
        }
      }
      QuestionKind::WordBank { text, bank, answers } => {
        let gaps = text.matches(GAP).count();
        if gaps == 0 || gaps != answers.len() {
          return Err(bad(format!("{} gaps but {} answers", gaps, answers.len())));
        }
        if let Some(missing) = answers.iter().find(|a| !bank.contains(a)) {
          return Err(bad(format!("answer '{}' is not in the bank", missing)));
        }
      }
      QuestionKind::WordOrder { tokens } => {
        if tokens.len() < 2 {
          return Err(bad("needs at least two tokens".into()));
        }
      }
      QuestionKind::ParagraphOrder { paragraphs } => {
        if paragraphs.len() < 2 {
          return Err(bad("needs at least two paragraphs".into()));
        }
      }
      QuestionKind::Reformulation { accepted, .. } => {
        if accepted.is_empty() {
          return Err(bad("needs at least one accepted rewrite".into()));
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn mcq(correct: usize) -> Question {
    Question {
      id: "q1".into(),
      level: 2,
      points: 10,
      time_limit_secs: 30,
      prompt: "Pick".into(),
      explanation: String::new(),
      kind: QuestionKind::MultipleChoice { options: vec!["a".into(), "b".into()], correct },
    }
  }

  #[test]
  fn level_from_index_clamps_to_c2() {
    assert_eq!(Level::from_index(0), Level::A1);
    assert_eq!(Level::from_index(2), Level::B1);
    assert_eq!(Level::from_index(9), Level::C2);
    assert_eq!(Level::C1.index(), 4);
  }

  #[test]
  fn validate_rejects_out_of_range_choice() {
    assert!(mcq(1).validate().is_ok());
    assert!(mcq(2).validate().is_err());
  }

  #[test]
  fn validate_checks_cloze_gap_count() {
    let mut q = mcq(0);
    q.kind = QuestionKind::Cloze {
      text: "She ___ to work and ___ home.".into(),
      answers: vec![vec!["goes".into()]],
    };
    assert!(q.validate().is_err());
  }

  #[test]
  fn question_deserializes_with_flattened_kind() {
    let json = r#"{
      "id": "wo-1", "level": 1, "points": 5, "time_limit_secs": 40,
      "prompt": "Order the words", "kind": "word_order",
      "tokens": ["I", "like", "tea"]
    }"#;
    let q: Question = serde_json::from_str(json).unwrap();
    assert_eq!(q.kind.name(), "word_order");
    assert_eq!(q.explanation, "");
    assert!(q.validate().is_ok());
  }
}
