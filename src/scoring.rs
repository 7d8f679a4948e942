//! Scoring, streak-driven difficulty adaptation, and the weighted level estimate.
//!
//! Every answered question adds its weight to the denominator; only correct answers add to the
//! numerator. Misses therefore pull the estimate below the level actually reached. That lag is
//! the intended behaviour, not a rounding artefact.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Escalation;
use crate::domain::{Level, Question, MAX_LEVEL};
use crate::session::{Session, TargetMode};

/// Streak length at which "auto" mode raises difficulty.
pub const ESCALATION_STREAK: u32 = 2;

/// Harder questions weigh more: `1 + level * 0.25`.
pub fn weight_for(level: u8) -> f64 {
  1.0 + f64::from(level) * 0.25
}

/// Sufficient statistics for the level estimate. Never reset mid-session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelTracker {
  pub answered_count: u32,
  pub correct_count: u32,
  pub total_weight: f64,
  pub weighted_level_sum: f64,
}

impl LevelTracker {
  pub fn record(&mut self, level: u8, correct: bool) {
    let weight = weight_for(level);
    self.answered_count += 1;
    self.total_weight += weight;
    if correct {
      self.correct_count += 1;
      self.weighted_level_sum += f64::from(level) * weight;
    }
  }

  pub fn incorrect_count(&self) -> u32 {
    self.answered_count - self.correct_count
  }

  pub fn accuracy(&self) -> Option<f64> {
    (self.answered_count > 0).then(|| f64::from(self.correct_count) / f64::from(self.answered_count))
  }

  /// None until something has been answered.
  pub fn estimate(&self) -> Option<LevelEstimate> {
    let accuracy = self.accuracy()?;
    if self.total_weight <= 0.0 {
      return None;
    }
    let average = self.weighted_level_sum / self.total_weight;
    let rounded = average.round().clamp(0.0, f64::from(MAX_LEVEL)) as u8;
    Some(LevelEstimate {
      level: Level::from_index(rounded),
      consistency: Consistency::from_accuracy(accuracy),
      average,
      accuracy,
    })
  }
}

/// Qualitative sub-rating from raw accuracy, independent of the rounded level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
  Weak,
  Steady,
  Strong,
}

impl Consistency {
  pub fn from_accuracy(accuracy: f64) -> Self {
    if accuracy < 0.33 {
      Consistency::Weak
    } else if accuracy > 0.66 {
      Consistency::Strong
    } else {
      Consistency::Steady
    }
  }

  fn suffix(self) -> &'static str {
    match self {
      Consistency::Weak => "-",
      Consistency::Steady => "",
      Consistency::Strong => "+",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelEstimate {
  pub level: Level,
  pub consistency: Consistency,
  pub average: f64,
  pub accuracy: f64,
}

/// Renders as `B1-`, `B1` or `B1+`.
impl fmt::Display for LevelEstimate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.level, self.consistency.suffix())
  }
}

/// What one answer did to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEffect {
  pub correct: bool,
  pub awarded: u32,
  pub streak: u32,
  pub difficulty_before: u8,
  pub difficulty_after: u8,
}

/// Apply one outcome. A timeout is passed as `correct = false`.
pub fn register_answer(session: &mut Session, question: &Question, correct: bool, escalation: Escalation) -> AnswerEffect {
  let difficulty_before = session.difficulty;
  session.tracker.record(question.level, correct);

  let mut awarded = 0;
  if correct {
    awarded = question.points;
    session.score += question.points;
    session.streak += 1;
    if session.target == TargetMode::Auto && session.streak >= ESCALATION_STREAK {
      if session.difficulty < MAX_LEVEL {
        session.difficulty += 1;
      }
      if escalation == Escalation::Reset {
        session.streak = 0;
      }
    }
  } else {
    session.streak = 0;
    if session.target == TargetMode::Auto {
      session.difficulty = session.difficulty.saturating_sub(1);
    }
  }

  AnswerEffect {
    correct,
    awarded,
    streak: session.streak,
    difficulty_before,
    difficulty_after: session.difficulty,
  }
}
