//! Session data: configuration, lifecycle phase, running counters and the final summary.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::domain::{Level, MAX_LEVEL};
use crate::error::ConfigError;
use crate::persistence::Preferences;
use crate::scoring::{LevelEstimate, LevelTracker};

/// Fixed difficulty, or adapt from the streak.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TargetModeRepr", into = "TargetModeRepr")]
pub enum TargetMode {
  Auto,
  Fixed(Level),
}

/// Wire form: the string `"auto"` or a level index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetModeRepr {
  Level(i64),
  Named(String),
}

impl TryFrom<TargetModeRepr> for TargetMode {
  type Error = ConfigError;

  fn try_from(repr: TargetModeRepr) -> Result<Self, Self::Error> {
    match repr {
      TargetModeRepr::Named(s) if s.eq_ignore_ascii_case("auto") => Ok(TargetMode::Auto),
      TargetModeRepr::Named(s) => Err(ConfigError::TargetMode(s)),
      TargetModeRepr::Level(n) => level_index(n)
        .map(|i| TargetMode::Fixed(Level::from_index(i)))
        .ok_or(ConfigError::TargetLevel(n)),
    }
  }
}

impl From<TargetMode> for TargetModeRepr {
  fn from(mode: TargetMode) -> Self {
    match mode {
      TargetMode::Auto => TargetModeRepr::Named("auto".into()),
      TargetMode::Fixed(level) => TargetModeRepr::Level(i64::from(level.index())),
    }
  }
}

fn level_index(n: i64) -> Option<u8> {
  u8::try_from(n).ok().filter(|i| *i <= MAX_LEVEL)
}

/// Start request as sent by a client. Nothing here is trusted until [`SessionRequest::validate`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
  #[serde(default)] pub target_mode: Option<TargetModeRepr>,
  #[serde(default)] pub total_planned: Option<i64>,
  #[serde(default)] pub starting_difficulty: Option<i64>,
  #[serde(default)] pub learner: Option<String>,
}

/// Validated session configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
  pub target: TargetMode,
  pub total_planned: u32,
  pub starting_difficulty: u8,
}

impl SessionRequest {
  /// Missing fields fall back to saved preferences, then to engine defaults. Present fields are
  /// checked, never clamped.
  pub fn validate(&self, settings: &EngineSettings, prefs: Option<&Preferences>) -> Result<SessionConfig, ConfigError> {
    let target = match &self.target_mode {
      Some(repr) => TargetMode::try_from(repr.clone())?,
      None => prefs.and_then(|p| p.target_mode).unwrap_or(TargetMode::Auto),
    };

    let total_planned = match self.total_planned {
      Some(n) => u32::try_from(n).ok().filter(|n| *n > 0).ok_or(ConfigError::TotalPlanned(n))?,
      None => prefs
        .and_then(|p| p.total_planned)
        .filter(|n| *n > 0)
        .unwrap_or(settings.default_total_planned),
    };

    let starting_difficulty = match (target, self.starting_difficulty) {
      (TargetMode::Fixed(_), Some(_)) => return Err(ConfigError::StartingDifficultyWithFixedTarget),
      (TargetMode::Fixed(level), None) => level.index(),
      (TargetMode::Auto, Some(n)) => level_index(n).ok_or(ConfigError::StartingDifficulty(n))?,
      (TargetMode::Auto, None) => settings.auto_start_difficulty.min(MAX_LEVEL),
    };

    Ok(SessionConfig { target, total_planned, starting_difficulty })
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Idle,
  Running,
  Paused,
  Finished,
}

/// Mutable state of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
  pub sequence_index: u32,
  pub total_planned: u32,
  pub score: u32,
  /// Consecutive correct answers; 0 after any miss or timeout.
  pub streak: u32,
  /// Live difficulty, always 0..=5.
  pub difficulty: u8,
  /// Grows during a run; cleared only by a new start.
  pub asked: HashSet<String>,
  pub tracker: LevelTracker,
  pub target: TargetMode,
}

impl Session {
  pub fn new(target: TargetMode, total_planned: u32, difficulty: u8) -> Self {
    Self {
      sequence_index: 0,
      total_planned,
      score: 0,
      streak: 0,
      difficulty: difficulty.min(MAX_LEVEL),
      asked: HashSet::new(),
      tracker: LevelTracker::default(),
      target,
    }
  }

  pub fn from_config(cfg: &SessionConfig) -> Self {
    Self::new(cfg.target, cfg.total_planned, cfg.starting_difficulty)
  }

  pub fn estimate(&self) -> Option<LevelEstimate> {
    self.tracker.estimate()
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
  pub index: u32,
  pub total: u32,
  pub score: u32,
  pub streak: u32,
  pub difficulty: u8,
  pub remaining_secs: u32,
  pub phase: Phase,
}

/// Archived at the end of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
  pub score: u32,
  pub answered: u32,
  pub correct: u32,
  pub incorrect: u32,
  /// `None` when nothing was answered.
  pub estimate: Option<String>,
  pub quit_early: bool,
}

impl SessionSummary {
  pub fn of(session: &Session, quit_early: bool) -> Self {
    Self {
      score: session.score,
      answered: session.tracker.answered_count,
      correct: session.tracker.correct_count,
      incorrect: session.tracker.incorrect_count(),
      estimate: session.estimate().map(|e| e.to_string()),
      quit_early,
    }
  }
}
