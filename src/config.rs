//! Loading service configuration (engine settings, persistence, optional question bank) from TOML.
//!
//! Example:
//! ```toml
//! [engine]
//! min_pool = 6
//! escalation = "reset"
//!
//! [persistence]
//! dir = "./data"
//!
//! [[questions]]
//! id = "bank-mcq-1"
//! level = 2
//! points = 10
//! time_limit_secs = 30
//! prompt = "Choose the correct form."
//! kind = "multiple_choice"
//! options = ["has gone", "has went"]
//! correct = 0
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Question, MAX_LEVEL};
use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceConfig {
  #[serde(default)]
  pub engine: EngineSettings,
  #[serde(default)]
  pub persistence: PersistenceSettings,
  #[serde(default)]
  pub questions: Vec<Question>,
}

/// How "auto" mode keeps escalating once a streak passes the threshold.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
  /// Every correct answer at streak >= 2 raises difficulty again.
  #[default]
  Repeat,
  /// Raising difficulty resets the streak; two more correct answers are needed for the next step.
  Reset,
}

/// Selection, timing and adaptation tunables.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
  pub near_window: u8,
  pub min_pool: usize,
  pub auto_start_difficulty: u8,
  pub default_total_planned: u32,
  pub secs_per_level: u32,
  pub time_floor_secs: u32,
  pub time_ceiling_secs: u32,
  pub escalation: Escalation,
  /// How long a finished session stays addressable (for restart, summary reads) before eviction.
  pub finished_ttl_secs: u64,
  /// Fixed seed for question selection. Unset draws from entropy.
  pub seed: Option<u64>,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      near_window: 1,
      min_pool: 8,
      auto_start_difficulty: 2,
      default_total_planned: 20,
      secs_per_level: 8,
      time_floor_secs: 25,
      time_ceiling_secs: 180,
      escalation: Escalation::Repeat,
      finished_ttl_secs: 300,
      seed: None,
    }
  }
}

impl EngineSettings {
  /// Reject values that would break selection or the clock. Nothing is clamped.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let bad = |name: &'static str, reason: String| Err(ConfigError::Setting { name, reason });

    if self.near_window > MAX_LEVEL {
      return bad("near_window", format!("must be at most {}, got {}", MAX_LEVEL, self.near_window));
    }
    if self.min_pool == 0 {
      return bad("min_pool", "must be at least 1".into());
    }
    if self.auto_start_difficulty > MAX_LEVEL {
      return bad("auto_start_difficulty", format!("must be between 0 and {}, got {}", MAX_LEVEL, self.auto_start_difficulty));
    }
    if self.default_total_planned == 0 {
      return bad("default_total_planned", "must be positive".into());
    }
    if self.time_floor_secs == 0 {
      return bad("time_floor_secs", "must be positive".into());
    }
    if self.time_floor_secs > self.time_ceiling_secs {
      return bad(
        "time_ceiling_secs",
        format!("{} is below time_floor_secs {}", self.time_ceiling_secs, self.time_floor_secs),
      );
    }
    if self.finished_ttl_secs == 0 {
      return bad("finished_ttl_secs", "must be positive".into());
    }
    Ok(())
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PersistenceSettings {
  /// Directory for JSON snapshots. None keeps snapshots in memory.
  #[serde(default)]
  pub dir: Option<String>,
}

pub fn parse_config(s: &str) -> Result<ServiceConfig, toml::de::Error> {
  toml::from_str::<ServiceConfig>(s)
}

/// Attempt to load `ServiceConfig` from ASSESSMENT_CONFIG_PATH. On any IO, parsing or validation
/// error, returns None.
pub fn load_config_from_env() -> Option<ServiceConfig> {
  let path = std::env::var("ASSESSMENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => match cfg.engine.validate() {
        Ok(()) => {
          info!(target: "cloe_prep_backend", %path, questions = cfg.questions.len(), "Loaded service config (TOML)");
          Some(cfg)
        }
        Err(e) => {
          error!(target: "cloe_prep_backend", %path, error = %e, "Invalid [engine] settings; using defaults");
          None
        }
      },
      Err(e) => {
        error!(target: "cloe_prep_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "cloe_prep_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// SNAPSHOT_DIR wins over the config file.
pub fn snapshot_dir(cfg: &ServiceConfig) -> Option<String> {
  std::env::var("SNAPSHOT_DIR")
    .ok()
    .filter(|d| !d.trim().is_empty())
    .or_else(|| cfg.persistence.dir.clone())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestionKind;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_config("").unwrap();
    assert_eq!(cfg.engine.min_pool, 8);
    assert_eq!(cfg.engine.time_floor_secs, 25);
    assert_eq!(cfg.engine.time_ceiling_secs, 180);
    assert_eq!(cfg.engine.escalation, Escalation::Repeat);
    assert!(cfg.engine.seed.is_none());
    assert!(cfg.persistence.dir.is_none());
    assert!(cfg.questions.is_empty());
  }

  #[test]
  fn partial_engine_section_keeps_other_defaults() {
    let cfg = parse_config("[engine]\nmin_pool = 4\nescalation = \"reset\"\nseed = 7\n").unwrap();
    assert_eq!(cfg.engine.min_pool, 4);
    assert_eq!(cfg.engine.seed, Some(7));
    assert_eq!(cfg.engine.escalation, Escalation::Reset);
    assert_eq!(cfg.engine.near_window, 1);
    assert_eq!(cfg.engine.secs_per_level, 8);
  }

  #[test]
  fn parses_question_bank_entries() {
    let src = r#"
[persistence]
dir = "/tmp/snapshots"

[[questions]]
id = "cfg-read-1"
level = 3
points = 15
time_limit_secs = 60
prompt = "What is the main idea?"
kind = "reading"
passage = "Remote work changed commuting patterns."
options = ["Commuting", "Cooking"]
correct = 0

[[questions]]
id = "cfg-cloze-1"
level = 1
points = 5
time_limit_secs = 30
prompt = "Fill the gap"
kind = "cloze"
text = "I ___ coffee every morning."
answers = [["drink", "have"]]
"#;
    let cfg = parse_config(src).unwrap();
    assert_eq!(cfg.persistence.dir.as_deref(), Some("/tmp/snapshots"));
    assert_eq!(cfg.questions.len(), 2);
    assert!(matches!(cfg.questions[0].kind, QuestionKind::Reading { correct: 0, .. }));
    assert!(matches!(&cfg.questions[1].kind, QuestionKind::Cloze { answers, .. } if answers[0].len() == 2));
  }

  #[test]
  fn default_settings_are_valid() {
    assert_eq!(EngineSettings::default().validate(), Ok(()));
  }

  #[test]
  fn inverted_time_bounds_are_rejected() {
    let cfg = parse_config("[engine]\ntime_floor_secs = 200\ntime_ceiling_secs = 180\n").unwrap();
    let err = cfg.engine.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Setting { name: "time_ceiling_secs", .. }));
    assert!(err.to_string().contains("time_floor_secs 200"));
  }

  #[test]
  fn out_of_range_settings_are_rejected_not_clamped() {
    let cases = [
      EngineSettings { auto_start_difficulty: 6, ..EngineSettings::default() },
      EngineSettings { near_window: 9, ..EngineSettings::default() },
      EngineSettings { min_pool: 0, ..EngineSettings::default() },
      EngineSettings { default_total_planned: 0, ..EngineSettings::default() },
      EngineSettings { time_floor_secs: 0, ..EngineSettings::default() },
      EngineSettings { finished_ttl_secs: 0, ..EngineSettings::default() },
    ];
    for settings in cases {
      assert!(settings.validate().is_err(), "{:?} accepted", settings);
    }
  }
}
