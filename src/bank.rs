//! Immutable question bank and the next-question selection policy.
//!
//! Selection narrows to a near-window around the session difficulty, falls back to the whole bank
//! when that window is too sparse, shuffles, and prefers questions not yet asked. Exhaustion is not
//! an error: once every candidate has been asked, the first shuffled candidate is repeated.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use rand::{seq::SliceRandom, Rng};
use tracing::{debug, error, info};

use crate::config::EngineSettings;
use crate::domain::Question;
use crate::error::ConfigError;

/// Read-only bank shared by every session. Cloning is cheap (one `Arc`).
#[derive(Clone, Debug)]
pub struct QuestionBank {
  questions: Arc<Vec<Question>>,
}

impl QuestionBank {
  pub fn new(questions: Vec<Question>) -> Result<Self, ConfigError> {
    if questions.is_empty() {
      return Err(ConfigError::EmptyBank);
    }
    Ok(Self { questions: Arc::new(questions) })
  }

  /// Config entries first, then seeds. Invalid config entries are skipped; an existing id is never overwritten.
  pub fn assemble(configured: Vec<Question>, seeds: Vec<Question>) -> Result<Self, ConfigError> {
    let mut seen = HashSet::<String>::new();
    let mut out = Vec::with_capacity(configured.len() + seeds.len());

    for q in configured {
      if let Err(e) = q.validate() {
        error!(target: "assessment", id = %q.id, error = %e, "Skipping bank item");
        continue;
      }
      if seen.insert(q.id.clone()) {
        out.push(q);
      } else {
        error!(target: "assessment", id = %q.id, "Skipping bank item: duplicate id");
      }
    }
    for q in seeds {
      if seen.insert(q.id.clone()) {
        out.push(q);
      }
    }

    let bank = Self::new(out)?;
    for (level, count) in bank.inventory() {
      info!(target: "assessment", level, count, "Startup question inventory");
    }
    Ok(bank)
  }

  pub fn len(&self) -> usize {
    self.questions.len()
  }

  #[cfg(test)]
  pub fn get(&self, id: &str) -> Option<&Question> {
    self.questions.iter().find(|q| q.id == id)
  }

  /// Question count per level, ascending.
  pub fn inventory(&self) -> Vec<(u8, usize)> {
    let mut by_level = HashMap::<u8, usize>::new();
    for q in self.questions.iter() {
      *by_level.entry(q.level).or_default() += 1;
    }
    let mut out: Vec<_> = by_level.into_iter().collect();
    out.sort_unstable();
    out
  }

  /// Candidates for `difficulty`: the near-window, or the whole bank if the window holds fewer than `min_pool`.
  pub fn candidates(&self, difficulty: u8, settings: &EngineSettings) -> Vec<&Question> {
    let near: Vec<&Question> = self
      .questions
      .iter()
      .filter(|q| q.level.abs_diff(difficulty) <= settings.near_window)
      .collect();
    if !near.is_empty() && near.len() >= settings.min_pool {
      near
    } else {
      debug!(target: "assessment", difficulty, near = near.len(), min_pool = settings.min_pool, "Near-window too sparse; using whole bank");
      self.questions.iter().collect()
    }
  }

  /// Pick the next question and record it in `asked`. Returns an owned copy.
  pub fn pick_next<R: Rng + ?Sized>(
    &self,
    difficulty: u8,
    asked: &mut HashSet<String>,
    settings: &EngineSettings,
    rng: &mut R,
  ) -> Question {
    let mut pool = self.candidates(difficulty, settings);
    pool.shuffle(rng);

    // Bank is never empty, so the pool always has a first element.
    let chosen = pool
      .iter()
      .find(|q| !asked.contains(&q.id))
      .copied()
      .unwrap_or(pool[0]);

    if asked.contains(&chosen.id) {
      debug!(target: "assessment", id = %chosen.id, difficulty, "Pool exhausted; repeating a question");
    }
    asked.insert(chosen.id.clone());
    chosen.clone()
  }
}
