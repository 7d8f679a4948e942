//! Per-question countdown and the clock task that drives it.
//!
//! `QuestionTimer` is plain data: armed when a question is presented, disarmed on answer, pause,
//! quit or expiry. `Ticker` is the only thing that touches the wall clock; dropping it cancels it.

use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::EngineSettings;
use crate::domain::Question;

/// The clock granularity. Budgets and `remaining_secs` are counted in these ticks.
pub const TICK: Duration = Duration::from_secs(1);

/// Seconds allotted to `question`: its base limit plus `secs_per_level` per level, bounded by the
/// floor and ceiling. The ceiling wins if the two are inverted.
pub fn time_budget(question: &Question, settings: &EngineSettings) -> u32 {
  let raw = question
    .time_limit_secs
    .saturating_add(u32::from(question.level).saturating_mul(settings.secs_per_level));
  raw.max(settings.time_floor_secs).min(settings.time_ceiling_secs)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
  /// Not armed; nothing happened.
  Idle,
  Running { remaining: u32 },
  /// Reached zero on this tick. The timer disarms itself.
  Expired,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuestionTimer {
  budget: u32,
  remaining: u32,
  armed: bool,
}

impl QuestionTimer {
  pub fn arm(&mut self, budget: u32) {
    self.budget = budget;
    self.remaining = budget;
    self.armed = true;
  }

  /// Stop counting, keeping the remaining time (used by pause).
  pub fn disarm(&mut self) {
    self.armed = false;
  }

  /// Continue from the remaining time without resetting it.
  pub fn rearm(&mut self) {
    if self.remaining > 0 {
      self.armed = true;
    }
  }

  #[cfg(test)]
  pub fn is_armed(&self) -> bool {
    self.armed
  }

  pub fn remaining(&self) -> u32 {
    self.remaining
  }

  pub fn budget(&self) -> u32 {
    self.budget
  }

  pub fn tick(&mut self) -> TickOutcome {
    if !self.armed {
      return TickOutcome::Idle;
    }
    self.remaining = self.remaining.saturating_sub(1);
    if self.remaining == 0 {
      self.armed = false;
      TickOutcome::Expired
    } else {
      TickOutcome::Running { remaining: self.remaining }
    }
  }
}

/// Background clock. Calls `on_tick` every `period` until it returns false or the handle is dropped.
pub struct Ticker {
  handle: JoinHandle<()>,
}

impl Ticker {
  pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
  where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
  {
    let handle = tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      // The first tick of a tokio interval completes immediately.
      interval.tick().await;
      loop {
        interval.tick().await;
        if !on_tick().await {
          debug!(target: "assessment", "Ticker stopped by callback");
          break;
        }
      }
    });
    Self { handle }
  }

  pub fn cancel(&self) {
    self.handle.abort();
  }
}

impl Drop for Ticker {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestionKind;
  use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
  };

  fn question(level: u8, time_limit_secs: u32) -> Question {
    Question {
      id: "t".into(),
      level,
      points: 1,
      time_limit_secs,
      prompt: String::new(),
      explanation: String::new(),
      kind: QuestionKind::WordOrder { tokens: vec!["a".into(), "b".into()] },
    }
  }

  #[test]
  fn budget_adds_per_level_and_clamps() {
    let s = EngineSettings::default();
    assert_eq!(time_budget(&question(2, 30), &s), 46);
    assert_eq!(time_budget(&question(0, 10), &s), 25);
    assert_eq!(time_budget(&question(5, 170), &s), 180);
  }

  #[test]
  fn inverted_bounds_do_not_panic() {
    let s = EngineSettings { time_floor_secs: 200, ..EngineSettings::default() };
    assert_eq!(time_budget(&question(2, 30), &s), 180);
  }

  #[test]
  fn countdown_expires_once_then_idles() {
    let mut t = QuestionTimer::default();
    assert_eq!(t.tick(), TickOutcome::Idle);
    t.arm(2);
    assert_eq!(t.tick(), TickOutcome::Running { remaining: 1 });
    assert_eq!(t.tick(), TickOutcome::Expired);
    assert!(!t.is_armed());
    assert_eq!(t.tick(), TickOutcome::Idle);
  }

  #[test]
  fn disarm_freezes_remaining_time() {
    let mut t = QuestionTimer::default();
    t.arm(10);
    t.tick();
    t.disarm();
    assert_eq!(t.tick(), TickOutcome::Idle);
    assert_eq!(t.remaining(), 9);
    t.rearm();
    assert_eq!(t.tick(), TickOutcome::Running { remaining: 8 });
    assert_eq!(t.budget(), 10);
  }

  #[tokio::test(start_paused = true)]
  async fn ticker_runs_until_callback_declines() {
    let count = Arc::new(AtomicU32::new(0));
    let seen = count.clone();
    let _ticker = Ticker::spawn(Duration::from_millis(100), move || {
      let seen = seen.clone();
      async move { seen.fetch_add(1, Ordering::SeqCst) + 1 < 3 }
    });
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn cancelled_ticker_stops_ticking() {
    let count = Arc::new(AtomicU32::new(0));
    let seen = count.clone();
    let ticker = Ticker::spawn(Duration::from_millis(100), move || {
      let seen = seen.clone();
      async move {
        seen.fetch_add(1, Ordering::SeqCst);
        true
      }
    });
    tokio::time::sleep(Duration::from_millis(350)).await;
    ticker.cancel();
    let at_cancel = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(count.load(Ordering::SeqCst), at_cancel);
  }
}
