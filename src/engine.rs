//! Adaptive assessment engine: owns one session and drives it through
//! `Idle -> Running <-> Paused -> Finished`.
//!
//! All transitions are synchronous. The host feeds it answers and clock ticks and drains the
//! queued [`SessionEvent`]s afterwards. Answers and timer expiry race for the same question; the
//! phase guard plus the optional question id on submissions make the loser a no-op.

use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info, instrument};

use crate::bank::QuestionBank;
use crate::config::EngineSettings;
use crate::domain::Question;
use crate::error::SessionError;
use crate::scoring::{register_answer, AnswerEffect, LevelEstimate};
use crate::session::{Phase, Progress, Session, SessionConfig, SessionSummary, TargetMode};
use crate::timer::{time_budget, QuestionTimer, TickOutcome};

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
  QuestionChanged { question_id: String, index: u32 },
  TimedOut { question_id: String },
  Finished { summary: SessionSummary },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
  NotRunning(Phase),
  /// The submission named a question that is no longer current.
  StaleQuestion,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
  Accepted { question: Question, effect: AnswerEffect, finished: bool },
  Ignored(IgnoreReason),
}

pub struct AssessmentEngine {
  bank: QuestionBank,
  settings: EngineSettings,
  phase: Phase,
  session: Session,
  current: Option<Question>,
  timer: QuestionTimer,
  rng: StdRng,
  events: Vec<SessionEvent>,
  summary: Option<SessionSummary>,
}

impl AssessmentEngine {
  pub fn new(bank: QuestionBank, settings: EngineSettings) -> Self {
    Self::with_rng(bank, settings, StdRng::from_entropy())
  }

  /// Deterministic selection order, for reproducible runs.
  pub fn with_seed(bank: QuestionBank, settings: EngineSettings, seed: u64) -> Self {
    Self::with_rng(bank, settings, StdRng::seed_from_u64(seed))
  }

  fn with_rng(bank: QuestionBank, settings: EngineSettings, rng: StdRng) -> Self {
    let idle = Session::new(TargetMode::Auto, 1, settings.auto_start_difficulty);
    Self {
      bank,
      settings,
      phase: Phase::Idle,
      session: idle,
      current: None,
      timer: QuestionTimer::default(),
      rng,
      events: Vec::new(),
      summary: None,
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  #[cfg(test)]
  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn current_question(&self) -> Option<&Question> {
    self.current.as_ref()
  }

  pub fn summary(&self) -> Option<&SessionSummary> {
    self.summary.as_ref()
  }

  pub fn estimate(&self) -> Option<LevelEstimate> {
    self.session.estimate()
  }

  pub fn progress(&self) -> Progress {
    Progress {
      index: self.session.sequence_index,
      total: self.session.total_planned,
      score: self.session.score,
      streak: self.session.streak,
      difficulty: self.session.difficulty,
      remaining_secs: self.timer.remaining(),
      phase: self.phase,
    }
  }

  pub fn drain_events(&mut self) -> Vec<SessionEvent> {
    std::mem::take(&mut self.events)
  }

  /// Reset everything and present the first question. Only from Idle or Finished.
  #[instrument(level = "info", skip(self), fields(mode = ?cfg.target, total = cfg.total_planned))]
  pub fn start(&mut self, cfg: &SessionConfig) -> Result<&Question, SessionError> {
    if matches!(self.phase, Phase::Running | Phase::Paused) {
      return Err(SessionError::AlreadyRunning);
    }
    self.session = Session::from_config(cfg);
    self.summary = None;
    self.events.clear();
    self.phase = Phase::Running;
    info!(target: "assessment", difficulty = self.session.difficulty, "Session started");
    Ok(self.present_next())
  }

  pub fn pause(&mut self) -> bool {
    if self.phase != Phase::Running {
      return false;
    }
    self.phase = Phase::Paused;
    self.timer.disarm();
    debug!(target: "assessment", remaining = self.timer.remaining(), "Session paused");
    true
  }

  pub fn resume(&mut self) -> bool {
    if self.phase != Phase::Paused {
      return false;
    }
    self.phase = Phase::Running;
    self.timer.rearm();
    debug!(target: "assessment", remaining = self.timer.remaining(), "Session resumed");
    true
  }

  /// One clock tick. Expiry counts as a miss and advances.
  pub fn tick(&mut self) -> TickOutcome {
    if self.phase != Phase::Running {
      return TickOutcome::Idle;
    }
    let outcome = self.timer.tick();
    if outcome == TickOutcome::Expired {
      if let Some(question) = self.current.clone() {
        let effect = register_answer(&mut self.session, &question, false, self.settings.escalation);
        info!(target: "assessment", id = %question.id, difficulty = effect.difficulty_after, "Question timed out");
        self.events.push(SessionEvent::TimedOut { question_id: question.id });
        self.advance();
      }
    }
    outcome
  }

  /// The question an answer naming `question_id` would be registered against, or why it would be
  /// ignored. Changes nothing.
  pub fn answerable(&self, question_id: Option<&str>) -> Result<&Question, IgnoreReason> {
    if self.phase != Phase::Running {
      return Err(IgnoreReason::NotRunning(self.phase));
    }
    let Some(question) = self.current.as_ref() else {
      return Err(IgnoreReason::NotRunning(self.phase));
    };
    if question_id.is_some_and(|id| id != question.id) {
      return Err(IgnoreReason::StaleQuestion);
    }
    Ok(question)
  }

  /// Register an outcome for the current question. `question_id`, when given, must match it.
  #[instrument(level = "debug", skip(self))]
  pub fn submit_answer(&mut self, question_id: Option<&str>, correct: bool) -> SubmitOutcome {
    let question = match self.answerable(question_id) {
      Ok(q) => q.clone(),
      Err(reason) => {
        debug!(target: "assessment", ?reason, submitted = ?question_id, "Ignoring answer");
        return SubmitOutcome::Ignored(reason);
      }
    };

    self.timer.disarm();
    let effect = register_answer(&mut self.session, &question, correct, self.settings.escalation);
    info!(
      target: "assessment",
      id = %question.id,
      correct,
      score = self.session.score,
      streak = effect.streak,
      difficulty = effect.difficulty_after,
      "Answer registered"
    );
    self.advance();
    SubmitOutcome::Accepted { question, effect, finished: self.phase == Phase::Finished }
  }

  /// End the run early. A second call changes nothing.
  pub fn quit(&mut self) -> bool {
    if !matches!(self.phase, Phase::Running | Phase::Paused) {
      return false;
    }
    self.finish(true);
    true
  }

  fn advance(&mut self) {
    self.session.sequence_index += 1;
    if self.session.sequence_index >= self.session.total_planned {
      self.finish(false);
    } else {
      self.present_next();
    }
  }

  fn present_next(&mut self) -> &Question {
    let question = self.bank.pick_next(
      self.session.difficulty,
      &mut self.session.asked,
      &self.settings,
      &mut self.rng,
    );
    self.timer.arm(time_budget(&question, &self.settings));
    debug!(target: "assessment", id = %question.id, level = question.level, budget = self.timer.budget(), "Question presented");
    self.events.push(SessionEvent::QuestionChanged {
      question_id: question.id.clone(),
      index: self.session.sequence_index,
    });
    self.current.insert(question)
  }

  fn finish(&mut self, quit_early: bool) {
    self.phase = Phase::Finished;
    self.timer.disarm();
    self.current = None;
    let summary = SessionSummary::of(&self.session, quit_early);
    info!(target: "assessment", score = summary.score, answered = summary.answered, estimate = ?summary.estimate, quit_early, "Session finished");
    self.events.push(SessionEvent::Finished { summary: summary.clone() });
    self.summary = Some(summary);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Escalation;
  use crate::domain::{Level, MAX_LEVEL};
  use crate::seeds::seed_questions;
  use rand::Rng;

  fn engine(seed: u64) -> AssessmentEngine {
    AssessmentEngine::with_seed(QuestionBank::new(seed_questions()).unwrap(), EngineSettings::default(), seed)
  }

  fn fixed(level: Level, total: u32) -> SessionConfig {
    SessionConfig { target: TargetMode::Fixed(level), total_planned: total, starting_difficulty: level.index() }
  }

  fn auto(start: u8, total: u32) -> SessionConfig {
    SessionConfig { target: TargetMode::Auto, total_planned: total, starting_difficulty: start }
  }

  fn answer(e: &mut AssessmentEngine, correct: bool) -> SubmitOutcome {
    e.submit_answer(None, correct)
  }

  #[test]
  fn fixed_b1_scenario() {
    let mut e = engine(11);
    e.start(&fixed(Level::B1, 5)).unwrap();
    let mut expected = 0;
    for correct in [true, true, false, true, true] {
      let points = e.current_question().unwrap().points;
      if correct {
        expected += points;
      }
      assert!(matches!(answer(&mut e, correct), SubmitOutcome::Accepted { .. }));
    }
    assert_eq!(e.phase(), Phase::Finished);
    let s = e.session();
    assert_eq!(s.score, expected);
    assert_eq!(s.streak, 2);
    assert_eq!(s.tracker.answered_count, 5);
    assert_eq!(s.tracker.correct_count, 4);
    assert_eq!(s.difficulty, 2);
    assert!(e.current_question().is_none());
  }

  #[test]
  fn auto_scenario_raises_after_second_correct() {
    let mut e = engine(5);
    e.start(&auto(2, 10)).unwrap();
    answer(&mut e, true);
    assert_eq!(e.session().difficulty, 2);
    answer(&mut e, true);
    assert_eq!(e.session().difficulty, 3);
    // Default escalation keeps raising while the streak holds.
    answer(&mut e, true);
    assert_eq!(e.session().difficulty, 4);
  }

  #[test]
  fn reset_escalation_waits_for_a_new_pair() {
    let settings = EngineSettings { escalation: Escalation::Reset, ..EngineSettings::default() };
    let mut e = AssessmentEngine::with_seed(QuestionBank::new(seed_questions()).unwrap(), settings, 5);
    e.start(&auto(2, 10)).unwrap();
    for _ in 0..3 {
      answer(&mut e, true);
    }
    assert_eq!(e.session().difficulty, 3);
  }

  #[test]
  fn difficulty_and_streak_invariants_hold_for_random_runs() {
    let mut rng = StdRng::seed_from_u64(99);
    for seed in 0..20 {
      let mut e = engine(seed);
      e.start(&auto(rng.gen_range(0..=MAX_LEVEL), 40)).unwrap();
      while e.phase() == Phase::Running {
        let before = e.session().difficulty;
        let correct = rng.gen_bool(0.6);
        answer(&mut e, correct);
        let s = e.session();
        assert!(s.difficulty <= MAX_LEVEL);
        if !correct {
          assert_eq!(s.streak, 0);
          assert_eq!(s.difficulty, before.saturating_sub(1));
        }
      }
      assert_eq!(e.session().tracker.answered_count, 40);
    }
  }

  #[test]
  fn no_repeats_while_window_has_unseen_questions() {
    let mut e = engine(21);
    // Fixed B1: near-window is levels 1..=3, 15 questions.
    e.start(&fixed(Level::B1, 15)).unwrap();
    let mut seen = std::collections::HashSet::new();
    while let Some(q) = e.current_question() {
      assert!(seen.insert(q.id.clone()), "{} presented twice", q.id);
      answer(&mut e, false);
    }
    assert_eq!(seen.len(), 15);
  }

  #[test]
  fn paused_session_ignores_answers_and_ticks() {
    let mut e = engine(1);
    e.start(&fixed(Level::A2, 3)).unwrap();
    assert!(e.pause());
    let before = e.progress();
    assert_eq!(answer(&mut e, true), SubmitOutcome::Ignored(IgnoreReason::NotRunning(Phase::Paused)));
    assert_eq!(e.tick(), TickOutcome::Idle);
    assert_eq!(e.progress(), before);
    assert!(!e.pause());
    assert!(e.resume());
    assert!(matches!(answer(&mut e, true), SubmitOutcome::Accepted { .. }));
  }

  #[test]
  fn timeout_counts_as_miss_and_advances() {
    let mut e = engine(2);
    e.start(&auto(3, 4)).unwrap();
    answer(&mut e, true);
    let timed = e.current_question().unwrap().id.clone();
    let budget = e.progress().remaining_secs;
    e.drain_events();

    let mut last = TickOutcome::Idle;
    for _ in 0..budget {
      last = e.tick();
    }
    assert_eq!(last, TickOutcome::Expired);
    let s = e.session();
    assert_eq!(s.streak, 0);
    assert_eq!(s.difficulty, 2);
    assert_eq!(s.sequence_index, 2);
    assert_eq!(s.tracker.answered_count, 2);

    let events = e.drain_events();
    assert_eq!(events[0], SessionEvent::TimedOut { question_id: timed.clone() });
    assert!(matches!(events[1], SessionEvent::QuestionChanged { index: 2, .. }));

    // A late answer for the expired question loses the race.
    assert_eq!(e.answerable(Some(&timed)).unwrap_err(), IgnoreReason::StaleQuestion);
    assert!(e.answerable(None).is_ok());
    assert_eq!(e.submit_answer(Some(&timed), true), SubmitOutcome::Ignored(IgnoreReason::StaleQuestion));
    assert_eq!(e.session().sequence_index, 2);
  }

  #[test]
  fn quit_is_idempotent_and_keeps_score() {
    let mut e = engine(4);
    e.start(&fixed(Level::C1, 10)).unwrap();
    answer(&mut e, true);
    assert!(e.quit());
    let progress = e.progress();
    let summary = e.summary().cloned().unwrap();
    assert!(summary.quit_early);
    assert_eq!(summary.answered, 1);
    assert!(summary.score > 0);

    assert!(!e.quit());
    assert_eq!(e.progress(), progress);
    assert_eq!(e.summary(), Some(&summary));
    assert_eq!(answer(&mut e, true), SubmitOutcome::Ignored(IgnoreReason::NotRunning(Phase::Finished)));
  }

  #[test]
  fn start_only_from_idle_or_finished() {
    let mut e = engine(8);
    assert_eq!(e.phase(), Phase::Idle);
    assert!(!e.quit());
    e.start(&auto(2, 2)).unwrap();
    assert_eq!(e.start(&auto(2, 2)).unwrap_err(), SessionError::AlreadyRunning);
    e.pause();
    assert_eq!(e.start(&auto(2, 2)).unwrap_err(), SessionError::AlreadyRunning);
    e.quit();

    e.start(&fixed(Level::A1, 3)).unwrap();
    let s = e.session();
    assert_eq!(s.score, 0);
    assert_eq!(s.sequence_index, 0);
    assert_eq!(s.asked.len(), 1);
    assert_eq!(s.tracker.answered_count, 0);
    assert!(e.summary().is_none());
  }

  #[test]
  fn events_announce_questions_and_finish() {
    let mut e = engine(6);
    e.start(&fixed(Level::A1, 1)).unwrap();
    answer(&mut e, true);
    let events = e.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], SessionEvent::QuestionChanged { index: 0, .. }));
    assert!(matches!(&events[1], SessionEvent::Finished { summary } if summary.correct == 1 && !summary.quit_early));
    assert!(e.drain_events().is_empty());
  }

  #[test]
  fn estimate_tracks_answers() {
    let mut e = engine(12);
    assert!(e.estimate().is_none());
    e.start(&fixed(Level::B2, 20)).unwrap();
    for _ in 0..20 {
      answer(&mut e, true);
    }
    let est = e.estimate().unwrap();
    assert_eq!(est.level, Level::B2);
    assert_eq!(est.to_string(), "B2+");
  }
}
