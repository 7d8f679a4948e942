//! Application state: the shared question bank, engine settings, snapshot store and live sessions.
//!
//! Each live session owns its engine behind a mutex, a broadcast channel for engine events, the
//! learner's snapshot, and a ticker that drives the question timer. Dropping the session from the
//! map drops the ticker, which cancels it. A session that stays finished for `finished_ttl_secs`
//! is evicted by its own ticker.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::bank::QuestionBank;
use crate::config::{load_config_from_env, snapshot_dir, EngineSettings};
use crate::engine::{AssessmentEngine, SessionEvent};
use crate::error::SessionError;
use crate::persistence::{save_snapshot, FileStore, MemoryStore, Snapshot, SnapshotStore};
use crate::seeds::seed_questions;
use crate::session::Phase;
use crate::timer::{Ticker, TICK};

const EVENT_BUFFER: usize = 64;

pub struct LiveSession {
    pub id: String,
    pub learner: String,
    pub engine: Mutex<AssessmentEngine>,
    pub snapshot: Mutex<Snapshot>,
    pub events: broadcast::Sender<SessionEvent>,
    ticker: std::sync::Mutex<Option<Ticker>>,
    /// Consecutive ticks spent finished. Reset whenever the run is live again (restart).
    finished_ticks: AtomicU64,
}

type SessionMap = RwLock<HashMap<String, Arc<LiveSession>>>;

impl LiveSession {
    /// Fan engine events out to subscribers. Persists the snapshot when the run finishes.
    pub async fn publish(&self, events: Vec<SessionEvent>, store: &dyn SnapshotStore) {
        for ev in events {
            if matches!(ev, SessionEvent::Finished { .. }) {
                let snapshot = self.snapshot.lock().await;
                save_snapshot(store, &self.learner, &snapshot);
            }
            // No subscribers is fine: HTTP clients poll.
            let _ = self.events.send(ev);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub bank: QuestionBank,
    pub settings: EngineSettings,
    pub store: Arc<dyn SnapshotStore>,
    pub sessions: Arc<SessionMap>,
}

impl AppState {
    /// Build state from env: load config, merge bank with seeds, pick the snapshot store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, crate::error::ConfigError> {
        let cfg = load_config_from_env().unwrap_or_default();
        let bank = QuestionBank::assemble(cfg.questions.clone(), seed_questions())?;

        let store: Arc<dyn SnapshotStore> = match snapshot_dir(&cfg) {
            Some(dir) => {
                info!(target: "cloe_prep_backend", %dir, "Snapshots stored on disk");
                Arc::new(FileStore::new(dir))
            }
            None => {
                info!(target: "cloe_prep_backend", "Snapshots kept in memory (no SNAPSHOT_DIR / persistence.dir)");
                Arc::new(MemoryStore::default())
            }
        };

        info!(target: "cloe_prep_backend", questions = bank.len(), min_pool = cfg.engine.min_pool, escalation = ?cfg.engine.escalation, "Engine ready");
        Ok(Self::with_parts(bank, cfg.engine, store))
    }

    pub fn with_parts(bank: QuestionBank, settings: EngineSettings, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            bank,
            settings,
            store,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn new_engine(&self) -> AssessmentEngine {
        match self.settings.seed {
            Some(seed) => AssessmentEngine::with_seed(self.bank.clone(), self.settings.clone(), seed),
            None => AssessmentEngine::new(self.bank.clone(), self.settings.clone()),
        }
    }

    /// Register an already-started engine and arm its clock.
    #[instrument(level = "debug", skip(self, engine, snapshot))]
    pub async fn insert_session(&self, learner: String, engine: AssessmentEngine, snapshot: Snapshot) -> Arc<LiveSession> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let live = Arc::new(LiveSession {
            id: Uuid::new_v4().to_string(),
            learner,
            engine: Mutex::new(engine),
            snapshot: Mutex::new(snapshot),
            events,
            ticker: std::sync::Mutex::new(None),
            finished_ticks: AtomicU64::new(0),
        });

        let ticker = self.spawn_ticker(Arc::downgrade(&live));
        match live.ticker.lock() {
            Ok(mut slot) => *slot = Some(ticker),
            Err(e) => error!(target: "cloe_prep_backend", error = %e, "Ticker slot poisoned; timer disabled"),
        }

        self.sessions.write().await.insert(live.id.clone(), live.clone());
        info!(target: "cloe_prep_backend", id = %live.id, learner = %live.learner, "Session registered");
        live
    }

    /// The ticker holds weak references so it never keeps a discarded session or the map alive.
    /// It stops itself once it has evicted its finished session.
    fn spawn_ticker(&self, session: Weak<LiveSession>) -> Ticker {
        let store = self.store.clone();
        let sessions = Arc::downgrade(&self.sessions);
        let ttl = self.settings.finished_ttl_secs;
        Ticker::spawn(TICK, move || {
            let session = session.clone();
            let sessions = sessions.clone();
            let store = store.clone();
            async move {
                let Some(live) = session.upgrade() else {
                    return false;
                };
                let (events, finished) = {
                    let mut engine = live.engine.lock().await;
                    engine.tick();
                    (engine.drain_events(), engine.phase() == Phase::Finished)
                };
                if !events.is_empty() {
                    live.publish(events, store.as_ref()).await;
                }
                if !finished {
                    live.finished_ticks.store(0, Ordering::Relaxed);
                    return true;
                }
                let idle = live.finished_ticks.fetch_add(1, Ordering::Relaxed) + 1;
                if idle < ttl {
                    return true;
                }
                if let Some(map) = sessions.upgrade() {
                    map.write().await.remove(&live.id);
                }
                info!(target: "cloe_prep_backend", id = %live.id, idle_secs = idle, "Finished session evicted");
                false
            }
        })
    }

    pub async fn get_session(&self, id: &str) -> Result<Arc<LiveSession>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))
    }

    /// Forget a session. Its ticker stops once the last handle is gone.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        if let Some(live) = &removed {
            if let Ok(mut slot) = live.ticker.lock() {
                if let Some(t) = slot.take() {
                    t.cancel();
                }
            }
            debug!(target: "cloe_prep_backend", %id, "Session discarded");
        }
        removed.is_some()
    }
}
