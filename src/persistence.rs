//! Learner snapshots: lifetime score, solved question ids and preferences.
//!
//! Writes are best-effort. A failing store is logged and otherwise ignored; the session keeps
//! running without saved state. Snapshots carry a schema tag and any other tag is discarded.

use std::{
  collections::{BTreeSet, HashMap},
  fs,
  path::PathBuf,
  sync::Mutex,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::session::TargetMode;
use crate::util::sanitize_key;

pub const SNAPSHOT_SCHEMA: &str = "cloe-prep.snapshot.v1";

/// Opaque key-value storage for serialized snapshots.
pub trait SnapshotStore: Send + Sync {
  fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON file per key under `dir`.
pub struct FileStore {
  dir: PathBuf,
}

impl FileStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.json", sanitize_key(key)))
  }
}

impl SnapshotStore for FileStore {
  fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(self.path_for(key)) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
    fs::create_dir_all(&self.dir)?;
    // Write-then-rename so a crash never leaves half a snapshot behind.
    let path = self.path_for(key);
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value)?;
    fs::rename(&tmp, &path)?;
    Ok(())
  }
}

#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl SnapshotStore for MemoryStore {
  fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
    Ok(self.entries.lock().unwrap_or_else(|p| p.into_inner()).get(key).cloned())
  }

  fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
    self.entries
      .lock()
      .unwrap_or_else(|p| p.into_inner())
      .insert(key.to_string(), value.to_string());
    Ok(())
  }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
  #[serde(default)] pub target_mode: Option<TargetMode>,
  #[serde(default)] pub total_planned: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
  pub schema: String,
  pub score: u32,
  pub solved_keys: BTreeSet<String>,
  #[serde(default)]
  pub preferences: Preferences,
}

impl Default for Snapshot {
  fn default() -> Self {
    Self {
      schema: SNAPSHOT_SCHEMA.into(),
      score: 0,
      solved_keys: BTreeSet::new(),
      preferences: Preferences::default(),
    }
  }
}

impl Snapshot {
  /// Add `points` the first time `key` is solved. Returns whether anything was awarded.
  pub fn award(&mut self, key: &str, points: u32) -> bool {
    if self.solved_keys.insert(key.to_string()) {
      self.score += points;
      true
    } else {
      false
    }
  }
}

/// Load and decode a snapshot. Missing, unreadable, undecodable and foreign-schema snapshots all yield None.
pub fn load_snapshot(store: &dyn SnapshotStore, key: &str) -> Option<Snapshot> {
  let raw = match store.load(key) {
    Ok(Some(raw)) => raw,
    Ok(None) => return None,
    Err(e) => {
      warn!(target: "cloe_prep_backend", %key, error = %e, "Snapshot read failed; continuing without saved state");
      return None;
    }
  };
  let snapshot = match serde_json::from_str::<Snapshot>(&raw) {
    Ok(s) => s,
    Err(e) => {
      warn!(target: "cloe_prep_backend", %key, error = %e, "Snapshot undecodable; discarding");
      return None;
    }
  };
  if snapshot.schema != SNAPSHOT_SCHEMA {
    warn!(target: "cloe_prep_backend", %key, schema = %snapshot.schema, "Snapshot schema mismatch; discarding");
    return None;
  }
  Some(snapshot)
}

/// Fire-and-forget write. Failures are logged, never returned.
pub fn save_snapshot(store: &dyn SnapshotStore, key: &str, snapshot: &Snapshot) {
  let encoded = match serde_json::to_string(snapshot) {
    Ok(s) => s,
    Err(e) => {
      warn!(target: "cloe_prep_backend", %key, error = %e, "Snapshot encode failed");
      return;
    }
  };
  match store.save(key, &encoded) {
    Ok(()) => debug!(target: "cloe_prep_backend", %key, score = snapshot.score, solved = snapshot.solved_keys.len(), "Snapshot saved"),
    Err(e) => warn!(target: "cloe_prep_backend", %key, error = %e, "Snapshot write failed; ignoring"),
  }
}
