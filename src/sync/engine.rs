//! The synchronization core: owner of the in-memory dataset.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, OnceCell};
use tracing::{debug, info, warn};

use super::status::{AddOutcome, LoadSource, Notice, RemoveOutcome};
use crate::cache::{CacheStorage, LocalCache};
use crate::error::SyncError;
use crate::model::{seed_defaults, Dataset, MemoCard};
use crate::remote::RemoteStore;

#[derive(Debug, Default)]
struct SyncState {
  dataset: Option<Dataset>,
  loading: bool,
  load_started: bool,
  notice: Option<Notice>,
  source: Option<LoadSource>,
  /// Record ids with a remote call outstanding
  in_flight: HashSet<String>,
}

/// Marks a record id as having a remote call outstanding.
///
/// The mark is cleared on drop, so a mutation whose future is cancelled
/// mid-flight does not lock the id for the rest of the session.
struct InFlight {
  state: Arc<Mutex<SyncState>>,
  id: Option<String>,
}

impl InFlight {
  fn claim(owner: &Arc<Mutex<SyncState>>, state: &mut SyncState, id: &str) -> Self {
    state.in_flight.insert(id.to_string());
    Self {
      state: Arc::clone(owner),
      id: Some(id.to_string()),
    }
  }

  /// Clear the mark as part of a transition that already holds the lock.
  fn release(mut self, state: &mut SyncState) {
    if let Some(id) = self.id.take() {
      state.in_flight.remove(&id);
    }
  }
}

impl Drop for InFlight {
  fn drop(&mut self) {
    if let Some(id) = self.id.take() {
      self
        .state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .in_flight
        .remove(&id);
    }
  }
}

/// Undo information for an optimistic removal.
#[derive(Debug)]
struct Rollback {
  index: usize,
  /// Id of the record that followed the removed one
  successor: Option<String>,
  record: MemoCard,
}

impl Rollback {
  fn apply(self, dataset: &mut Dataset) {
    dataset.restore_record(self.index, self.successor.as_deref(), self.record);
  }
}

/// Single source of truth for the dataset shown to readers.
///
/// Every state transition happens under the state lock and is complete before
/// the lock is released; the lock is never held across a remote call. Readers
/// therefore always observe either the pre-mutation or the post-mutation
/// dataset, never a partial one.
pub struct SyncCore<S: CacheStorage, R: RemoteStore> {
  state: Arc<Mutex<SyncState>>,
  loaded: Arc<OnceCell<LoadSource>>,
  cache: LocalCache<S, Dataset>,
  remote: Arc<R>,
  changes: Arc<watch::Sender<u64>>,
}

impl<S: CacheStorage, R: RemoteStore> SyncCore<S, R> {
  /// Create an uninitialized core. Call [`SyncCore::load`] before reading.
  pub fn new(cache: LocalCache<S, Dataset>, remote: R) -> Self {
    let (changes, _) = watch::channel(0);
    Self {
      state: Arc::new(Mutex::new(SyncState {
        loading: true,
        ..SyncState::default()
      })),
      loaded: Arc::new(OnceCell::new()),
      cache,
      remote: Arc::new(remote),
      changes: Arc::new(changes),
    }
  }

  fn lock(&self) -> MutexGuard<'_, SyncState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn notify(&self) {
    self.changes.send_modify(|revision| *revision += 1);
  }

  /// Populate the dataset: remote first, then the local cache, then the seed
  /// defaults. Never fails.
  ///
  /// Runs once per core; later calls wait for the first one and return its source.
  pub async fn load(&self) -> LoadSource {
    *self.loaded.get_or_init(|| self.run_load()).await
  }

  async fn run_load(&self) -> LoadSource {
    {
      let mut state = self.lock();
      state.loading = true;
      state.load_started = true;
      state.notice = None;
    }
    self.notify();

    let (dataset, source, notice) = match self.remote.fetch_all().await {
      Ok(dataset) => {
        info!(
          records = dataset.records.len(),
          themes = dataset.themes.len(),
          body_systems = dataset.body_systems.len(),
          "loaded dataset from remote"
        );
        self.cache.write(&dataset);
        (dataset, LoadSource::Remote, None)
      }
      Err(e) => {
        warn!(error = %e, "remote unreachable, trying local cache");
        match self.cache.read() {
          Some(dataset) => {
            info!(records = dataset.records.len(), "loaded dataset from local cache");
            (dataset, LoadSource::Cache, Some(Notice::RemoteUnreachable))
          }
          None => {
            warn!("no local cache available, using seed defaults");
            (seed_defaults(), LoadSource::Defaults, Some(Notice::NoDataAvailable))
          }
        }
      }
    };

    {
      let mut state = self.lock();
      state.dataset = Some(dataset);
      state.source = Some(source);
      state.notice = notice;
      state.loading = false;
    }
    self.notify();

    source
  }

  /// Wait for a load that has started but not yet produced a dataset, so a
  /// mutation never builds on the seed defaults in its place.
  async fn settle_load(&self) {
    let pending = {
      let state = self.lock();
      state.load_started && state.dataset.is_none()
    };
    if pending {
      self.load().await;
    }
  }

  /// Add a record optimistically, then forward it to the remote store.
  ///
  /// Waits for a load already in progress before touching the dataset.
  /// Fails with [`SyncError::Validation`] without touching the dataset when the
  /// id already exists or has a remote call outstanding. A remote rejection
  /// keeps the record and raises [`Notice::SaveFailed`].
  pub async fn add(&self, record: MemoCard) -> Result<AddOutcome, SyncError> {
    let id = record.id.clone();
    self.settle_load().await;

    let guard = {
      let mut state = self.lock();
      check_mutable(&state, &id)?;

      let dataset = state.dataset.get_or_insert_with(seed_defaults);
      if dataset.contains_record(&id) {
        return Err(SyncError::Validation(format!("record {} already exists", id)));
      }

      // First write wins on category identity; the backend overwrites instead
      if dataset.upsert_theme(&record.theme) {
        debug!(theme = %record.theme.id, "new theme");
      }
      if dataset.upsert_body_system(&record.body_system) {
        debug!(body_system = %record.body_system.id, "new body system");
      }
      dataset.prepend_record(record.clone());
      self.cache.write(dataset);

      InFlight::claim(&self.state, &mut state, &id)
    };
    self.notify();

    let result = self.remote.create_record(&record).await;

    let outcome = {
      let mut state = self.lock();
      guard.release(&mut state);
      match result {
        Ok(_) => {
          debug!(id = %id, "record saved remotely");
          AddOutcome::Synced
        }
        Err(e) => {
          warn!(id = %id, error = %e, "remote save failed, keeping record locally");
          state.notice = Some(Notice::SaveFailed);
          AddOutcome::KeptLocally(e)
        }
      }
    };
    self.notify();

    Ok(outcome)
  }

  /// Remove a record optimistically, then forward the delete to the remote store.
  ///
  /// Categories are never pruned. A remote rejection puts the record back at
  /// its former position and raises [`Notice::DeleteFailed`].
  pub async fn remove(&self, id: &str) -> Result<RemoveOutcome, SyncError> {
    self.settle_load().await;

    let (guard, rollback) = {
      let mut state = self.lock();
      check_mutable(&state, id)?;

      let rollback = match state.dataset.as_mut() {
        Some(dataset) => {
          let rollback = dataset.take_record(id).map(|(index, record)| Rollback {
            index,
            successor: dataset.records.get(index).map(|r| r.id.clone()),
            record,
          });
          self.cache.write(dataset);
          rollback
        }
        None => None,
      };

      (InFlight::claim(&self.state, &mut state, id), rollback)
    };
    self.notify();

    let result = self.remote.delete_record(id).await;

    let outcome = {
      let mut state = self.lock();
      guard.release(&mut state);
      match result {
        Ok(()) => {
          debug!(id, "record deleted remotely");
          RemoveOutcome::Synced
        }
        Err(e) => {
          warn!(id, error = %e, "remote delete failed, reverting");
          if let Some(dataset) = state.dataset.as_mut() {
            if let Some(rollback) = rollback {
              rollback.apply(dataset);
            }
            self.cache.write(dataset);
          }
          state.notice = Some(Notice::DeleteFailed);
          RemoveOutcome::Reverted(e)
        }
      }
    };
    self.notify();

    Ok(outcome)
  }

  /// Look up a record by id.
  pub fn find_by_id(&self, id: &str) -> Option<MemoCard> {
    self
      .lock()
      .dataset
      .as_ref()
      .and_then(|dataset| dataset.find_record(id))
      .cloned()
  }

  /// A copy of the current dataset, or `None` before the first load.
  pub fn snapshot(&self) -> Option<Dataset> {
    self.lock().dataset.clone()
  }

  /// True until the first load has produced a dataset.
  pub fn is_loading(&self) -> bool {
    self.lock().loading
  }

  pub fn notice(&self) -> Option<Notice> {
    self.lock().notice
  }

  pub fn dismiss_notice(&self) {
    self.lock().notice = None;
    self.notify();
  }

  pub fn load_source(&self) -> Option<LoadSource> {
    self.lock().source
  }

  /// Whether a remote call for this record id is outstanding.
  pub fn is_in_flight(&self, id: &str) -> bool {
    self.lock().in_flight.contains(id)
  }

  /// Receive a new revision number after every state change.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.changes.subscribe()
  }

  pub fn cache(&self) -> &LocalCache<S, Dataset> {
    &self.cache
  }
}

fn check_mutable(state: &SyncState, id: &str) -> Result<(), SyncError> {
  if state.in_flight.contains(id) {
    return Err(SyncError::Validation(format!(
      "a change to record {} is already in flight",
      id
    )));
  }
  if state.load_started && state.dataset.is_none() {
    return Err(SyncError::Validation("the dataset is still loading".to_string()));
  }
  Ok(())
}

impl<S: CacheStorage, R: RemoteStore> Clone for SyncCore<S, R> {
  fn clone(&self) -> Self {
    Self {
      state: Arc::clone(&self.state),
      loaded: Arc::clone(&self.loaded),
      cache: self.cache.clone(),
      remote: Arc::clone(&self.remote),
      changes: Arc::clone(&self.changes),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{SlotKey, SqliteStorage};
  use crate::model::Category;
  use async_trait::async_trait;
  use chrono::{TimeZone, Utc};
  use std::sync::atomic::{AtomicBool, Ordering};
  use tokio::sync::Notify;

  /// In-process remote with switchable failures and optional gates that hold
  /// fetch or write calls until released.
  #[derive(Default)]
  struct FakeRemote {
    dataset: Option<Dataset>,
    fail_writes: AtomicBool,
    gate: Option<Arc<Notify>>,
    fetch_gate: Option<Arc<Notify>>,
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
  }

  impl FakeRemote {
    fn up(dataset: Dataset) -> Self {
      Self {
        dataset: Some(dataset),
        ..Self::default()
      }
    }

    fn down() -> Self {
      Self::default()
    }

    fn failing_writes(self) -> Self {
      self.fail_writes.store(true, Ordering::SeqCst);
      self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
      self.gate = Some(gate);
      self
    }

    fn gated_fetch(mut self, gate: Arc<Notify>) -> Self {
      self.fetch_gate = Some(gate);
      self
    }

    async fn wait_gate(&self) {
      if let Some(gate) = &self.gate {
        gate.notified().await;
      }
    }

    fn write_result(&self) -> Result<(), SyncError> {
      if self.fail_writes.load(Ordering::SeqCst) {
        Err(SyncError::Network("connection reset".into()))
      } else {
        Ok(())
      }
    }
  }

  #[async_trait]
  impl RemoteStore for FakeRemote {
    async fn fetch_all(&self) -> Result<Dataset, SyncError> {
      if let Some(gate) = &self.fetch_gate {
        gate.notified().await;
      }
      self
        .dataset
        .clone()
        .ok_or_else(|| SyncError::Network("connection refused".into()))
    }

    async fn create_record(&self, record: &MemoCard) -> Result<MemoCard, SyncError> {
      self.wait_gate().await;
      self.created.lock().unwrap().push(record.id.clone());
      self.write_result().map(|_| record.clone())
    }

    async fn delete_record(&self, id: &str) -> Result<(), SyncError> {
      self.wait_gate().await;
      self.deleted.lock().unwrap().push(id.to_string());
      self.write_result()
    }
  }

  type TestCore = SyncCore<SqliteStorage, FakeRemote>;

  fn empty_cache() -> LocalCache<SqliteStorage, Dataset> {
    LocalCache::new(SqliteStorage::open_in_memory().unwrap(), SlotKey::new("test"))
  }

  fn card(id: &str, theme: Category, body_system: Category) -> MemoCard {
    let mut record = MemoCard::new(id, format!("Card {}", id), theme, body_system);
    record.created_at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    record
  }

  fn remote_dataset() -> Dataset {
    Dataset {
      themes: vec![Category::new("t1", "Skin")],
      body_systems: vec![Category::new("s1", "Heart")],
      records: vec![card(
        "remote-1",
        Category::new("t1", "Skin"),
        Category::new("s1", "Heart"),
      )],
    }
  }

  fn cached_dataset() -> Dataset {
    Dataset {
      themes: vec![Category::new("t9", "Cached theme")],
      body_systems: vec![Category::new("s9", "Cached system")],
      records: vec![card(
        "cached-1",
        Category::new("t9", "Cached theme"),
        Category::new("s9", "Cached system"),
      )],
    }
  }

  fn populated() -> Dataset {
    let t = Category::new("t1", "Skin");
    let s = Category::new("s1", "Heart");
    Dataset {
      themes: vec![t.clone()],
      body_systems: vec![s.clone()],
      records: vec![
        card("a", t.clone(), s.clone()),
        card("b", t.clone(), s.clone()),
        card("c", t, s),
      ],
    }
  }

  enum CacheState {
    Present,
    Absent,
    Corrupt,
  }

  fn cache_in(state: CacheState) -> LocalCache<SqliteStorage, Dataset> {
    let cache = empty_cache();
    match state {
      CacheState::Present => cache.write(&cached_dataset()),
      CacheState::Absent => {}
      CacheState::Corrupt => {
        let key = cache.slot().cache_hash();
        cache
          .storage()
          .store_slot(&key, "test", "dataset", b"{\"themes\": [")
          .unwrap();
      }
    }
    cache
  }

  async fn loaded_core(remote: FakeRemote) -> TestCore {
    let core = SyncCore::new(empty_cache(), remote);
    assert_eq!(core.load().await, LoadSource::Remote);
    core
  }

  // ==========================================================================
  // Startup fallback chain
  // ==========================================================================

  #[tokio::test]
  async fn test_remote_up_wins_over_any_cache() {
    for state in [CacheState::Present, CacheState::Absent, CacheState::Corrupt] {
      let core = SyncCore::new(cache_in(state), FakeRemote::up(remote_dataset()));
      assert!(core.snapshot().is_none());
      assert!(core.is_loading());

      assert_eq!(core.load().await, LoadSource::Remote);
      assert_eq!(core.snapshot(), Some(remote_dataset()));
      assert_eq!(core.notice(), None);
      assert!(!core.is_loading());
      // Remote result is mirrored
      assert_eq!(core.cache().read(), Some(remote_dataset()));
    }
  }

  #[tokio::test]
  async fn test_remote_down_uses_cache() {
    let core = SyncCore::new(cache_in(CacheState::Present), FakeRemote::down());

    assert_eq!(core.load().await, LoadSource::Cache);
    assert_eq!(core.snapshot(), Some(cached_dataset()));
    assert_eq!(core.notice(), Some(Notice::RemoteUnreachable));
    assert!(!core.is_loading());
  }

  #[tokio::test]
  async fn test_remote_down_no_cache_uses_defaults() {
    let core = SyncCore::new(cache_in(CacheState::Absent), FakeRemote::down());

    assert_eq!(core.load().await, LoadSource::Defaults);
    assert_eq!(core.snapshot(), Some(seed_defaults()));
    assert_eq!(core.notice(), Some(Notice::NoDataAvailable));
    assert!(!core.is_loading());
  }

  #[tokio::test]
  async fn test_remote_down_corrupt_cache_uses_defaults() {
    let core = SyncCore::new(cache_in(CacheState::Corrupt), FakeRemote::down());

    assert_eq!(core.load().await, LoadSource::Defaults);
    assert_eq!(core.snapshot(), Some(seed_defaults()));
    assert_eq!(core.notice(), Some(Notice::NoDataAvailable));
    assert_eq!(core.load_source(), Some(LoadSource::Defaults));
  }

  #[tokio::test]
  async fn test_defaults_are_not_mirrored() {
    let core = SyncCore::new(cache_in(CacheState::Absent), FakeRemote::down());
    core.load().await;
    assert!(core.cache().read().is_none());
  }

  #[tokio::test]
  async fn test_load_runs_once() {
    let core = SyncCore::new(empty_cache(), FakeRemote::up(remote_dataset()));
    core.load().await;
    core
      .add(card("new", Category::new("t1", "Skin"), Category::new("s1", "Heart")))
      .await
      .unwrap();

    // A second load must not replace the mutated dataset
    assert_eq!(core.load().await, LoadSource::Remote);
    assert!(core.find_by_id("new").is_some());
  }

  // ==========================================================================
  // Add
  // ==========================================================================

  #[tokio::test]
  async fn test_add_upserts_categories_exactly_once() {
    let core = loaded_core(FakeRemote::up(remote_dataset())).await;

    // Theme already known, body system new
    let record = card("r1", Category::new("t1", "Skin"), Category::new("s2", "Lungs"));
    assert_eq!(core.add(record).await.unwrap(), AddOutcome::Synced);

    // Both new
    let record = card("r2", Category::new("t2", "Sleep"), Category::new("s3", "Brain"));
    core.add(record).await.unwrap();

    let dataset = core.snapshot().unwrap();
    for id in ["t1", "t2"] {
      assert_eq!(dataset.themes.iter().filter(|c| c.id == id).count(), 1);
    }
    for id in ["s1", "s2", "s3"] {
      assert_eq!(dataset.body_systems.iter().filter(|c| c.id == id).count(), 1);
    }
    for record in &dataset.records {
      assert!(dataset.themes.iter().any(|c| c.id == record.theme.id));
      assert!(dataset.body_systems.iter().any(|c| c.id == record.body_system.id));
    }
  }

  #[tokio::test]
  async fn test_add_prepends_newest_first() {
    let core = loaded_core(FakeRemote::up(remote_dataset())).await;
    core
      .add(card("r1", Category::new("t1", "Skin"), Category::new("s1", "Heart")))
      .await
      .unwrap();

    let ids: Vec<String> = core
      .snapshot()
      .unwrap()
      .records
      .into_iter()
      .map(|r| r.id)
      .collect();
    assert_eq!(ids, vec!["r1", "remote-1"]);
  }

  #[tokio::test]
  async fn test_duplicate_add_is_rejected_without_change() {
    let core = loaded_core(FakeRemote::up(remote_dataset())).await;
    let before = core.snapshot();

    let err = core
      .add(card("remote-1", Category::new("t5", "Other"), Category::new("s5", "Other")))
      .await
      .unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(core.snapshot(), before);
    assert_eq!(core.cache().read(), before);
    assert!(core.remote.created.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_add_never_produces_duplicate_ids() {
    let core = loaded_core(FakeRemote::up(Dataset::default())).await;
    let ids = ["a", "b", "a", "c", "b", "a"];
    for id in ids {
      let _ = core
        .add(card(id, Category::new("t", "T"), Category::new("s", "S")))
        .await;
    }

    let records = core.snapshot().unwrap().records;
    let unique: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(records.len(), 3);
    assert_eq!(unique.len(), 3);
  }

  #[tokio::test]
  async fn test_add_failure_keeps_record_with_notice() {
    let core = loaded_core(FakeRemote::up(populated()).failing_writes()).await;
    let record = card("r1", Category::new("t2", "Sleep"), Category::new("s1", "Heart"));

    let outcome = core.add(record.clone()).await.unwrap();

    assert!(matches!(outcome, AddOutcome::KeptLocally(SyncError::Network(_))));
    assert_eq!(core.find_by_id("r1"), Some(record));
    assert_eq!(core.notice(), Some(Notice::SaveFailed));
    assert!(core.cache().read().unwrap().contains_record("r1"));
    assert!(!core.is_in_flight("r1"));
  }

  #[tokio::test]
  async fn test_category_identity_is_first_write_wins() {
    // The backend would overwrite the theme name; the local mirror keeps the
    // name it saw first, so the two may diverge until the next full load.
    let core = loaded_core(FakeRemote::up(remote_dataset())).await;
    let renamed = Category::new("t1", "Dermatology");
    core
      .add(card("r1", renamed.clone(), Category::new("s1", "Heart")))
      .await
      .unwrap();

    let dataset = core.snapshot().unwrap();
    assert_eq!(dataset.themes, vec![Category::new("t1", "Skin")]);
    // The record itself keeps its embedded copy as authored
    assert_eq!(dataset.find_record("r1").unwrap().theme, renamed);
  }

  #[tokio::test]
  async fn test_add_before_load_starts_from_defaults() {
    let core = SyncCore::new(empty_cache(), FakeRemote::down());
    let record = card("r1", Category::new("t1", "Skin"), Category::new("s1", "Heart"));

    core.add(record).await.unwrap();

    let dataset = core.snapshot().unwrap();
    assert_eq!(dataset.records.len(), 1);
    assert_eq!(dataset.themes.len(), seed_defaults().themes.len() + 1);
  }

  #[tokio::test]
  async fn test_add_during_load_waits_for_loaded_dataset() {
    let fetch_gate = Arc::new(Notify::new());
    let remote = FakeRemote::down().gated_fetch(Arc::clone(&fetch_gate));
    let core = SyncCore::new(cache_in(CacheState::Present), remote);
    let mut changes = core.subscribe();

    let loading = {
      let core = core.clone();
      tokio::spawn(async move { core.load().await })
    };
    // First change is the load starting
    changes.changed().await.unwrap();
    assert!(core.snapshot().is_none());

    let addition = {
      let core = core.clone();
      tokio::spawn(async move {
        core
          .add(card("r1", Category::new("t1", "Skin"), Category::new("s1", "Heart")))
          .await
      })
    };
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
    // Nothing may be built on the seed defaults while the fetch is pending
    assert!(core.snapshot().is_none());
    assert_eq!(core.cache().read(), Some(cached_dataset()));

    fetch_gate.notify_one();
    assert_eq!(loading.await.unwrap(), LoadSource::Cache);
    assert_eq!(addition.await.unwrap().unwrap(), AddOutcome::Synced);

    let dataset = core.snapshot().unwrap();
    assert!(dataset.contains_record("cached-1"));
    assert!(dataset.contains_record("r1"));
    let seed_theme = &seed_defaults().themes[0].id;
    assert!(!dataset.themes.iter().any(|c| &c.id == seed_theme));
    assert_eq!(core.cache().read(), Some(dataset));
  }

  #[tokio::test]
  async fn test_cancelled_add_releases_record_id() {
    let gate = Arc::new(Notify::new());
    let core = loaded_core(FakeRemote::up(populated()).gated(Arc::clone(&gate))).await;

    let task = {
      let core = core.clone();
      tokio::spawn(async move {
        core
          .add(card("r1", Category::new("t1", "Skin"), Category::new("s1", "Heart")))
          .await
      })
    };
    while !core.is_in_flight("r1") {
      tokio::task::yield_now().await;
    }

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(!core.is_in_flight("r1"));

    // The optimistic record stays and the id can be mutated again
    gate.notify_one();
    assert_eq!(core.remove("r1").await.unwrap(), RemoveOutcome::Synced);
    assert!(core.find_by_id("r1").is_none());
  }

  // ==========================================================================
  // Remove
  // ==========================================================================

  #[tokio::test]
  async fn test_remove_success() {
    let core = loaded_core(FakeRemote::up(populated())).await;

    assert_eq!(core.remove("b").await.unwrap(), RemoveOutcome::Synced);

    let dataset = core.snapshot().unwrap();
    assert!(!dataset.contains_record("b"));
    // Categories are never pruned
    assert_eq!(dataset.themes, populated().themes);
    assert_eq!(core.cache().read(), Some(dataset));
    assert_eq!(core.notice(), None);
    assert_eq!(*core.remote.deleted.lock().unwrap(), vec!["b".to_string()]);
  }

  #[tokio::test]
  async fn test_remove_failure_rolls_back() {
    let core = loaded_core(FakeRemote::up(populated()).failing_writes()).await;
    let before = core.snapshot().unwrap();

    let outcome = core.remove("b").await.unwrap();

    assert!(matches!(outcome, RemoveOutcome::Reverted(_)));
    assert_eq!(core.snapshot(), Some(before.clone()));
    assert_eq!(core.cache().read(), Some(before));
    assert_eq!(core.notice(), Some(Notice::DeleteFailed));
  }

  #[tokio::test]
  async fn test_remove_unknown_id_failure_sets_notice() {
    let core = loaded_core(FakeRemote::up(populated()).failing_writes()).await;

    let outcome = core.remove("missing").await.unwrap();

    assert!(matches!(outcome, RemoveOutcome::Reverted(_)));
    assert_eq!(core.snapshot(), Some(populated()));
    assert_eq!(core.notice(), Some(Notice::DeleteFailed));
  }

  #[tokio::test]
  async fn test_optimistic_state_visible_while_remote_pending() {
    let gate = Arc::new(Notify::new());
    let remote = FakeRemote::up(populated())
      .failing_writes()
      .gated(Arc::clone(&gate));
    let core = loaded_core(remote).await;
    let before = core.snapshot().unwrap();

    let task = {
      let core = core.clone();
      tokio::spawn(async move { core.remove("a").await })
    };

    while !core.is_in_flight("a") {
      tokio::task::yield_now().await;
    }
    // Removed in memory and in the mirror before the remote answers
    assert!(core.find_by_id("a").is_none());
    assert!(!core.cache().read().unwrap().contains_record("a"));
    assert_eq!(core.notice(), None);

    gate.notify_one();
    task.await.unwrap().unwrap();

    assert_eq!(core.snapshot(), Some(before));
    assert_eq!(core.notice(), Some(Notice::DeleteFailed));
  }

  #[tokio::test]
  async fn test_same_id_mutation_rejected_while_in_flight() {
    let gate = Arc::new(Notify::new());
    let core = loaded_core(FakeRemote::up(populated()).gated(Arc::clone(&gate))).await;

    let task = {
      let core = core.clone();
      tokio::spawn(async move { core.remove("a").await })
    };
    while !core.is_in_flight("a") {
      tokio::task::yield_now().await;
    }

    let err = core.remove("a").await.unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    let err = core
      .add(card("a", Category::new("t1", "Skin"), Category::new("s1", "Heart")))
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    gate.notify_one();
    assert_eq!(task.await.unwrap().unwrap(), RemoveOutcome::Synced);
    assert!(!core.is_in_flight("a"));
  }

  #[tokio::test]
  async fn test_rollback_does_not_clobber_concurrent_add() {
    let gate = Arc::new(Notify::new());
    let remote = FakeRemote::up(populated())
      .failing_writes()
      .gated(Arc::clone(&gate));
    let core = loaded_core(remote).await;

    let removal = {
      let core = core.clone();
      tokio::spawn(async move { core.remove("b").await })
    };
    while !core.is_in_flight("b") {
      tokio::task::yield_now().await;
    }

    let addition = {
      let core = core.clone();
      tokio::spawn(async move {
        core
          .add(card("z", Category::new("t1", "Skin"), Category::new("s1", "Heart")))
          .await
      })
    };
    while !core.is_in_flight("z") {
      tokio::task::yield_now().await;
    }

    gate.notify_one();
    gate.notify_one();
    removal.await.unwrap().unwrap();
    addition.await.unwrap().unwrap();

    let ids: Vec<String> = core
      .snapshot()
      .unwrap()
      .records
      .into_iter()
      .map(|r| r.id)
      .collect();
    assert_eq!(ids, vec!["z", "a", "b", "c"]);
  }

  // ==========================================================================
  // Readers
  // ==========================================================================

  #[tokio::test]
  async fn test_lookup_before_load_is_none() {
    let core = SyncCore::new(empty_cache(), FakeRemote::up(populated()));
    assert!(core.find_by_id("a").is_none());
    core.load().await;
    assert!(core.find_by_id("a").is_some());
    assert!(core.find_by_id("zzz").is_none());
  }

  #[tokio::test]
  async fn test_subscribers_see_changes() {
    let core = SyncCore::new(empty_cache(), FakeRemote::down());
    let mut changes = core.subscribe();

    core.load().await;
    assert!(changes.has_changed().unwrap());
    changes.borrow_and_update();

    core.dismiss_notice();
    assert!(changes.has_changed().unwrap());
    assert_eq!(core.notice(), None);
  }

  #[tokio::test]
  async fn test_scenario_add_then_failed_remove() {
    let seed = Dataset {
      themes: vec![Category::new("t1", "Skin")],
      body_systems: vec![Category::new("s1", "Heart")],
      records: Vec::new(),
    };
    let core = loaded_core(FakeRemote::up(seed)).await;
    let r1 = MemoCard::new(
      "r1",
      "X",
      Category::new("t1", "Skin"),
      Category::new("s2", "Lungs"),
    );

    assert_eq!(core.add(r1.clone()).await.unwrap(), AddOutcome::Synced);
    let dataset = core.snapshot().unwrap();
    assert_eq!(dataset.records, vec![r1.clone()]);
    assert_eq!(
      dataset.body_systems,
      vec![Category::new("s1", "Heart"), Category::new("s2", "Lungs")]
    );
    assert_eq!(core.notice(), None);

    core.remote.fail_writes.store(true, Ordering::SeqCst);
    let outcome = core.remove("r1").await.unwrap();

    assert!(matches!(outcome, RemoveOutcome::Reverted(_)));
    assert_eq!(core.snapshot().unwrap().records, vec![r1]);
    assert_eq!(core.notice(), Some(Notice::DeleteFailed));
    assert_eq!(
      core.notice().unwrap().message(),
      "delete failed remotely; change reverted"
    );
  }
}
