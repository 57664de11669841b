//! Watch-progress persistence
//!
//! [`ProgressStore`] decides, for each progress report coming out of a
//! playback session, whether the (viewer, movie) record is upserted,
//! deleted or left alone. Storage itself sits behind
//! [`WatchHistoryBackend`] so the policy can run against any backend.
//!
//! Every failure here is logged and swallowed: a broken database only
//! costs resume accuracy on the next visit, never the current playback.

mod worker;

pub use worker::{spawn_progress_worker, ProgressHandle, ProgressSink};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::Result;
use crate::types::{MovieId, ViewerId, WholeSeconds};

/// The composite identity under which at most one record exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchKey {
    pub viewer: ViewerId,
    pub movie: MovieId,
}

impl WatchKey {
    #[must_use]
    pub const fn new(viewer: ViewerId, movie: MovieId) -> Self {
        Self { viewer, movie }
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.viewer, self.movie)
    }
}

/// Last known playback position of one viewer in one movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchHistoryRecord {
    pub key: WatchKey,
    pub progress: WholeSeconds,
    /// `None` when the media length was not known at save time
    pub duration: Option<WholeSeconds>,
    pub last_watched_at: DateTime<Utc>,
}

/// Storage operations the progress store relies on.
#[async_trait]
pub trait WatchHistoryBackend: Send + Sync {
    /// Fetch the record for `key`; absence is `Ok(None)`.
    async fn find(&self, key: &WatchKey) -> Result<Option<WatchHistoryRecord>>;

    /// Insert or update in place, keyed on `record.key`.
    async fn upsert(&self, record: &WatchHistoryRecord) -> Result<()>;

    /// Delete the record for `key`; deleting nothing is not an error.
    async fn delete(&self, key: &WatchKey) -> Result<()>;
}

/// Thresholds applied to every progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPolicy {
    /// Reports below this position are noise from accidental starts
    pub min_progress_seconds: f64,
    /// Reports this close to the end mean the movie is finished
    pub completion_window_seconds: f64,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            min_progress_seconds: 5.0,
            completion_window_seconds: 10.0,
        }
    }
}

/// What a single progress report should do to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    /// Leave storage untouched
    Ignore,
    /// Near the end: remove the record so no resume prompt appears next time
    Finished,
    /// Write the floored position
    Upsert {
        progress: WholeSeconds,
        duration: Option<WholeSeconds>,
    },
}

impl ProgressPolicy {
    /// Classify a progress report.
    ///
    /// A duration that is not finite or not positive is treated as unknown,
    /// so the near-completion rule cannot apply to it.
    #[must_use]
    pub fn decide(&self, progress_seconds: f64, duration_seconds: f64) -> SaveDecision {
        if !progress_seconds.is_finite() || progress_seconds < self.min_progress_seconds {
            return SaveDecision::Ignore;
        }

        let duration_known = duration_seconds.is_finite() && duration_seconds > 0.0;
        if duration_known && duration_seconds - progress_seconds < self.completion_window_seconds
        {
            return SaveDecision::Finished;
        }

        match WholeSeconds::floor(progress_seconds) {
            Some(progress) => SaveDecision::Upsert {
                progress,
                duration: duration_known
                    .then(|| WholeSeconds::floor(duration_seconds))
                    .flatten(),
            },
            None => SaveDecision::Ignore,
        }
    }
}

/// Result of a store operation, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// No viewer or no movie bound
    Skipped,
    /// Below the minimum progress threshold
    Ignored,
    /// Record deleted (finished or explicitly cleared)
    Deleted,
    /// Record written
    Upserted,
    /// The backend failed; already logged
    Failed,
}

/// Saved position loaded before playback starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePoint {
    record: Option<WatchHistoryRecord>,
}

impl ResumePoint {
    /// No saved position.
    #[must_use]
    pub const fn none() -> Self {
        Self { record: None }
    }

    #[must_use]
    pub const fn from_record(record: Option<WatchHistoryRecord>) -> Self {
        Self { record }
    }

    #[must_use]
    pub fn has_progress(&self) -> bool {
        self.progress_seconds() > WholeSeconds::default()
    }

    /// Saved position, or zero when there is none.
    #[must_use]
    pub fn progress_seconds(&self) -> WholeSeconds {
        self.record
            .as_ref()
            .map(|record| record.progress)
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn record(&self) -> Option<&WatchHistoryRecord> {
        self.record.as_ref()
    }
}

/// Per-(viewer, movie) progress persistence.
#[derive(Clone)]
pub struct ProgressStore {
    backend: Arc<dyn WatchHistoryBackend>,
    key: Option<WatchKey>,
    policy: ProgressPolicy,
}

impl fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressStore")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ProgressStore {
    /// Bind a store to a viewer and a movie.
    ///
    /// Either side may be missing (signed out, no title context); every
    /// operation is then a silent no-op.
    pub fn new(
        backend: Arc<dyn WatchHistoryBackend>,
        viewer: Option<ViewerId>,
        movie: Option<MovieId>,
        policy: ProgressPolicy,
    ) -> Self {
        let key = viewer.zip(movie).map(|(viewer, movie)| WatchKey::new(viewer, movie));
        Self {
            backend,
            key,
            policy,
        }
    }

    #[must_use]
    pub const fn key(&self) -> Option<&WatchKey> {
        self.key.as_ref()
    }

    #[must_use]
    pub const fn policy(&self) -> ProgressPolicy {
        self.policy
    }

    /// Fetch the saved position for the bound key.
    pub async fn load_progress(&self) -> ResumePoint {
        let Some(key) = &self.key else {
            return ResumePoint::none();
        };

        match self.backend.find(key).await {
            Ok(record) => {
                debug!(
                    "Loaded watch progress for {}: {:?}",
                    key,
                    record.as_ref().map(|r| r.progress.get())
                );
                ResumePoint::from_record(record)
            }
            Err(e) => {
                error!("Error fetching watch history for {}: {}", key, e);
                ResumePoint::none()
            }
        }
    }

    /// Apply one progress report.
    pub async fn save_progress(
        &self,
        progress_seconds: f64,
        duration_seconds: f64,
    ) -> ProgressOutcome {
        let Some(key) = &self.key else {
            return ProgressOutcome::Skipped;
        };

        match self.policy.decide(progress_seconds, duration_seconds) {
            SaveDecision::Ignore => ProgressOutcome::Ignored,
            SaveDecision::Finished => {
                debug!("{} finished at {:.1}s, clearing progress", key, progress_seconds);
                self.delete(key).await
            }
            SaveDecision::Upsert { progress, duration } => {
                let record = WatchHistoryRecord {
                    key: key.clone(),
                    progress,
                    duration,
                    last_watched_at: Utc::now(),
                };
                match self.backend.upsert(&record).await {
                    Ok(()) => {
                        debug!("Saved watch progress for {} at {}", key, progress);
                        ProgressOutcome::Upserted
                    }
                    Err(e) => {
                        error!("Error saving watch progress for {}: {}", key, e);
                        ProgressOutcome::Failed
                    }
                }
            }
        }
    }

    /// Remove the record regardless of thresholds (restart or end of media).
    pub async fn clear_progress(&self) -> ProgressOutcome {
        let Some(key) = &self.key else {
            return ProgressOutcome::Skipped;
        };
        self.delete(key).await
    }

    async fn delete(&self, key: &WatchKey) -> ProgressOutcome {
        match self.backend.delete(key).await {
            Ok(()) => ProgressOutcome::Deleted,
            Err(e) => {
                error!("Error clearing watch progress for {}: {}", key, e);
                ProgressOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::Error;

    struct FailingBackend;

    #[async_trait]
    impl WatchHistoryBackend for FailingBackend {
        async fn find(&self, _key: &WatchKey) -> Result<Option<WatchHistoryRecord>> {
            Err(Error::other("backend offline"))
        }

        async fn upsert(&self, _record: &WatchHistoryRecord) -> Result<()> {
            Err(Error::other("backend offline"))
        }

        async fn delete(&self, _key: &WatchKey) -> Result<()> {
            Err(Error::other("backend offline"))
        }
    }

    fn key() -> WatchKey {
        WatchKey::new(ViewerId::from("viewer-1"), MovieId::from("movie-1"))
    }

    async fn store_with_db() -> (ProgressStore, Database) {
        let db = Database::in_memory().await.unwrap();
        let store = ProgressStore::new(
            Arc::new(db.clone()),
            Some(key().viewer),
            Some(key().movie),
            ProgressPolicy::default(),
        );
        (store, db)
    }

    async fn seed(db: &Database, progress: i64) {
        db.upsert(&WatchHistoryRecord {
            key: key(),
            progress: WholeSeconds::new(progress),
            duration: Some(WholeSeconds::new(100)),
            last_watched_at: Utc::now(),
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_decide_below_minimum_is_ignored() {
        let policy = ProgressPolicy::default();
        for progress in [0.0, 1.0, 4.0, 4.999] {
            assert_eq!(policy.decide(progress, 100.0), SaveDecision::Ignore);
        }
        assert_eq!(policy.decide(f64::NAN, 100.0), SaveDecision::Ignore);
    }

    #[test]
    fn test_decide_near_completion_finishes() {
        let policy = ProgressPolicy::default();
        assert_eq!(policy.decide(92.0, 100.0), SaveDecision::Finished);
        assert_eq!(policy.decide(90.5, 100.0), SaveDecision::Finished);
        assert_eq!(policy.decide(100.0, 100.0), SaveDecision::Finished);
        // Exactly ten seconds left is still a save
        assert!(matches!(
            policy.decide(90.0, 100.0),
            SaveDecision::Upsert { .. }
        ));
    }

    #[test]
    fn test_decide_upsert_floors_values() {
        let policy = ProgressPolicy::default();
        assert_eq!(
            policy.decide(85.0, 100.0),
            SaveDecision::Upsert {
                progress: WholeSeconds::new(85),
                duration: Some(WholeSeconds::new(100)),
            }
        );
        assert_eq!(
            policy.decide(61.8, 7_200.9),
            SaveDecision::Upsert {
                progress: WholeSeconds::new(61),
                duration: Some(WholeSeconds::new(7_200)),
            }
        );
    }

    #[test]
    fn test_decide_unknown_duration_still_saves() {
        let policy = ProgressPolicy::default();
        for duration in [0.0, f64::NAN, f64::INFINITY, -1.0] {
            assert_eq!(
                policy.decide(42.0, duration),
                SaveDecision::Upsert {
                    progress: WholeSeconds::new(42),
                    duration: None,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_save_below_threshold_touches_nothing() {
        let (store, db) = store_with_db().await;
        seed(&db, 50).await;

        assert_eq!(store.save_progress(3.0, 100.0).await, ProgressOutcome::Ignored);
        let record = db.find(&key()).await.unwrap().unwrap();
        assert_eq!(record.progress, WholeSeconds::new(50));
    }

    #[tokio::test]
    async fn test_save_near_end_deletes_existing_record() {
        let (store, db) = store_with_db().await;
        seed(&db, 50).await;

        assert_eq!(store.save_progress(92.0, 100.0).await, ProgressOutcome::Deleted);
        assert!(db.find(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_upserts_single_record() {
        let (store, db) = store_with_db().await;

        assert_eq!(store.save_progress(30.4, 100.0).await, ProgressOutcome::Upserted);
        assert_eq!(store.save_progress(85.0, 100.0).await, ProgressOutcome::Upserted);

        assert_eq!(db.watch_history_count().await.unwrap(), 1);
        let record = db.find(&key()).await.unwrap().unwrap();
        assert_eq!(record.progress, WholeSeconds::new(85));
        assert_eq!(record.duration, Some(WholeSeconds::new(100)));
    }

    #[tokio::test]
    async fn test_without_viewer_everything_is_skipped() {
        let db = Database::in_memory().await.unwrap();
        let store = ProgressStore::new(
            Arc::new(db.clone()),
            None,
            Some(MovieId::from("movie-1")),
            ProgressPolicy::default(),
        );

        assert!(store.key().is_none());
        assert_eq!(store.save_progress(50.0, 100.0).await, ProgressOutcome::Skipped);
        assert_eq!(store.clear_progress().await, ProgressOutcome::Skipped);
        assert!(!store.load_progress().await.has_progress());
        assert_eq!(db.watch_history_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_missing_record_is_fine() {
        let (store, db) = store_with_db().await;
        assert_eq!(store.clear_progress().await, ProgressOutcome::Deleted);

        seed(&db, 40).await;
        assert_eq!(store.clear_progress().await, ProgressOutcome::Deleted);
        assert!(db.find(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_progress() {
        let (store, db) = store_with_db().await;

        let empty = store.load_progress().await;
        assert!(!empty.has_progress());
        assert_eq!(empty.progress_seconds(), WholeSeconds::new(0));

        seed(&db, 120).await;
        let resume = store.load_progress().await;
        assert!(resume.has_progress());
        assert_eq!(resume.progress_seconds(), WholeSeconds::new(120));
    }

    #[tokio::test]
    async fn test_backend_failures_are_swallowed() {
        let store = ProgressStore::new(
            Arc::new(FailingBackend),
            Some(key().viewer),
            Some(key().movie),
            ProgressPolicy::default(),
        );

        assert_eq!(store.save_progress(50.0, 100.0).await, ProgressOutcome::Failed);
        assert_eq!(store.save_progress(95.0, 100.0).await, ProgressOutcome::Failed);
        assert_eq!(store.clear_progress().await, ProgressOutcome::Failed);
        assert_eq!(store.load_progress().await, ResumePoint::none());
    }
}
