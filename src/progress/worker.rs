//! Fire-and-forget progress persistence
//!
//! The playback controller must never wait on storage. It pushes requests
//! through a [`ProgressHandle`]; a single worker task applies them to the
//! [`ProgressStore`] in the order they were issued, so a save followed by a
//! clear can never land the other way round.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{ProgressOutcome, ProgressStore};

/// Save/clear contract the playback controller depends on.
///
/// Both calls return immediately; completion is not observable by the caller.
pub trait ProgressSink: Send + Sync {
    /// Report the current position and media length (0 when unknown).
    fn save(&self, progress_seconds: f64, duration_seconds: f64);

    /// Drop any saved position.
    fn clear(&self);
}

#[derive(Debug)]
enum ProgressRequest {
    Save { progress: f64, duration: f64 },
    Clear,
    Flush(oneshot::Sender<()>),
}

/// Cloneable sender side of the progress worker.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    tx: mpsc::UnboundedSender<ProgressRequest>,
}

impl ProgressHandle {
    /// Wait until every request sent before this call has been applied.
    ///
    /// Returns immediately if the worker is gone.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(ProgressRequest::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, request: ProgressRequest) {
        if let Err(e) = self.tx.send(request) {
            debug!("Progress worker stopped, dropping {:?}", e.0);
        }
    }
}

impl ProgressSink for ProgressHandle {
    fn save(&self, progress_seconds: f64, duration_seconds: f64) {
        self.send(ProgressRequest::Save {
            progress: progress_seconds,
            duration: duration_seconds,
        });
    }

    fn clear(&self) {
        self.send(ProgressRequest::Clear);
    }
}

/// Spawn the worker that owns `store`.
///
/// The task ends once every [`ProgressHandle`] clone has been dropped and the
/// queue is drained.
pub fn spawn_progress_worker(store: ProgressStore) -> (ProgressHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressRequest>();

    let task = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            match request {
                ProgressRequest::Save { progress, duration } => {
                    let outcome = store.save_progress(progress, duration).await;
                    trace!("save {:.1}/{:.1} -> {:?}", progress, duration, outcome);
                }
                ProgressRequest::Clear => {
                    let outcome = store.clear_progress().await;
                    if outcome == ProgressOutcome::Deleted {
                        debug!("Watch progress cleared");
                    }
                }
                ProgressRequest::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Progress worker finished");
    });

    (ProgressHandle { tx }, task)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::Database;
    use crate::progress::{ProgressPolicy, WatchHistoryBackend, WatchKey};
    use crate::types::{MovieId, ViewerId, WholeSeconds};

    fn key() -> WatchKey {
        WatchKey::new(ViewerId::from("viewer-1"), MovieId::from("movie-1"))
    }

    async fn worker() -> (ProgressHandle, JoinHandle<()>, Database) {
        let db = Database::in_memory().await.unwrap();
        let store = ProgressStore::new(
            Arc::new(db.clone()),
            Some(key().viewer),
            Some(key().movie),
            ProgressPolicy::default(),
        );
        let (handle, task) = spawn_progress_worker(store);
        (handle, task, db)
    }

    #[tokio::test]
    async fn test_requests_apply_in_order() {
        let (handle, _task, db) = worker().await;

        handle.save(40.0, 100.0);
        handle.clear();
        handle.save(60.0, 100.0);
        handle.flush().await;

        let record = db.find(&key()).await.unwrap().unwrap();
        assert_eq!(record.progress, WholeSeconds::new(60));

        handle.save(70.0, 100.0);
        handle.clear();
        handle.flush().await;
        assert!(db.find(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_worker_stops_when_handles_drop() {
        let (handle, task, _db) = worker().await;
        let clone = handle.clone();
        drop(handle);
        clone.save(30.0, 100.0);
        drop(clone);

        task.await.unwrap();
    }
}
