//! Database module using DuckDB
//!
//! Holds the movie catalog, per-viewer favorites and watch history. A single
//! connection is shared behind an async mutex; every query runs while the
//! lock is held.

mod filter;
mod queries;
mod schema;

pub use filter::MovieFilter;

use async_trait::async_trait;
use duckdb::Connection;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::catalog::{Movie, NewMovie};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::progress::{WatchHistoryBackend, WatchHistoryRecord, WatchKey};
use crate::types::{MovieId, ViewerId};

/// Database wrapper using DuckDB
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Create a new database connection
    ///
    /// # Arguments
    /// * `config` - Database configuration
    /// * `data_dir` - Default data directory for local DB
    pub async fn new(config: &DatabaseConfig, data_dir: &Path) -> Result<Self> {
        let db_path = if let Some(ref path) = config.path {
            let path = Path::new(path);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            path.to_path_buf()
        } else {
            std::fs::create_dir_all(data_dir)?;
            data_dir.join("cinetrack.duckdb")
        };

        // Open DuckDB connection (synchronous, so we use spawn_blocking)
        let db_path_str = db_path.to_string_lossy().to_string();
        let conn = tokio::task::spawn_blocking(move || Connection::open(&db_path_str))
            .await
            .map_err(|e| crate::error::Error::other(e.to_string()))??;

        Self::from_connection(conn).await
    }

    /// Open a throwaway in-memory database with the schema applied
    pub async fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?).await
    }

    async fn from_connection(conn: Connection) -> Result<Self> {
        let instance = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        instance.init().await?;
        Ok(instance)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        schema::init_schema(&conn)
    }

    /// Add a title to the catalog
    pub async fn insert_movie(&self, movie: &NewMovie) -> Result<Movie> {
        let conn = self.conn.lock().await;
        queries::insert_movie(&conn, movie)
    }

    /// Look up a title; `None` when it does not exist
    pub async fn get_movie(&self, id: &MovieId) -> Result<Option<Movie>> {
        let conn = self.conn.lock().await;
        queries::get_movie(&conn, id)
    }

    /// Count one more view of a title
    pub async fn increment_view_count(&self, id: &MovieId) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::increment_view_count(&conn, id)
    }

    /// Browse the catalog, newest titles first
    pub async fn list_movies(&self, filter: &MovieFilter, limit: u32) -> Result<Vec<Movie>> {
        let conn = self.conn.lock().await;
        queries::list_movies(&conn, filter, limit)
    }

    /// Get total number of catalog titles
    pub async fn get_movie_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::get_movie_count(&conn)
    }

    /// Get the "continue watching" list of a viewer
    pub async fn get_recent_watch_history(
        &self,
        viewer: &ViewerId,
        limit: u32,
    ) -> Result<Vec<ContinueWatching>> {
        let conn = self.conn.lock().await;
        queries::get_recent_watch_history(&conn, viewer, limit)
    }

    pub async fn is_favorite(&self, viewer: &ViewerId, movie: &MovieId) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::is_favorite(&conn, viewer, movie)
    }

    /// Favorite a catalog title.
    ///
    /// Returns `None` when the title does not exist, otherwise whether it
    /// was newly added.
    pub async fn add_favorite(&self, viewer: &ViewerId, movie: &MovieId) -> Result<Option<bool>> {
        let conn = self.conn.lock().await;
        if queries::get_movie(&conn, movie)?.is_none() {
            return Ok(None);
        }
        queries::add_favorite(&conn, viewer, movie).map(Some)
    }

    /// Unfavorite a title; false if it was not a favorite
    pub async fn remove_favorite(&self, viewer: &ViewerId, movie: &MovieId) -> Result<bool> {
        let conn = self.conn.lock().await;
        queries::remove_favorite(&conn, viewer, movie)
    }

    /// Flip a title's favorite state.
    ///
    /// Returns the new state, or `None` when the title does not exist.
    pub async fn toggle_favorite(
        &self,
        viewer: &ViewerId,
        movie: &MovieId,
    ) -> Result<Option<bool>> {
        let conn = self.conn.lock().await;
        if queries::remove_favorite(&conn, viewer, movie)? {
            return Ok(Some(false));
        }
        if queries::get_movie(&conn, movie)?.is_none() {
            return Ok(None);
        }
        queries::add_favorite(&conn, viewer, movie)?;
        Ok(Some(true))
    }

    /// A viewer's favorites matching `filter`
    pub async fn list_favorites(
        &self,
        viewer: &ViewerId,
        filter: &MovieFilter,
    ) -> Result<Vec<Movie>> {
        let conn = self.conn.lock().await;
        queries::list_favorites(&conn, viewer, filter)
    }

    /// Get total number of stored watch positions
    pub async fn watch_history_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::get_watch_history_count(&conn)
    }
}

#[async_trait]
impl WatchHistoryBackend for Database {
    async fn find(&self, key: &WatchKey) -> Result<Option<WatchHistoryRecord>> {
        let conn = self.conn.lock().await;
        queries::find_watch_history(&conn, key)
    }

    async fn upsert(&self, record: &WatchHistoryRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::upsert_watch_history(&conn, record)
    }

    async fn delete(&self, key: &WatchKey) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::delete_watch_history(&conn, key)?;
        Ok(())
    }
}

/// A partially watched title in a viewer's history.
#[derive(Debug, Clone, Serialize)]
pub struct ContinueWatching {
    /// The stored position.
    pub record: WatchHistoryRecord,
    /// Catalog title, if the movie still exists.
    pub title: Option<String>,
    /// Poster image URL, if the movie has one.
    pub poster_url: Option<String>,
}

impl ContinueWatching {
    /// Fraction of the movie already watched, when its length is known.
    #[must_use]
    pub fn fraction_watched(&self) -> Option<f64> {
        let duration = self.record.duration?;
        if duration.get() <= 0 {
            return None;
        }
        Some((self.record.progress.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WholeSeconds;
    use chrono::Utc;

    #[tokio::test]
    async fn test_backend_round_trip_through_database() {
        let db = Database::in_memory().await.unwrap();
        let key = WatchKey::new(ViewerId::from("viewer"), MovieId::from("movie"));

        assert!(db.find(&key).await.unwrap().is_none());

        db.upsert(&WatchHistoryRecord {
            key: key.clone(),
            progress: WholeSeconds::new(300),
            duration: None,
            last_watched_at: Utc::now(),
        })
        .await
        .unwrap();

        let found = db.find(&key).await.unwrap().unwrap();
        assert_eq!(found.progress, WholeSeconds::new(300));
        assert_eq!(found.duration, None);

        db.delete(&key).await.unwrap();
        db.delete(&key).await.unwrap();
        assert_eq!(db.watch_history_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let db = Database::in_memory().await.unwrap();
        let viewer = ViewerId::from("viewer");
        let movie = db
            .insert_movie(&NewMovie {
                title: "Favorite Film".to_string(),
                genres: vec!["Drama".to_string()],
                ..NewMovie::default()
            })
            .await
            .unwrap();

        assert_eq!(db.toggle_favorite(&viewer, &movie.id).await.unwrap(), Some(true));
        assert!(db.is_favorite(&viewer, &movie.id).await.unwrap());
        assert_eq!(db.add_favorite(&viewer, &movie.id).await.unwrap(), Some(false));

        let listed = db
            .list_favorites(&viewer, &MovieFilter::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, movie.id);

        assert_eq!(db.toggle_favorite(&viewer, &movie.id).await.unwrap(), Some(false));
        assert!(!db.is_favorite(&viewer, &movie.id).await.unwrap());
        assert!(!db.remove_favorite(&viewer, &movie.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_favorite_unknown_movie_is_none() {
        let db = Database::in_memory().await.unwrap();
        let viewer = ViewerId::from("viewer");
        let missing = MovieId::from("missing");

        assert_eq!(db.toggle_favorite(&viewer, &missing).await.unwrap(), None);
        assert_eq!(db.add_favorite(&viewer, &missing).await.unwrap(), None);
        assert!(!db.is_favorite(&viewer, &missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_movies_through_database() {
        let db = Database::in_memory().await.unwrap();
        for (title, year) in [("Old One", 1950), ("New One", 2020)] {
            db.insert_movie(&NewMovie {
                title: title.to_string(),
                release_year: Some(year),
                ..NewMovie::default()
            })
            .await
            .unwrap();
        }

        let filter = MovieFilter {
            release_year: Some(1950),
            ..MovieFilter::default()
        };
        let movies = db.list_movies(&filter, 10).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].title, "Old One");
        assert!(movies[0].genres.is_empty());
    }

    #[test]
    fn test_fraction_watched() {
        let mut entry = ContinueWatching {
            record: WatchHistoryRecord {
                key: WatchKey::new(ViewerId::from("v"), MovieId::from("m")),
                progress: WholeSeconds::new(30),
                duration: Some(WholeSeconds::new(120)),
                last_watched_at: Utc::now(),
            },
            title: None,
            poster_url: None,
        };
        assert_eq!(entry.fraction_watched(), Some(0.25));

        entry.record.duration = None;
        assert_eq!(entry.fraction_watched(), None);
    }
}
