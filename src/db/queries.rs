//! Database query implementations for DuckDB

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, params_from_iter, Connection, Row};

use crate::catalog::{Movie, NewMovie};
use crate::error::{Error, Result};
use crate::progress::{WatchHistoryRecord, WatchKey};
use crate::types::{MovieId, ViewerId, WholeSeconds};

use super::filter::MovieFilter;
use super::ContinueWatching;

/// Render a timestamp the way it is stored.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::InvalidRecord(format!("bad timestamp '{raw}': {e}")))
}

// ============================================================================
// Movies
// ============================================================================

const MOVIE_COLUMNS: &str = "m.id, m.title, m.description, m.poster_url, m.video_url, \
     m.duration_minutes, m.release_year, m.genres, m.is_featured, m.view_count, m.created_at";

/// Raw `movies` row before timestamp and genre parsing
type MovieRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i32>,
    Option<i32>,
    String,
    bool,
    i64,
    String,
);

/// Read the columns selected by [`MOVIE_COLUMNS`]
fn read_movie_row(row: &Row<'_>) -> duckdb::Result<MovieRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn movie_from_row(row: MovieRow) -> Result<Movie> {
    let (
        id,
        title,
        description,
        poster_url,
        video_url,
        duration_minutes,
        release_year,
        genres,
        is_featured,
        view_count,
        created_at,
    ) = row;

    let genres: Vec<String> = serde_json::from_str(&genres)
        .map_err(|e| Error::InvalidRecord(format!("bad genres for movie {id}: {e}")))?;

    Ok(Movie {
        id: MovieId::from(id),
        title,
        description,
        poster_url,
        video_url,
        duration_minutes,
        release_year,
        genres,
        is_featured,
        view_count,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Insert a new catalog title with a generated id
pub fn insert_movie(conn: &Connection, movie: &NewMovie) -> Result<Movie> {
    let id = MovieId::generate();
    let created_at = Utc::now();

    conn.execute(
        r"
        INSERT INTO movies (
            id, title, description, poster_url, video_url,
            duration_minutes, release_year, genres, is_featured, view_count, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)
        ",
        params![
            id.as_str(),
            movie.title.as_str(),
            movie.description.as_deref(),
            movie.poster_url.as_deref(),
            movie.video_url.as_deref(),
            movie.duration_minutes,
            movie.release_year,
            serde_json::to_string(&movie.genres)?,
            movie.is_featured,
            format_timestamp(&created_at),
        ],
    )?;

    Ok(Movie {
        id,
        title: movie.title.clone(),
        description: movie.description.clone(),
        poster_url: movie.poster_url.clone(),
        video_url: movie.video_url.clone(),
        duration_minutes: movie.duration_minutes,
        release_year: movie.release_year,
        genres: movie.genres.clone(),
        is_featured: movie.is_featured,
        view_count: 0,
        created_at,
    })
}

/// Fetch a title by id
pub fn get_movie(conn: &Connection, id: &MovieId) -> Result<Option<Movie>> {
    let mut stmt = conn.prepare(&format!("SELECT {MOVIE_COLUMNS} FROM movies m WHERE m.id = ?"))?;
    let mut rows = stmt.query_map(params![id.as_str()], read_movie_row)?;

    match rows.next() {
        Some(row) => Ok(Some(movie_from_row(row?)?)),
        None => Ok(None),
    }
}

/// Catalog titles matching `filter`, newest first
pub fn list_movies(conn: &Connection, filter: &MovieFilter, limit: u32) -> Result<Vec<Movie>> {
    let mut query = format!("SELECT {MOVIE_COLUMNS} FROM movies m WHERE 1=1");
    let mut param_values = Vec::new();
    filter.apply("m", &mut query, &mut param_values);
    query.push_str(&format!(" ORDER BY m.created_at DESC, m.title LIMIT {limit}"));

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(param_values.iter()), read_movie_row)?;

    let mut movies = Vec::new();
    for row in rows {
        movies.push(movie_from_row(row?)?);
    }
    Ok(movies)
}

/// Bump the view counter; returns false if the title does not exist
pub fn increment_view_count(conn: &Connection, id: &MovieId) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE movies SET view_count = view_count + 1 WHERE id = ?",
        params![id.as_str()],
    )?;
    Ok(updated > 0)
}

/// Get total number of catalog titles
pub fn get_movie_count(conn: &Connection) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM movies")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// Watch history
// ============================================================================

/// Raw `watch_history` row: progress, duration, last watched
type ProgressRow = (i64, Option<i64>, String);

fn record_from_row(key: WatchKey, row: ProgressRow) -> Result<WatchHistoryRecord> {
    let (progress, duration, last_watched_at) = row;
    Ok(WatchHistoryRecord {
        key,
        progress: WholeSeconds::new(progress),
        duration: duration.map(WholeSeconds::new),
        last_watched_at: parse_timestamp(&last_watched_at)?,
    })
}

/// Fetch the single record for a (viewer, movie) key
pub fn find_watch_history(conn: &Connection, key: &WatchKey) -> Result<Option<WatchHistoryRecord>> {
    let mut stmt = conn.prepare(
        r"
        SELECT progress_seconds, duration_seconds, last_watched_at
        FROM watch_history
        WHERE user_id = ? AND movie_id = ?
        ",
    )?;
    let mut rows = stmt.query_map(
        params![key.viewer.as_str(), key.movie.as_str()],
        |row| -> duckdb::Result<ProgressRow> { Ok((row.get(0)?, row.get(1)?, row.get(2)?)) },
    )?;

    match rows.next() {
        Some(row) => Ok(Some(record_from_row(key.clone(), row?)?)),
        None => Ok(None),
    }
}

/// Insert or update the record for its key.
///
/// On conflict only the position, length and timestamp change; the row id
/// assigned on first insert is kept.
pub fn upsert_watch_history(conn: &Connection, record: &WatchHistoryRecord) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO watch_history (
            id, user_id, movie_id, progress_seconds, duration_seconds, last_watched_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT (user_id, movie_id) DO UPDATE SET
            progress_seconds = excluded.progress_seconds,
            duration_seconds = excluded.duration_seconds,
            last_watched_at = excluded.last_watched_at
        ",
        params![
            uuid::Uuid::new_v4().to_string(),
            record.key.viewer.as_str(),
            record.key.movie.as_str(),
            record.progress.get(),
            record.duration.map(WholeSeconds::get),
            format_timestamp(&record.last_watched_at),
        ],
    )?;
    Ok(())
}

/// Delete the record for a key, returning the number of rows removed
pub fn delete_watch_history(conn: &Connection, key: &WatchKey) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM watch_history WHERE user_id = ? AND movie_id = ?",
        params![key.viewer.as_str(), key.movie.as_str()],
    )?;
    Ok(deleted)
}

/// Titles a viewer has partially watched, most recent first
pub fn get_recent_watch_history(
    conn: &Connection,
    viewer: &ViewerId,
    limit: u32,
) -> Result<Vec<ContinueWatching>> {
    let mut stmt = conn.prepare(
        r"
        SELECT w.movie_id, w.progress_seconds, w.duration_seconds, w.last_watched_at,
               m.title, m.poster_url
        FROM watch_history w
        LEFT JOIN movies m ON m.id = w.movie_id
        WHERE w.user_id = ?
        ORDER BY w.last_watched_at DESC
        LIMIT ?
        ",
    )?;

    let rows = stmt.query_map(params![viewer.as_str(), i64::from(limit)], |row| {
        let progress_row: ProgressRow = (row.get(1)?, row.get(2)?, row.get(3)?);
        Ok((
            row.get::<_, String>(0)?,
            progress_row,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (movie_id, progress_row, title, poster_url) = row?;
        let key = WatchKey::new(viewer.clone(), MovieId::from(movie_id));
        entries.push(ContinueWatching {
            record: record_from_row(key, progress_row)?,
            title,
            poster_url,
        });
    }
    Ok(entries)
}

/// Get total number of watch history records
pub fn get_watch_history_count(conn: &Connection) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM watch_history")?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// Favorites
// ============================================================================

/// Whether the viewer has favorited the title
pub fn is_favorite(conn: &Connection, viewer: &ViewerId, movie: &MovieId) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM favorites WHERE user_id = ? AND movie_id = ?")?;
    let count: i64 = stmt.query_row(params![viewer.as_str(), movie.as_str()], |row| row.get(0))?;
    Ok(count > 0)
}

/// Favorite a title; returns false if it already was one
pub fn add_favorite(conn: &Connection, viewer: &ViewerId, movie: &MovieId) -> Result<bool> {
    if is_favorite(conn, viewer, movie)? {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO favorites (id, user_id, movie_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            uuid::Uuid::new_v4().to_string(),
            viewer.as_str(),
            movie.as_str(),
            format_timestamp(&Utc::now()),
        ],
    )?;
    Ok(true)
}

/// Unfavorite a title; returns false if it was not one
pub fn remove_favorite(conn: &Connection, viewer: &ViewerId, movie: &MovieId) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM favorites WHERE user_id = ? AND movie_id = ?",
        params![viewer.as_str(), movie.as_str()],
    )?;
    Ok(deleted > 0)
}

/// A viewer's favorite titles matching `filter`, most recently added first.
///
/// Favorites whose title has left the catalog are skipped.
pub fn list_favorites(
    conn: &Connection,
    viewer: &ViewerId,
    filter: &MovieFilter,
) -> Result<Vec<Movie>> {
    let mut query = format!(
        "SELECT {MOVIE_COLUMNS} FROM favorites f JOIN movies m ON m.id = f.movie_id \
         WHERE f.user_id = ?"
    );
    let mut param_values = vec![viewer.as_str().to_string()];
    filter.apply("m", &mut query, &mut param_values);
    query.push_str(" ORDER BY f.created_at DESC, m.title");

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(param_values.iter()), read_movie_row)?;

    let mut movies = Vec::new();
    for row in rows {
        movies.push(movie_from_row(row?)?);
    }
    Ok(movies)
}
