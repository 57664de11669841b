//! Database schema initialization

use duckdb::Connection;

use crate::error::Result;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Catalog titles; genres hold a JSON array of strings
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS movies (
            id VARCHAR PRIMARY KEY,
            title VARCHAR NOT NULL,
            description VARCHAR,
            poster_url VARCHAR,
            video_url VARCHAR,
            duration_minutes INTEGER,
            release_year INTEGER,
            genres VARCHAR NOT NULL DEFAULT '[]',
            is_featured BOOLEAN NOT NULL DEFAULT false,
            view_count BIGINT NOT NULL DEFAULT 0,
            created_at VARCHAR NOT NULL
        );
        ",
    )?;

    // One row per (viewer, movie); timestamps are RFC 3339 UTC strings so
    // lexical order matches time order. No secondary index: DuckDB refuses
    // ON CONFLICT updates of indexed columns.
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS watch_history (
            id VARCHAR NOT NULL,
            user_id VARCHAR NOT NULL,
            movie_id VARCHAR NOT NULL,
            progress_seconds BIGINT NOT NULL,
            duration_seconds BIGINT,
            last_watched_at VARCHAR NOT NULL,
            PRIMARY KEY (user_id, movie_id)
        );
        ",
    )?;

    // Favorites are a set per viewer, so a second add is a no-op
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS favorites (
            id VARCHAR NOT NULL,
            user_id VARCHAR NOT NULL,
            movie_id VARCHAR NOT NULL,
            created_at VARCHAR NOT NULL,
            PRIMARY KEY (user_id, movie_id)
        );
        ",
    )?;

    Ok(())
}
