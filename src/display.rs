//! Display utilities for formatting CLI output.
//!
//! Shared formatting used by the `cinetrack` subcommands to print catalog
//! entries, saved positions and the continue-watching list.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::catalog::Movie;
use crate::db::ContinueWatching;
use crate::player::{PlaybackSession, PlayerPhase};
use crate::progress::ResumePoint;
use crate::types::WholeSeconds;

/// Truncate a string to a maximum length, adding "..." if truncated.
///
/// Counts characters rather than bytes. For `max_len < 3`, truncates without
/// ellipsis since there's no room for "...".
///
/// # Examples
///
/// ```
/// use cinetrack::display::truncate;
///
/// assert_eq!(truncate("hello", 10), "hello");
/// assert_eq!(truncate("hello world", 8), "hello...");
/// assert_eq!(truncate("hello", 2), "he");
/// ```
pub fn truncate(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len < 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}

/// Create a visual bar for a fraction in `[0, 1]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn make_bar(fraction: f64, width: usize) -> String {
    if !fraction.is_finite() || fraction <= 0.0 {
        return "░".repeat(width);
    }
    let filled = (fraction.min(1.0) * width as f64) as usize;
    let empty = width.saturating_sub(filled);
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

/// Clock-style position: `M:SS`, or `H:MM:SS` from an hour up.
pub fn format_time(seconds: f64) -> String {
    WholeSeconds::floor(seconds).unwrap_or_default().to_string()
}

/// How long ago `then` was, at minute precision ("3h 12m ago").
#[allow(clippy::cast_sign_loss)]
pub fn format_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 60 {
        return "just now".to_string();
    }
    let minutes = (secs as u64 / 60) * 60;
    format!("{} ago", humantime::format_duration(Duration::from_secs(minutes)))
}

/// Print a simple section header with dashes.
pub fn print_section_simple(title: &str) {
    println!("\n{title}");
    println!("{}", "-".repeat(30));
}

/// Display one catalog entry.
pub fn display_movie(movie: &Movie) {
    let year = movie
        .release_year
        .map(|y| format!(" ({y})"))
        .unwrap_or_default();
    println!("  {}{}", movie.title, year);
    println!("  ID:        {}", movie.id);
    if let Some(minutes) = movie.duration_minutes {
        println!("  Runtime:   {minutes} min");
    }
    if !movie.genres.is_empty() {
        println!("  Genres:    {}", movie.genres.join(", "));
    }
    if movie.is_featured {
        println!("  Featured");
    }
    println!(
        "  Source:    {}",
        movie.playable_url().unwrap_or("(video not available)")
    );
    if let Some(ref poster) = movie.poster_url {
        println!("  Poster:    {poster}");
    }
    println!("  Views:     {}", movie.view_count);
    if let Some(ref description) = movie.description {
        println!("\n  {}", truncate(description, 200));
    }
}

/// One catalog row: title, year and genres.
pub fn movie_line(movie: &Movie) -> String {
    let year = movie
        .release_year
        .map_or_else(|| "    ".to_string(), |y| y.to_string());
    format!(
        "{:<30} {} {:<24} {}{}",
        truncate(&movie.title, 30),
        year,
        truncate(&movie.genres.join(", "), 24),
        movie.id,
        if movie.is_featured { " *" } else { "" }
    )
}

/// Display a list of catalog titles.
pub fn display_movie_list(movies: &[Movie]) {
    for (i, movie) in movies.iter().enumerate() {
        println!("  {:2}. {}", i + 1, movie_line(movie));
    }
}

/// Display a saved position.
pub fn display_resume_point(resume: &ResumePoint) {
    let Some(record) = resume.record() else {
        println!("  No saved progress.");
        return;
    };
    match record.duration {
        Some(duration) => println!("  Position:  {} / {}", record.progress, duration),
        None => println!("  Position:  {}", record.progress),
    }
    println!(
        "  Watched:   {}",
        format_ago(record.last_watched_at, Utc::now())
    );
}

/// Display the continue-watching list, most recent first.
pub fn display_continue_watching(entries: &[ContinueWatching], now: DateTime<Utc>) {
    for (i, entry) in entries.iter().enumerate() {
        let title = entry
            .title
            .as_deref()
            .unwrap_or_else(|| entry.record.key.movie.as_str());
        let position = match entry.record.duration {
            Some(duration) => format!("{} / {}", entry.record.progress, duration),
            None => entry.record.progress.to_string(),
        };
        let bar = entry
            .fraction_watched()
            .map(|f| make_bar(f, 15))
            .unwrap_or_else(|| " ".repeat(15));

        println!(
            "  {:2}. {:<30} {} {:>17}  {}",
            i + 1,
            truncate(title, 30),
            bar,
            position,
            format_ago(entry.record.last_watched_at, now)
        );
    }
}

/// One-line player status for the `watch` command.
pub fn player_status(session: &PlaybackSession) -> String {
    let phase = match session.phase {
        PlayerPhase::Idle => "idle",
        PlayerPhase::Loading => "loading",
        PlayerPhase::ResumePrompt => "resume?",
        PlayerPhase::Paused => "paused",
        PlayerPhase::Playing => "playing",
        PlayerPhase::Ended => "ended",
    };
    format!(
        "[{:<8}] {} / {}{}",
        phase,
        format_time(session.current_time),
        format_time(session.duration),
        if session.is_muted { " (muted)" } else { "" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate("日本語テスト", 5), "日本...");
    }

    #[test]
    fn test_truncate_small_max_len() {
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("hello", 0), "");
        assert_eq!(truncate("hello", 3), "...");
    }

    #[test]
    fn test_make_bar() {
        assert_eq!(make_bar(1.0, 10), "██████████");
        assert_eq!(make_bar(0.5, 10), "█████░░░░░");
        assert_eq!(make_bar(0.0, 4), "░░░░");
        assert_eq!(make_bar(f64::NAN, 4), "░░░░");
        assert_eq!(make_bar(3.0, 4), "████");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(3725.0), "1:02:05");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    #[test]
    fn test_format_ago() {
        let now = Utc::now();
        assert_eq!(format_ago(now - TimeDelta::seconds(20), now), "just now");
        assert_eq!(format_ago(now - TimeDelta::seconds(150), now), "2m ago");
        assert_eq!(
            format_ago(now - TimeDelta::minutes(192), now),
            "3h 12m ago"
        );
    }

    #[test]
    fn test_movie_line() {
        let movie = Movie {
            id: crate::types::MovieId::from("m-1"),
            title: "Night Train".to_string(),
            description: None,
            poster_url: None,
            video_url: None,
            duration_minutes: None,
            release_year: Some(1999),
            genres: vec!["Drama".to_string(), "Mystery".to_string()],
            is_featured: true,
            view_count: 0,
            created_at: Utc::now(),
        };
        assert_eq!(
            movie_line(&movie),
            format!("{:<30} 1999 {:<24} m-1 *", "Night Train", "Drama, Mystery")
        );
    }

    #[test]
    fn test_player_status() {
        let mut session = PlaybackSession::default();
        session.phase = PlayerPhase::Playing;
        session.current_time = 61.0;
        session.duration = 5400.0;
        assert_eq!(player_status(&session), "[playing ] 1:01 / 1:30:00");
    }
}
