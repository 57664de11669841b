//! Movie catalog records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MovieId;

/// A catalog title as stored in the `movies` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    /// Playable source; titles without one cannot be played
    pub video_url: Option<String>,
    /// Runtime as listed in the catalog, in minutes
    pub duration_minutes: Option<i32>,
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when adding a title to the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: Option<i32>,
    pub release_year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
}

impl Movie {
    /// The playable source URL, if the title has a non-empty one.
    #[must_use]
    pub fn playable_url(&self) -> Option<&str> {
        self.video_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie_with_url(url: Option<&str>) -> Movie {
        Movie {
            id: MovieId::from("m1"),
            title: "Test".to_string(),
            description: None,
            poster_url: None,
            video_url: url.map(String::from),
            duration_minutes: None,
            release_year: None,
            genres: Vec::new(),
            is_featured: false,
            view_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_playable_url() {
        assert_eq!(
            movie_with_url(Some("https://cdn.example.com/a.mp4")).playable_url(),
            Some("https://cdn.example.com/a.mp4")
        );
        assert_eq!(movie_with_url(Some("   ")).playable_url(), None);
        assert_eq!(movie_with_url(None).playable_url(), None);
    }
}
