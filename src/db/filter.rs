//! Query filter utilities for building parameterized SQL queries.

/// Catalog browse filter.
///
/// Every set field narrows the result; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieFilter {
    /// Case-insensitive title substring.
    pub search: Option<String>,
    /// Exact genre tag.
    pub genre: Option<String>,
    pub release_year: Option<i32>,
    pub featured_only: bool,
}

impl MovieFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Append filter clauses to a query string.
    ///
    /// Columns are qualified with `table`. Genres are stored as a JSON
    /// array, so a genre matches on its quoted JSON form.
    pub fn apply(&self, table: &str, query: &mut String, params: &mut Vec<String>) {
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                query.push_str(&format!(" AND contains(lower({table}.title), ?)"));
                params.push(search.to_lowercase());
            }
        }
        if let Some(ref genre) = self.genre {
            query.push_str(&format!(" AND contains({table}.genres, ?)"));
            params.push(serde_json::Value::String(genre.clone()).to_string());
        }
        if let Some(year) = self.release_year {
            query.push_str(&format!(" AND {table}.release_year = CAST(? AS INTEGER)"));
            params.push(year.to_string());
        }
        if self.featured_only {
            query.push_str(&format!(" AND {table}.is_featured"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "SELECT * FROM movies m WHERE 1=1";

    fn applied(filter: &MovieFilter) -> (String, Vec<String>) {
        let mut query = BASE.to_string();
        let mut params = Vec::new();
        filter.apply("m", &mut query, &mut params);
        (query, params)
    }

    #[test]
    fn test_movie_filter_none() {
        let filter = MovieFilter::default();
        assert!(filter.is_empty());

        let (query, params) = applied(&filter);
        assert_eq!(query, BASE);
        assert!(params.is_empty());
    }

    #[test]
    fn test_movie_filter_search_is_lowercased() {
        let filter = MovieFilter {
            search: Some("  Night TRAIN ".to_string()),
            ..MovieFilter::default()
        };
        let (query, params) = applied(&filter);

        assert_eq!(query, format!("{BASE} AND contains(lower(m.title), ?)"));
        assert_eq!(params, vec!["night train"]);
    }

    #[test]
    fn test_movie_filter_blank_search_is_ignored() {
        let filter = MovieFilter {
            search: Some("   ".to_string()),
            ..MovieFilter::default()
        };
        assert_eq!(applied(&filter), (BASE.to_string(), Vec::new()));
    }

    #[test]
    fn test_movie_filter_all() {
        let filter = MovieFilter {
            search: Some("train".to_string()),
            genre: Some("Sci-Fi".to_string()),
            release_year: Some(1999),
            featured_only: true,
        };
        let (query, params) = applied(&filter);

        assert_eq!(
            query,
            format!(
                "{BASE} AND contains(lower(m.title), ?) AND contains(m.genres, ?) \
                 AND m.release_year = CAST(? AS INTEGER) AND m.is_featured"
            )
        );
        assert_eq!(params, vec!["train", "\"Sci-Fi\"", "1999"]);
    }
}
