//! Filtering and ordering of already-fetched movie lists.
//!
//! All filters are conjunctive. Sorting is stable, so movies with equal keys keep
//! the order the provider returned them in.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::genres::{GenreTable, ALL_GENRES};
use crate::models::Movie;

/// Disables year filtering when used as a criteria value.
pub const ALL_YEARS: &str = "all-years";

// 1970-01-01 counted from 0001-01-01 as day 1.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortMode {
    TitleAsc,
    TitleDesc,
    ReleaseDateAsc,
    ReleaseDateDesc,
    VoteAverageAsc,
    VoteAverageDesc,
    #[default]
    PopularityDesc,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::TitleAsc => "title.asc",
            SortMode::TitleDesc => "title.desc",
            SortMode::ReleaseDateAsc => "release_date.asc",
            SortMode::ReleaseDateDesc => "release_date.desc",
            SortMode::VoteAverageAsc => "vote_average.asc",
            SortMode::VoteAverageDesc => "vote_average.desc",
            SortMode::PopularityDesc => "popularity.desc",
        }
    }

    fn compare(&self, a: &Movie, b: &Movie) -> Ordering {
        match self {
            SortMode::TitleAsc => compare_titles(&a.title, &b.title),
            SortMode::TitleDesc => compare_titles(&b.title, &a.title),
            SortMode::ReleaseDateAsc => release_key(a).cmp(&release_key(b)),
            SortMode::ReleaseDateDesc => release_key(b).cmp(&release_key(a)),
            SortMode::VoteAverageAsc => a.vote_average.total_cmp(&b.vote_average),
            SortMode::VoteAverageDesc => b.vote_average.total_cmp(&a.vote_average),
            SortMode::PopularityDesc => b.popularity.total_cmp(&a.popularity),
        }
    }
}

/// Unknown modes fall back to popularity, matching the list pages' default.
impl From<&str> for SortMode {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "title.asc" => SortMode::TitleAsc,
            "title.desc" => SortMode::TitleDesc,
            "release_date.asc" => SortMode::ReleaseDateAsc,
            "release_date.desc" => SortMode::ReleaseDateDesc,
            "vote_average.asc" => SortMode::VoteAverageAsc,
            "vote_average.desc" => SortMode::VoteAverageDesc,
            _ => SortMode::PopularityDesc,
        }
    }
}

impl From<String> for SortMode {
    fn from(raw: String) -> Self {
        SortMode::from(raw.as_str())
    }
}

impl From<SortMode> for String {
    fn from(mode: SortMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryCriteria {
    /// Case-insensitive substring of the title; empty matches everything.
    pub query: String,
    /// Prefix of the release date, usually a 4-digit year.
    pub year: Option<String>,
    /// Key into a [`GenreTable`].
    pub genre: Option<String>,
    pub sort: SortMode,
}

impl QueryCriteria {
    fn active_year(&self) -> Option<&str> {
        self.year
            .as_deref()
            .map(str::trim)
            .filter(|y| !y.is_empty() && *y != ALL_YEARS)
    }

    fn active_genre(&self) -> Option<&str> {
        self.genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty() && *g != ALL_GENRES)
    }
}

/// Filter then sort, resolving genre keys against the built-in table.
pub fn query(movies: &[Movie], criteria: &QueryCriteria) -> Vec<Movie> {
    query_with(movies, criteria, GenreTable::builtin())
}

pub fn query_with(movies: &[Movie], criteria: &QueryCriteria, genres: &GenreTable) -> Vec<Movie> {
    let mut view = filter_movies(movies, criteria, genres);
    sort_movies(&mut view, criteria.sort);
    view
}

/// Filter stage only; input order is preserved.
pub fn filter_movies(movies: &[Movie], criteria: &QueryCriteria, genres: &GenreTable) -> Vec<Movie> {
    let needle = criteria.query.to_lowercase();
    let year = criteria.active_year();
    // An unknown key resolves to no ids at all, which matches nothing.
    let genre_ids: Option<&[i32]> = criteria
        .active_genre()
        .map(|key| genres.ids_for(key).unwrap_or(&[]));

    movies
        .iter()
        .filter(|m| needle.is_empty() || m.title.to_lowercase().contains(&needle))
        .filter(|m| match year {
            Some(y) => m.release_date.as_deref().is_some_and(|d| d.starts_with(y)),
            None => true,
        })
        .filter(|m| match genre_ids {
            Some(ids) => m.genre_ids.iter().any(|id| ids.contains(id)),
            None => true,
        })
        .cloned()
        .collect()
}

pub fn sort_movies(movies: &mut [Movie], mode: SortMode) {
    movies.sort_by(|a, b| mode.compare(a, b));
}

/// Collation-style title order: base letters first (accents and case ignored), then
/// accents, then case with lowercase first.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(&base_letters(b))
        .then_with(|| {
            let accented_a = a.nfd().flat_map(char::to_lowercase);
            accented_a.cmp(b.nfd().flat_map(char::to_lowercase))
        })
        .then_with(|| b.cmp(a))
}

fn base_letters(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn release_key(movie: &Movie) -> i32 {
    movie
        .release_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .map(|d| d.num_days_from_ce())
        .unwrap_or(EPOCH_DAYS_FROM_CE)
}
