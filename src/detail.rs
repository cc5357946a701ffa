use chrono::{Datelike, NaiveDate};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::debug;

use crate::error::{CatalogError, DetailError, DetailPart};
use crate::favorites::FavoritesSet;
use crate::models::{CastMember, Credits, CrewMember, Movie, MovieDetail};
use crate::tmdb::CatalogApi;

pub const TOP_CAST: usize = 6;

/// Everything a movie page needs, joined from three provider calls.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MovieView {
    pub detail: MovieDetail,
    pub credits: Credits,
    pub similar: Vec<Movie>,
    pub director: Option<CrewMember>,
    pub top_cast: Vec<CastMember>,
}

/// Fetch detail, credits and similar movies concurrently. Any single failure fails the
/// whole view; results that already arrived are dropped.
pub async fn load_movie(api: &dyn CatalogApi, id: i32) -> Result<MovieView, DetailError> {
    let fail = |part: DetailPart| {
        move |source: CatalogError| DetailError {
            movie_id: id,
            part,
            source,
        }
    };

    let (detail, credits, similar) = tokio::try_join!(
        async { api.movie_detail(id).await.map_err(fail(DetailPart::Detail)) },
        async { api.movie_credits(id).await.map_err(fail(DetailPart::Credits)) },
        async { api.similar_movies(id).await.map_err(fail(DetailPart::Similar)) },
    )?;
    debug!(
        movie_id = id,
        cast = credits.cast.len(),
        similar = similar.results.len(),
        "Joined movie view"
    );

    let director = find_director(&credits).cloned();
    let top_cast = credits.cast.iter().take(TOP_CAST).cloned().collect();

    Ok(MovieView {
        detail,
        credits,
        similar: similar.results,
        director,
        top_cast,
    })
}

/// Details for every favorite, in the set's order. One failed lookup fails the listing.
pub async fn load_favorite_movies(
    api: &dyn CatalogApi,
    favorites: &FavoritesSet,
) -> Result<Vec<MovieDetail>, DetailError> {
    try_join_all(favorites.ids().iter().map(|&id| async move {
        api.movie_detail(id).await.map_err(|source| DetailError {
            movie_id: id,
            part: DetailPart::Detail,
            source,
        })
    }))
    .await
}

/// First crew entry credited as director, in provider order.
pub fn find_director(credits: &Credits) -> Option<&CrewMember> {
    credits.crew.iter().find(|c| c.job == "Director")
}

pub fn release_year(date: Option<&str>) -> Option<i32> {
    let date = date?.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .map(|d| d.year())
        .or_else(|| date.get(..4).and_then(|y| y.parse().ok()))
}

pub fn rounded_rating(vote_average: f64) -> f64 {
    (vote_average * 10.0).round() / 10.0
}

pub fn format_runtime(minutes: Option<i32>) -> Option<String> {
    match minutes {
        Some(m) if m > 0 => Some(format!("{}h {}m", m / 60, m % 60)),
        _ => None,
    }
}
