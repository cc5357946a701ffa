use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::CatalogError;
use crate::models::{Credits, GenreList, MovieDetail, MovieList};

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn trending_movies(&self) -> CatalogResult<MovieList>;
    async fn popular_movies(&self) -> CatalogResult<MovieList>;
    async fn top_rated_movies(&self) -> CatalogResult<MovieList>;
    async fn upcoming_movies(&self) -> CatalogResult<MovieList>;
    async fn movie_detail(&self, id: i32) -> CatalogResult<MovieDetail>;
    async fn movie_credits(&self, id: i32) -> CatalogResult<Credits>;
    async fn similar_movies(&self, id: i32) -> CatalogResult<MovieList>;
    async fn search_movies(&self, query: &str) -> CatalogResult<MovieList>;
    async fn genres(&self) -> CatalogResult<GenreList>;
    async fn discover_movies(&self, params: &DiscoverParams) -> CatalogResult<MovieList>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoverParams {
    pub genre: Option<i32>,
    pub year: Option<i32>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
}

impl DiscoverParams {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(genre) = self.genre {
            pairs.push(("with_genres", genre.to_string()));
        }
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        if let Some(sort_by) = self.sort_by.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("sort_by", sort_by.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let user_agent = format!("cinedex/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.tmdb_api_key.clone(), config.tmdb_base_url.clone())
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> CatalogResult<T> {
        debug!(endpoint, "TMDB request");
        let url = format!("{}{}", self.base_url, endpoint);
        let res = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|source| CatalogError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let status = res.status();
        if !status.is_success() {
            return Err(CatalogError::Request {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
        let text = res.text().await.map_err(|source| CatalogError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CatalogError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn trending_movies(&self) -> CatalogResult<MovieList> {
        self.get_json("/trending/movie/week", &[]).await
    }

    async fn popular_movies(&self) -> CatalogResult<MovieList> {
        self.get_json("/movie/popular", &[]).await
    }

    async fn top_rated_movies(&self) -> CatalogResult<MovieList> {
        self.get_json("/movie/top_rated", &[]).await
    }

    async fn upcoming_movies(&self) -> CatalogResult<MovieList> {
        self.get_json("/movie/upcoming", &[]).await
    }

    async fn movie_detail(&self, id: i32) -> CatalogResult<MovieDetail> {
        self.get_json(&format!("/movie/{id}"), &[]).await
    }

    async fn movie_credits(&self, id: i32) -> CatalogResult<Credits> {
        self.get_json(&format!("/movie/{id}/credits"), &[]).await
    }

    async fn similar_movies(&self, id: i32) -> CatalogResult<MovieList> {
        self.get_json(&format!("/movie/{id}/similar"), &[]).await
    }

    async fn search_movies(&self, query: &str) -> CatalogResult<MovieList> {
        let endpoint = format!("/search/movie?query={}", urlencoding::encode(query));
        self.get_json(&endpoint, &[]).await
    }

    async fn genres(&self) -> CatalogResult<GenreList> {
        self.get_json("/genre/movie/list", &[]).await
    }

    async fn discover_movies(&self, params: &DiscoverParams) -> CatalogResult<MovieList> {
        self.get_json("/discover/movie", &params.query_pairs()).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    W185,
    W500,
    Original,
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ImageSize::W185 => "w185",
            ImageSize::W500 => "w500",
            ImageSize::Original => "original",
        };
        f.write_str(token)
    }
}

/// Compose a CDN URL for a provider-relative image path.
pub fn image_url(path: Option<&str>, size: ImageSize) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{IMAGE_BASE}/{size}{p}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_url_composes_size_and_path() {
        assert_eq!(
            image_url(Some("/p.jpg"), ImageSize::W500).as_deref(),
            Some("https://image.tmdb.org/t/p/w500/p.jpg")
        );
        assert_eq!(
            image_url(Some("/b.jpg"), ImageSize::Original).as_deref(),
            Some("https://image.tmdb.org/t/p/original/b.jpg")
        );
        assert_eq!(image_url(None, ImageSize::W185), None);
        assert_eq!(image_url(Some(""), ImageSize::W185), None);
    }

    #[test]
    fn discover_params_only_emit_present_fields() {
        let params = DiscoverParams {
            genre: Some(28),
            year: None,
            sort_by: Some("vote_average.desc".to_string()),
            page: Some(2),
        };
        assert_eq!(
            params.query_pairs(),
            vec![
                ("with_genres", "28".to_string()),
                ("sort_by", "vote_average.desc".to_string()),
                ("page", "2".to_string()),
            ]
        );
        assert!(DiscoverParams::default().query_pairs().is_empty());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = TmdbClient::new("key", "http://localhost:9000/3/").expect("client");
        assert_eq!(client.base_url, "http://localhost:9000/3");
    }
}
