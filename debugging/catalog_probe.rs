//! Query the catalog provider directly and print what the site would show.
//! Usage:
//!   cargo run --bin catalog_probe -- movie <tmdb_id>
//!   cargo run --bin catalog_probe -- list <popular|trending|top-rated|upcoming> [sort] [genre] [year]
//!   cargo run --bin catalog_probe -- search <text>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use cinedex::config::Config;
use cinedex::detail::{format_runtime, load_movie, release_year, rounded_rating};
use cinedex::genres::GenreTable;
use cinedex::models::{Movie, MovieList};
use cinedex::query::{query_with, QueryCriteria, SortMode};
use cinedex::tmdb::{image_url, CatalogApi, ImageSize, TmdbClient};
use dotenvy::dotenv;
use serde_json::json;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ProbeKind {
    Movie,
    List,
    Search,
}

impl FromStr for ProbeKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(ProbeKind::Movie),
            "list" => Ok(ProbeKind::List),
            "search" => Ok(ProbeKind::Search),
            _ => Err(anyhow::anyhow!("probe kind must be 'movie', 'list' or 'search'")),
        }
    }
}

fn usage() -> ! {
    eprintln!("Usage: cargo run --bin catalog_probe -- movie <tmdb_id>");
    eprintln!("       cargo run --bin catalog_probe -- list <popular|trending|top-rated|upcoming> [sort] [genre] [year]");
    eprintln!("       cargo run --bin catalog_probe -- search <text>");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let kind = ProbeKind::from_str(&args[1])?;
    let config = Config::from_env()?;
    let client = TmdbClient::from_config(&config)?;

    match kind {
        ProbeKind::Movie => {
            let id: i32 = args[2].parse().context("tmdb_id must be an integer")?;
            probe_movie(&client, id).await?
        }
        ProbeKind::List => probe_list(&client, &args[2], &args[3..]).await?,
        ProbeKind::Search => {
            let text = args[2..].join(" ");
            let list = client.search_movies(&text).await?;
            print_list(&list.results)?;
        }
    }

    Ok(())
}

async fn probe_movie(client: &TmdbClient, id: i32) -> Result<()> {
    let view = load_movie(client, id).await?;
    let movie = &view.detail.movie;
    let output = json!({
        "id": movie.id,
        "title": movie.title,
        "tagline": view.detail.tagline,
        "year": release_year(movie.release_date.as_deref()),
        "rating": rounded_rating(movie.vote_average),
        "runtime": format_runtime(view.detail.runtime),
        "genres": view.detail.genres.iter().map(|g| g.name.clone()).collect::<Vec<_>>(),
        "director": view.director.as_ref().map(|d| d.name.clone()),
        "cast": view.top_cast.iter().map(|c| format!("{} as {}", c.name, c.character)).collect::<Vec<_>>(),
        "similar": view.similar.iter().map(|m| m.title.clone()).collect::<Vec<_>>(),
        "poster": image_url(movie.poster_path.as_deref(), ImageSize::W500),
        "backdrop": image_url(movie.backdrop_path.as_deref(), ImageSize::Original),
        "imdb_page": view.detail.imdb_id.as_ref().map(|id| format!("https://www.imdb.com/title/{id}")),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn probe_list(client: &TmdbClient, which: &str, rest: &[String]) -> Result<()> {
    let list: MovieList = match which {
        "popular" => client.popular_movies().await?,
        "trending" => client.trending_movies().await?,
        "top-rated" => client.top_rated_movies().await?,
        "upcoming" => client.upcoming_movies().await?,
        _ => usage(),
    };
    let genres = match client.genres().await {
        Ok(list) => GenreTable::from_provider(&list),
        Err(e) => {
            eprintln!("Genre list unavailable ({e}), using built-in table");
            GenreTable::builtin().clone()
        }
    };
    let criteria = QueryCriteria {
        query: String::new(),
        sort: rest.first().map(|s| SortMode::from(s.as_str())).unwrap_or_default(),
        genre: rest.get(1).cloned(),
        year: rest.get(2).cloned(),
    };
    print_list(&query_with(&list.results, &criteria, &genres))
}

fn print_list(movies: &[Movie]) -> Result<()> {
    let rows: Vec<_> = movies
        .iter()
        .map(|m| {
            json!({
                "id": m.id,
                "title": m.title,
                "release_date": m.release_date,
                "rating": rounded_rating(m.vote_average),
                "popularity": m.popularity,
                "genre_ids": m.genre_ids,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
