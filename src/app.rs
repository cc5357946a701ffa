use crate::config::Config;
use crate::detail::{self, load_favorite_movies, load_movie, MovieView};
use crate::error::{CatalogError, DetailError, StorageError};
use crate::favorites::{FavoritesSet, FavoritesStore, FileStore};
use crate::genres::GenreTable;
use crate::models::{CastMember, CrewMember, Movie, MovieDetail, MovieList};
use crate::query::{filter_movies, query_with, QueryCriteria, SortMode};
use crate::tmdb::{image_url, CatalogApi, ImageSize, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinError;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 16 * 1024; // mutations carry no body

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogApi>,
    pub favorites: Arc<FavoritesStore>,
    pub genres: Arc<GenreTable>,
}

pub async fn run_server(config: Config) -> Result<()> {
    let catalog: Arc<dyn CatalogApi> = Arc::new(TmdbClient::from_config(&config)?);
    let genres = match catalog.genres().await {
        Ok(list) => {
            info!("Loaded {} provider genres", list.genres.len());
            Arc::new(GenreTable::from_provider(&list))
        }
        Err(e) => {
            warn!("Failed to fetch TMDB genre list, using built-in table: {}", e);
            Arc::new(GenreTable::builtin().clone())
        }
    };
    info!("Favorites stored under {}", config.data_dir.display());
    let favorites = Arc::new(FavoritesStore::new(Arc::new(FileStore::new(
        config.data_dir.clone(),
    ))));

    let state = AppState {
        catalog,
        favorites,
        genres,
    };

    let app = build_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http());

    info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/movies", get(popular))
        .route("/trending", get(trending))
        .route("/top-rated", get(top_rated))
        .route("/upcoming", get(upcoming))
        .route("/search", get(search))
        .route("/tv-shows", get(tv_shows))
        .route("/favorites", get(favorites_page))
        .route("/favorites/:id", put(add_favorite).delete(remove_favorite))
        .route("/favorites/:id/toggle", post(toggle_favorite))
        .route("/movie/:id", get(movie))
        .route("/genres", get(genre_keys))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub sort: Option<String>,
}

impl ListParams {
    fn criteria(&self) -> QueryCriteria {
        QueryCriteria {
            query: self.q.clone().unwrap_or_default(),
            year: self.year.clone(),
            genre: self.genre.clone(),
            sort: self.sort.as_deref().map(SortMode::from).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieCard {
    pub id: i32,
    pub title: String,
    pub overview: String,
    pub poster_url: Option<String>,
    pub year: Option<i32>,
    pub rating: f64,
    pub is_favorite: bool,
}

impl MovieCard {
    fn new(movie: &Movie, favorites: &FavoritesSet) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            overview: movie.overview.clone(),
            poster_url: image_url(movie.poster_path.as_deref(), ImageSize::W500),
            year: detail::release_year(movie.release_date.as_deref()),
            rating: detail::rounded_rating(movie.vote_average),
            is_favorite: favorites.contains(movie.id),
        }
    }
}

fn cards(movies: &[Movie], favorites: &FavoritesSet) -> Vec<MovieCard> {
    movies.iter().map(|m| MovieCard::new(m, favorites)).collect()
}

#[derive(Debug, Serialize)]
pub struct ListPage {
    pub title: &'static str,
    pub sort: SortMode,
    pub total: usize,
    pub movies: Vec<MovieCard>,
}

#[derive(Debug, Serialize)]
pub struct Featured {
    #[serde(flatten)]
    pub card: MovieCard,
    pub backdrop_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub featured: Option<Featured>,
    pub total: usize,
    pub movies: Vec<MovieCard>,
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub query: String,
    pub sort: SortMode,
    pub total: usize,
    pub movies: Vec<MovieCard>,
}

#[derive(Debug, Serialize)]
pub struct DetailPage {
    pub detail: MovieDetail,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub year: Option<i32>,
    pub rating: f64,
    pub runtime: Option<String>,
    pub director: Option<CrewMember>,
    pub top_cast: Vec<CastMember>,
    pub similar: Vec<MovieCard>,
    pub is_favorite: bool,
}

impl DetailPage {
    fn new(view: MovieView, favorites: &FavoritesSet) -> Self {
        let movie = &view.detail.movie;
        Self {
            poster_url: image_url(movie.poster_path.as_deref(), ImageSize::W500),
            backdrop_url: image_url(movie.backdrop_path.as_deref(), ImageSize::Original),
            year: detail::release_year(movie.release_date.as_deref()),
            rating: detail::rounded_rating(movie.vote_average),
            runtime: detail::format_runtime(view.detail.runtime),
            is_favorite: favorites.contains(movie.id),
            similar: cards(&view.similar, favorites),
            director: view.director,
            top_cast: view.top_cast,
            detail: view.detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FavoritesPage {
    pub total: usize,
    pub movies: Vec<MovieCard>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteToggled {
    pub id: i32,
    pub is_favorite: bool,
    pub favorites: Vec<i32>,
}

impl FavoriteToggled {
    fn new(id: i32, set: &FavoritesSet) -> Self {
        Self {
            id,
            is_favorite: set.contains(id),
            favorites: set.ids().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Popular,
    Trending,
    TopRated,
    Upcoming,
}

impl ListKind {
    fn title(&self) -> &'static str {
        match self {
            ListKind::Popular => "All Movies",
            ListKind::Trending => "Trending Movies",
            ListKind::TopRated => "Top Rated Movies",
            ListKind::Upcoming => "Upcoming Movies",
        }
    }

    async fn fetch(&self, catalog: &dyn CatalogApi) -> Result<MovieList, CatalogError> {
        match self {
            ListKind::Popular => catalog.popular_movies().await,
            ListKind::Trending => catalog.trending_movies().await,
            ListKind::TopRated => catalog.top_rated_movies().await,
            ListKind::Upcoming => catalog.upcoming_movies().await,
        }
    }
}

/// Favorites live on disk; run store calls on the blocking pool.
async fn favorites_op<T, F>(state: &AppState, op: F) -> Result<T, AppError>
where
    F: FnOnce(&FavoritesStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let store = state.favorites.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(AppError::Blocking)
}

async fn home(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<HomePage>, AppError> {
    let list = state.catalog.popular_movies().await?;
    let favorites = favorites_op(&state, FavoritesStore::load).await?;
    let featured = list.results.first().map(|m| Featured {
        card: MovieCard::new(m, &favorites),
        backdrop_url: image_url(m.backdrop_path.as_deref(), ImageSize::Original),
    });
    // The landing page filters but keeps the provider's popularity order.
    let movies = filter_movies(&list.results, &params.criteria(), &state.genres);
    Ok(Json(HomePage {
        featured,
        total: movies.len(),
        movies: cards(&movies, &favorites),
    }))
}

async fn render_list(
    state: &AppState,
    kind: ListKind,
    params: &ListParams,
) -> Result<Json<ListPage>, AppError> {
    let list = kind.fetch(state.catalog.as_ref()).await?;
    let criteria = params.criteria();
    let movies = query_with(&list.results, &criteria, &state.genres);
    let favorites = favorites_op(state, FavoritesStore::load).await?;
    Ok(Json(ListPage {
        title: kind.title(),
        sort: criteria.sort,
        total: movies.len(),
        movies: cards(&movies, &favorites),
    }))
}

async fn popular(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListPage>, AppError> {
    render_list(&state, ListKind::Popular, &params).await
}

async fn trending(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListPage>, AppError> {
    render_list(&state, ListKind::Trending, &params).await
}

async fn top_rated(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListPage>, AppError> {
    render_list(&state, ListKind::TopRated, &params).await
}

async fn upcoming(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListPage>, AppError> {
    render_list(&state, ListKind::Upcoming, &params).await
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<SearchPage>, AppError> {
    let term = params.q.as_deref().unwrap_or_default().trim().to_string();
    let sort = params.sort.as_deref().map(SortMode::from).unwrap_or_default();
    if term.is_empty() {
        return Ok(Json(SearchPage {
            query: term,
            sort,
            total: 0,
            movies: Vec::new(),
        }));
    }

    let list = state.catalog.search_movies(&term).await?;
    // The provider already matched the text; only year and ordering apply here.
    let criteria = QueryCriteria {
        query: String::new(),
        year: params.year.clone(),
        genre: None,
        sort,
    };
    let movies = query_with(&list.results, &criteria, &state.genres);
    let favorites = favorites_op(&state, FavoritesStore::load).await?;
    info!("Search '{}' -> {} result(s)", term, movies.len());
    Ok(Json(SearchPage {
        query: term,
        sort,
        total: movies.len(),
        movies: cards(&movies, &favorites),
    }))
}

async fn tv_shows() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({"status": "error", "message": "TV shows are coming soon"})),
    )
}

async fn favorites_page(State(state): State<AppState>) -> Result<Json<FavoritesPage>, AppError> {
    let set = favorites_op(&state, FavoritesStore::load).await?;
    let details = load_favorite_movies(state.catalog.as_ref(), &set).await?;
    let movies: Vec<MovieCard> = details
        .iter()
        .map(|d| MovieCard::new(&d.movie, &set))
        .collect();
    Ok(Json(FavoritesPage {
        total: movies.len(),
        movies,
    }))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<FavoriteToggled>, AppError> {
    let set = favorites_op(&state, move |f| f.toggle(id)).await??;
    Ok(Json(FavoriteToggled::new(id, &set)))
}

async fn add_favorite(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<FavoriteToggled>, AppError> {
    let set = favorites_op(&state, move |f| f.add(id)).await??;
    Ok(Json(FavoriteToggled::new(id, &set)))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<FavoriteToggled>, AppError> {
    let set = favorites_op(&state, move |f| f.remove(id)).await??;
    Ok(Json(FavoriteToggled::new(id, &set)))
}

async fn movie(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<DetailPage>, AppError> {
    let view = load_movie(state.catalog.as_ref(), id).await?;
    let favorites = favorites_op(&state, FavoritesStore::load).await?;
    Ok(Json(DetailPage::new(view, &favorites)))
}

async fn genre_keys(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.genres.keys().map(str::to_string).collect())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"status": "error", "message": "Page not found"})),
    )
}

#[derive(Debug)]
pub enum AppError {
    Catalog(CatalogError),
    Detail(DetailError),
    Storage(StorageError),
    Blocking(JoinError),
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        AppError::Catalog(e)
    }
}

impl From<DetailError> for AppError {
    fn from(e: DetailError) -> Self {
        AppError::Detail(e)
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::Storage(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Catalog(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Detail(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Storage(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Blocking(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        error!("Request failed: {}", message);
        (
            status,
            Json(json!({"status": "error", "message": message})),
        )
            .into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
