use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cinedex::app::{build_router, AppState};
use cinedex::error::CatalogError;
use cinedex::favorites::{FavoritesStore, FileStore, KeyValueStore, MemoryStore, FAVORITES_KEY};
use cinedex::genres::GenreTable;
use cinedex::models::{CastMember, Credits, CrewMember, GenreList, Movie, MovieDetail, MovieList};
use cinedex::tmdb::{CatalogApi, CatalogResult, DiscoverParams};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

struct FakeCatalog {
    popular: Vec<Movie>,
    fail_lists: bool,
    fail_credits: bool,
    searches: Mutex<Vec<String>>,
}

fn unavailable(endpoint: &str) -> CatalogError {
    CatalogError::Request {
        endpoint: endpoint.to_string(),
        status: 503,
        status_text: "Service Unavailable".to_string(),
    }
}

impl FakeCatalog {
    fn list(&self, endpoint: &str) -> CatalogResult<MovieList> {
        if self.fail_lists {
            return Err(unavailable(endpoint));
        }
        Ok(MovieList::new(self.popular.clone()))
    }
}

#[async_trait::async_trait]
impl CatalogApi for FakeCatalog {
    async fn trending_movies(&self) -> CatalogResult<MovieList> {
        self.list("/trending/movie/week")
    }
    async fn popular_movies(&self) -> CatalogResult<MovieList> {
        self.list("/movie/popular")
    }
    async fn top_rated_movies(&self) -> CatalogResult<MovieList> {
        self.list("/movie/top_rated")
    }
    async fn upcoming_movies(&self) -> CatalogResult<MovieList> {
        self.list("/movie/upcoming")
    }
    async fn movie_detail(&self, id: i32) -> CatalogResult<MovieDetail> {
        let movie = self
            .popular
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::Request {
                endpoint: format!("/movie/{id}"),
                status: 404,
                status_text: "Not Found".to_string(),
            })?;
        Ok(MovieDetail {
            movie,
            runtime: Some(166),
            genres: Vec::new(),
            production_companies: Vec::new(),
            budget: 190_000_000,
            revenue: 714_000_000,
            tagline: Some("Long live the fighters.".to_string()),
            imdb_id: Some("tt15239678".to_string()),
        })
    }
    async fn movie_credits(&self, id: i32) -> CatalogResult<Credits> {
        if self.fail_credits {
            return Err(CatalogError::Request {
                endpoint: format!("/movie/{id}/credits"),
                status: 500,
                status_text: "Internal Server Error".to_string(),
            });
        }
        let cast = (0..8)
            .map(|i| CastMember {
                id: 100 + i,
                name: format!("Actor {i}"),
                character: format!("Character {i}"),
                profile_path: None,
                order: i,
            })
            .collect();
        Ok(Credits {
            cast,
            crew: vec![
                CrewMember {
                    id: 1,
                    name: "Hans Zimmer".to_string(),
                    job: "Original Music Composer".to_string(),
                    department: "Sound".to_string(),
                    profile_path: None,
                },
                CrewMember {
                    id: 2,
                    name: "Denis Villeneuve".to_string(),
                    job: "Director".to_string(),
                    department: "Directing".to_string(),
                    profile_path: Some("/denis.jpg".to_string()),
                },
            ],
        })
    }
    async fn similar_movies(&self, id: i32) -> CatalogResult<MovieList> {
        Ok(MovieList::new(
            self.popular.iter().filter(|m| m.id != id).cloned().collect(),
        ))
    }
    async fn search_movies(&self, query: &str) -> CatalogResult<MovieList> {
        self.searches.lock().unwrap().push(query.to_string());
        let needle = query.to_lowercase();
        Ok(MovieList::new(
            self.popular
                .iter()
                .filter(|m| m.title.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        ))
    }
    async fn genres(&self) -> CatalogResult<GenreList> {
        Ok(GenreList::default())
    }
    async fn discover_movies(&self, _params: &DiscoverParams) -> CatalogResult<MovieList> {
        self.list("/discover/movie")
    }
}

fn movie(id: i32, title: &str, date: &str, rating: f64, popularity: f64, genres: &[i32]) -> Movie {
    Movie {
        id,
        title: title.to_string(),
        overview: format!("{title} overview"),
        poster_path: Some(format!("/poster{id}.jpg")),
        backdrop_path: Some(format!("/backdrop{id}.jpg")),
        release_date: Some(date.to_string()),
        vote_average: rating,
        genre_ids: genres.to_vec(),
        popularity,
        vote_count: 1000,
        adult: false,
        video: false,
        original_language: "en".to_string(),
        original_title: title.to_string(),
    }
}

fn fixtures() -> Vec<Movie> {
    // Provider order is popularity-descending.
    vec![
        movie(693134, "Dune Part Two", "2024-02-27", 8.3, 90.0, &[878, 12]),
        movie(438631, "Dune", "2021-09-15", 8.0, 50.0, &[878, 12]),
        movie(949, "Heat", "1995-12-15", 7.9, 30.0, &[28, 80, 18]),
        movie(813, "Airplane!", "1980-07-02", 7.2, 20.0, &[35]),
    ]
}

fn fake_catalog() -> FakeCatalog {
    FakeCatalog {
        popular: fixtures(),
        fail_lists: false,
        fail_credits: false,
        searches: Mutex::new(Vec::new()),
    }
}

fn app_with_mocks(catalog: FakeCatalog) -> (Router, Arc<FakeCatalog>, Arc<MemoryStore>) {
    let catalog = Arc::new(catalog);
    let storage = Arc::new(MemoryStore::new());
    let state = AppState {
        catalog: catalog.clone(),
        favorites: Arc::new(FavoritesStore::new(storage.clone())),
        genres: Arc::new(GenreTable::builtin().clone()),
    };
    (build_router(state), catalog, storage)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request");
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn titles(body: &Value) -> Vec<String> {
    body.get("movies")
        .and_then(|m| m.as_array())
        .map(|movies| {
            movies
                .iter()
                .filter_map(|m| m.get("title").and_then(|t| t.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn movies_route_filters_by_text_and_sorts_by_rating() {
    let (app, _, _) = app_with_mocks(fake_catalog());
    let (status, body) = send(&app, "GET", "/movies?q=dune&sort=vote_average.desc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Dune Part Two", "Dune"]);
    assert_eq!(body.get("total").and_then(|t| t.as_u64()), Some(2));
    assert_eq!(
        body.get("sort").and_then(|s| s.as_str()),
        Some("vote_average.desc")
    );
    let first = &body["movies"][0];
    assert_eq!(
        first.get("poster_url").and_then(|p| p.as_str()),
        Some("https://image.tmdb.org/t/p/w500/poster693134.jpg")
    );
    assert_eq!(first.get("year").and_then(|y| y.as_i64()), Some(2024));
}

#[tokio::test]
async fn list_routes_share_criteria_handling() {
    let (app, _, _) = app_with_mocks(fake_catalog());
    for route in ["/movies", "/trending", "/top-rated", "/upcoming"] {
        let (status, body) = send(&app, "GET", &format!("{route}?sort=title.asc&year=19")).await;
        assert_eq!(status, StatusCode::OK, "{route}");
        assert_eq!(titles(&body), vec!["Airplane!", "Heat"], "{route}");
    }
}

#[tokio::test]
async fn unknown_genre_yields_empty_list_not_error() {
    let (app, _, _) = app_with_mocks(fake_catalog());
    let (status, body) = send(&app, "GET", "/movies?genre=western").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("total").and_then(|t| t.as_u64()), Some(0));

    let (_, body) = send(&app, "GET", "/movies?genre=all-genres&year=all-years").await;
    assert_eq!(body.get("total").and_then(|t| t.as_u64()), Some(4));
}

#[tokio::test]
async fn home_filters_without_reordering_and_features_first_result() {
    let (app, _, _) = app_with_mocks(fake_catalog());
    let (status, body) = send(&app, "GET", "/?genre=drama&sort=title.asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Heat"]);
    let featured = body.get("featured").expect("featured");
    assert_eq!(
        featured.get("title").and_then(|t| t.as_str()),
        Some("Dune Part Two")
    );
    assert_eq!(
        featured.get("backdrop_url").and_then(|b| b.as_str()),
        Some("https://image.tmdb.org/t/p/original/backdrop693134.jpg")
    );

    let (_, body) = send(&app, "GET", "/?genre=sci-fi").await;
    assert_eq!(titles(&body), vec!["Dune Part Two", "Dune"]);
}

#[tokio::test]
async fn blank_search_makes_no_provider_call() {
    let (app, catalog, _) = app_with_mocks(fake_catalog());
    let (status, body) = send(&app, "GET", "/search?q=%20%20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("total").and_then(|t| t.as_u64()), Some(0));
    assert!(catalog.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn search_passes_decoded_text_and_applies_year_and_sort() {
    let (app, catalog, _) = app_with_mocks(fake_catalog());
    let (status, body) = send(&app, "GET", "/search?q=dune%20&sort=release_date.asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Dune", "Dune Part Two"]);
    assert_eq!(body.get("query").and_then(|q| q.as_str()), Some("dune"));
    assert_eq!(catalog.searches.lock().unwrap().as_slice(), &["dune".to_string()]);

    let (_, body) = send(&app, "GET", "/search?q=dune&year=2024").await;
    assert_eq!(titles(&body), vec!["Dune Part Two"]);
}

#[tokio::test]
async fn toggle_marks_and_unmarks_favorite() {
    let (app, _, storage) = app_with_mocks(fake_catalog());

    let (status, body) = send(&app, "POST", "/favorites/949/toggle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("is_favorite").and_then(|f| f.as_bool()), Some(true));
    assert_eq!(
        storage.get(FAVORITES_KEY).unwrap().as_deref(),
        Some("[949]")
    );

    let (_, body) = send(&app, "GET", "/movies?q=heat").await;
    assert_eq!(
        body["movies"][0].get("is_favorite").and_then(|f| f.as_bool()),
        Some(true)
    );

    let (_, body) = send(&app, "POST", "/favorites/949/toggle").await;
    assert_eq!(body.get("is_favorite").and_then(|f| f.as_bool()), Some(false));
    assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn adding_twice_keeps_single_entry_and_delete_removes() {
    let (app, _, _) = app_with_mocks(fake_catalog());
    send(&app, "PUT", "/favorites/813").await;
    let (status, body) = send(&app, "PUT", "/favorites/813").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("favorites"), Some(&serde_json::json!([813])));

    let (status, body) = send(&app, "DELETE", "/favorites/813").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("favorites"), Some(&serde_json::json!([])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_backed_favorites_keep_concurrent_adds() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState {
        catalog: Arc::new(fake_catalog()),
        favorites: Arc::new(FavoritesStore::new(Arc::new(FileStore::new(dir.path())))),
        genres: Arc::new(GenreTable::builtin().clone()),
    };
    let app = build_router(state);

    let ids = [949, 813, 438631, 693134];
    let uris: Vec<String> = ids.iter().map(|id| format!("/favorites/{id}")).collect();
    let responses = futures::future::join_all(uris.iter().map(|uri| send(&app, "PUT", uri))).await;
    for (status, body) in &responses {
        assert_eq!(*status, StatusCode::OK, "{body}");
    }

    let (status, body) = send(&app, "GET", "/favorites").await;
    assert_eq!(status, StatusCode::OK);
    let mut listed: Vec<i64> = body["movies"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m.get("id").and_then(|id| id.as_i64()))
        .collect();
    listed.sort();
    assert_eq!(listed, vec![813, 949, 438631, 693134]);
    assert!(dir.path().join("movieFavorites.json").exists());
}

#[tokio::test]
async fn favorites_page_lists_stored_movies_in_order() {
    let (app, _, storage) = app_with_mocks(fake_catalog());
    storage.insert(FAVORITES_KEY, "[949, 438631]");
    let (status, body) = send(&app, "GET", "/favorites").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Heat", "Dune"]);
    assert!(body["movies"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m.get("is_favorite").and_then(|f| f.as_bool()) == Some(true)));
}

#[tokio::test]
async fn corrupt_favorites_render_as_empty() {
    let (app, _, storage) = app_with_mocks(fake_catalog());
    storage.insert(FAVORITES_KEY, "{oops");
    let (status, body) = send(&app, "GET", "/favorites").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("total").and_then(|t| t.as_u64()), Some(0));
}

#[tokio::test]
async fn movie_page_joins_detail_credits_and_similar() {
    let (app, _, storage) = app_with_mocks(fake_catalog());
    storage.insert(FAVORITES_KEY, "[438631]");
    let (status, body) = send(&app, "GET", "/movie/438631").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["detail"].get("title").and_then(|t| t.as_str()),
        Some("Dune")
    );
    assert_eq!(
        body["director"].get("name").and_then(|n| n.as_str()),
        Some("Denis Villeneuve")
    );
    assert_eq!(body["top_cast"].as_array().map(|c| c.len()), Some(6));
    assert_eq!(body.get("runtime").and_then(|r| r.as_str()), Some("2h 46m"));
    assert_eq!(body.get("is_favorite").and_then(|f| f.as_bool()), Some(true));
    assert_eq!(body["similar"].as_array().map(|s| s.len()), Some(3));
}

#[tokio::test]
async fn movie_page_fails_as_a_whole_when_credits_fail() {
    let (app, _, _) = app_with_mocks(FakeCatalog {
        fail_credits: true,
        ..fake_catalog()
    });
    let (status, body) = send(&app, "GET", "/movie/438631").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body.get("status").and_then(|s| s.as_str()), Some("error"));
    assert!(body.get("detail").is_none());
    let message = body.get("message").and_then(|m| m.as_str()).unwrap();
    assert!(message.contains("credits"), "{message}");
    assert!(message.contains("Internal Server Error"), "{message}");
}

#[tokio::test]
async fn provider_failure_surfaces_as_bad_gateway() {
    let (app, _, _) = app_with_mocks(FakeCatalog {
        fail_lists: true,
        ..fake_catalog()
    });
    let (status, body) = send(&app, "GET", "/trending").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap()
        .contains("Service Unavailable"));
}

#[tokio::test]
async fn stub_and_unknown_routes() {
    let (app, _, _) = app_with_mocks(fake_catalog());
    let (status, _) = send(&app, "GET", "/tv-shows").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    let (status, body) = send(&app, "GET", "/no/such/page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.get("status").and_then(|s| s.as_str()), Some("error"));
    let (status, _) = send(&app, "GET", "/movie/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = send(&app, "GET", "/genres").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().iter().any(|k| k == "sci-fi"));
}
