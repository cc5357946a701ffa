pub mod app;
pub mod config;
pub mod detail;
pub mod error;
pub mod favorites;
mod genre_fallback;
pub mod genres;
pub mod models;
pub mod query;
pub mod tmdb;
