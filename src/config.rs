use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::tmdb::TMDB_BASE;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_ADDR: &str = "0.0.0.0:3146";

pub const REQUIRED_ENV: [&str; 1] = ["TMDB_API_KEY"];

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub data_dir: PathBuf,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tmdb_api_key = env::var("TMDB_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .context("TMDB_API_KEY not set")?;
        let tmdb_base_url = optional("TMDB_BASE_URL").unwrap_or_else(|| TMDB_BASE.to_string());
        let data_dir = optional("CINEDEX_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let addr_raw = optional("CINEDEX_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw
            .parse()
            .with_context(|| format!("CINEDEX_ADDR is not a socket address: {addr_raw}"))?;

        Ok(Self {
            tmdb_api_key,
            tmdb_base_url,
            data_dir,
            addr,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}
