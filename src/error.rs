use std::fmt;
use thiserror::Error;

/// Failure talking to the metadata provider.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{endpoint} -> {status} {status_text}")]
    Request {
        endpoint: String,
        status: u16,
        status_text: String,
    },

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    /// HTTP status reported by the provider, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPart {
    Detail,
    Credits,
    Similar,
}

impl fmt::Display for DetailPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetailPart::Detail => "detail",
            DetailPart::Credits => "credits",
            DetailPart::Similar => "similar movies",
        };
        f.write_str(name)
    }
}

/// One of the joined fetches behind a movie page failed; the page as a whole is unavailable.
#[derive(Error, Debug)]
#[error("loading {part} for movie {movie_id} failed: {source}")]
pub struct DetailError {
    pub movie_id: i32,
    pub part: DetailPart,
    #[source]
    pub source: CatalogError,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("gave up writing '{key}' after {attempts} conflicting attempts")]
    Contention { key: String, attempts: usize },
}
