use once_cell::sync::Lazy;
use std::collections::BTreeMap;

use crate::genre_fallback::fallback_genre_keys;
use crate::models::GenreList;

/// Disables genre filtering when used as a criteria value.
pub const ALL_GENRES: &str = "all-genres";

static BUILTIN: Lazy<GenreTable> = Lazy::new(|| GenreTable {
    keys: fallback_genre_keys(),
});

/// Immutable lookup from a genre key (e.g. `"sci-fi"`) to the provider genre ids it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreTable {
    keys: BTreeMap<String, Vec<i32>>,
}

impl GenreTable {
    pub fn builtin() -> &'static GenreTable {
        &BUILTIN
    }

    /// Built-in aliases plus one slug per provider genre name.
    pub fn from_provider(list: &GenreList) -> Self {
        let mut keys = fallback_genre_keys();
        for genre in &list.genres {
            let slug = slugify(&genre.name);
            if slug.is_empty() {
                continue;
            }
            let ids = keys.entry(slug).or_default();
            if !ids.contains(&genre.id) {
                ids.push(genre.id);
            }
        }
        Self { keys }
    }

    pub fn ids_for(&self, key: &str) -> Option<&[i32]> {
        self.keys.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
