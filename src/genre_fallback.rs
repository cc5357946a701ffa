//! Built-in genre keys, used when the provider's genre list cannot be fetched.
use std::collections::BTreeMap;

pub fn fallback_genre_keys() -> BTreeMap<String, Vec<i32>> {
    let mut keys = BTreeMap::new();
    keys.insert("action".to_string(), vec![28]);
    keys.insert("adventure".to_string(), vec![12]);
    keys.insert("comedy".to_string(), vec![35]);
    keys.insert("drama".to_string(), vec![18]);
    keys.insert("horror".to_string(), vec![27]);
    keys.insert("sci-fi".to_string(), vec![878]);
    keys.insert("thriller".to_string(), vec![53]);
    keys
}
