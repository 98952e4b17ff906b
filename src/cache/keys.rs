//! Page cache keys.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use percent_encoding::percent_decode_str;

use crate::domain::language::Language;

/// Identifies one rendered variant of a path.
///
/// Invalidation works on `path` alone and drops every language and query
/// variant of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub language: Language,
    pub path: String,
    pub query_hash: u64,
}

impl PageKey {
    pub fn new(language: Language, path: impl Into<String>, query: &str) -> Self {
        Self {
            language,
            path: normalize_path(&path.into()),
            query_hash: hash_query(query),
        }
    }
}

/// Hash a raw query string. The empty query hashes to zero.
pub fn hash_query(query: &str) -> u64 {
    if query.is_empty() {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

/// Canonical cache path: percent-decoded, without a trailing slash.
///
/// Request URIs arrive encoded (`/prodotti/caff%C3%A8`) while revalidation
/// builds paths from raw slugs (`/prodotti/caffè`); both must land on the
/// same key.
pub fn normalize_path(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let trimmed = decoded.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
