//! Rendered page cache.
//!
//! Public pages are cached per language, path, and query string. CMS
//! revalidation webhooks drop the affected paths (or everything, for global
//! layout documents) so the next request renders fresh content.
//!
//! ```toml
//! [cache]
//! enabled = true
//! page_limit = 500
//! body_limit_bytes = 2097152
//! preview_cookie = "vetrina-preview"
//! ```

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::{CacheConfig, DEFAULT_PREVIEW_COOKIE};
pub use keys::{PageKey, hash_query, normalize_path};
pub use middleware::{CacheState, page_cache_layer, request_language};
pub use store::{CachedResponse, PageStore};
