//! Page cache configuration.
//!
//! Controlled via the `[cache]` table of `vetrina.toml`.

use std::num::NonZeroUsize;

const DEFAULT_PAGE_LIMIT: usize = 500;
const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_PREVIEW_COOKIE: &str = "vetrina-preview";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and store rendered pages.
    pub enabled: bool,
    /// Maximum cached responses across all paths and languages.
    pub page_limit: usize,
    /// Responses with larger bodies are passed through uncached.
    pub body_limit_bytes: usize,
    /// Requests carrying this cookie are draft/preview renders and bypass the cache.
    pub preview_cookie: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            page_limit: DEFAULT_PAGE_LIMIT,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            preview_cookie: DEFAULT_PREVIEW_COOKIE.to_string(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            page_limit: settings.page_limit.get(),
            body_limit_bytes: settings.body_limit_bytes.get(),
            preview_cookie: settings.preview_cookie.clone(),
        }
    }
}

impl CacheConfig {
    /// Returns the page limit as NonZeroUsize, clamping to 1 if zero.
    pub fn page_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.page_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
