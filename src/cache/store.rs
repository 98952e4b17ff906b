//! Rendered page storage.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use crate::domain::revalidation::{InvalidationTarget, PathSet};

use super::config::CacheConfig;
use super::keys::{PageKey, normalize_path};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_PAGE_CACHE_HIT: &str = "vetrina_page_cache_hit_total";
pub(crate) const METRIC_PAGE_CACHE_MISS: &str = "vetrina_page_cache_miss_total";
pub(crate) const METRIC_PAGE_CACHE_EVICT: &str = "vetrina_page_cache_evict_total";
pub(crate) const METRIC_PAGE_CACHE_INVALIDATED: &str = "vetrina_page_cache_invalidated_total";

/// Cached HTTP response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// LRU cache of rendered pages.
///
/// This is the invalidation primitive revalidation requests are executed
/// against.
pub struct PageStore {
    responses: RwLock<LruCache<PageKey, CachedResponse>>,
    /// Bumped by every invalidation, under the write lock.
    generation: AtomicU64,
}

impl PageStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            responses: RwLock::new(LruCache::new(config.page_limit_non_zero())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &PageKey) -> Option<CachedResponse> {
        let cached = rw_write(&self.responses, SOURCE, "get").get(key).cloned();
        match cached {
            Some(_) => counter!(METRIC_PAGE_CACHE_HIT).increment(1),
            None => counter!(METRIC_PAGE_CACHE_MISS).increment(1),
        }
        cached
    }

    /// Store a response, returning the key evicted to make room, if any.
    pub fn set(&self, key: PageKey, response: CachedResponse) -> Option<PageKey> {
        let evicted = rw_write(&self.responses, SOURCE, "set")
            .push(key.clone(), response)
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key);
        if evicted.is_some() {
            counter!(METRIC_PAGE_CACHE_EVICT).increment(1);
        }
        evicted
    }

    /// Invalidation generation; take it before rendering a miss and pass it
    /// to [`set_if_current`](Self::set_if_current).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a render unless an invalidation ran since `generation` was
    /// read, in which case the render may predate the published content.
    pub fn set_if_current(&self, key: PageKey, response: CachedResponse, generation: u64) -> bool {
        let mut responses = rw_write(&self.responses, SOURCE, "set_if_current");
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        let evicted = responses
            .push(key.clone(), response)
            .is_some_and(|(evicted_key, _)| evicted_key != key);
        if evicted {
            counter!(METRIC_PAGE_CACHE_EVICT).increment(1);
        }
        true
    }

    /// Drop every variant (language, query) cached for `path`.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let path = normalize_path(path);
        let mut responses = rw_write(&self.responses, SOURCE, "invalidate_path");
        self.generation.fetch_add(1, Ordering::AcqRel);
        let stale: Vec<PageKey> = responses
            .iter()
            .filter(|(key, _)| key.path == path)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            responses.pop(key);
        }
        stale.len()
    }

    pub fn invalidate_all(&self) -> usize {
        let mut responses = rw_write(&self.responses, SOURCE, "invalidate_all");
        self.generation.fetch_add(1, Ordering::AcqRel);
        let count = responses.len();
        responses.clear();
        count
    }

    /// Execute a revalidation, returning how many cached responses were dropped.
    pub fn invalidate(&self, targets: &PathSet) -> usize {
        let removed = if targets.invalidates_all() {
            self.invalidate_all()
        } else {
            targets
                .iter()
                .map(|target| match target {
                    InvalidationTarget::Path(path) => self.invalidate_path(path),
                    InvalidationTarget::AllPages => 0,
                })
                .sum()
        };
        counter!(METRIC_PAGE_CACHE_INVALIDATED).increment(removed as u64);
        removed
    }

    pub fn len(&self) -> usize {
        rw_read(&self.responses, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
