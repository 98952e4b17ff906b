//! Style option tables that survive stega-encoded keys.
//!
//! In preview mode the CMS appends invisible zero-width markers to string
//! fields so the visual editor can map rendered text back to its source
//! field. Option keywords such as `"gray-light"` then arrive as
//! `"gray-light\u{200B}\u{200C}..."` and no longer match a table key exactly.
//!
//! [`StyleOptionTable::lookup`] keeps the exact hash lookup as the production
//! path and only falls back to a substring scan when that misses.

use std::borrow::Cow;
use std::collections::HashMap;

use super::error::DomainError;

/// Code points the CMS uses for stega encoding.
pub const STEGA_MARKERS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Remove zero-width stega markers, leaving every other character intact.
///
/// Use this where exact textual equality matters (for example `match` arms on
/// an option keyword). Borrows when there is nothing to remove.
pub fn strip_stega(value: &str) -> Cow<'_, str> {
    if value.contains(STEGA_MARKERS) {
        Cow::Owned(value.chars().filter(|c| !STEGA_MARKERS.contains(c)).collect())
    } else {
        Cow::Borrowed(value)
    }
}

/// Immutable keyword → style value table.
#[derive(Debug, Clone)]
pub struct StyleOptionTable<V> {
    index: HashMap<String, usize>,
    values: Vec<V>,
    /// Keys ordered longest first, ties broken alphabetically.
    scan_order: Vec<(String, usize)>,
    default_key: String,
    default_slot: usize,
}

impl<V> StyleOptionTable<V> {
    /// Build a table whose `default_key` must be one of the entries.
    ///
    /// A key listed twice keeps its last value.
    pub fn new<K, I>(entries: I, default_key: &str) -> Result<Self, DomainError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut values = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            match index.get(&key) {
                Some(&slot) => values[slot] = value,
                None => {
                    index.insert(key, values.len());
                    values.push(value);
                }
            }
        }

        let default_slot = *index.get(default_key).ok_or_else(|| {
            DomainError::validation(format!(
                "style table default `{default_key}` is not one of its keys"
            ))
        })?;

        let mut scan_order: Vec<(String, usize)> = index
            .iter()
            .map(|(key, slot)| (key.clone(), *slot))
            .collect();
        scan_order.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Ok(Self {
            index,
            values,
            scan_order,
            default_key: default_key.to_string(),
            default_slot,
        })
    }

    /// Exact lookup without any fallback.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.values[slot])
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve a possibly stega-contaminated keyword.
    ///
    /// - no key: the `fallback_key` entry
    /// - exact key: that entry, straight from the hash map
    /// - otherwise: the longest table key contained in `key`, or the
    ///   `fallback_key` entry when none is
    ///
    /// An unknown `fallback_key` resolves to the table default, so this
    /// always returns a value.
    pub fn lookup(&self, key: Option<&str>, fallback_key: &str) -> &V {
        let Some(key) = key else {
            return self.fallback(fallback_key);
        };

        if let Some(value) = self.get(key) {
            return value;
        }

        self.scan_order
            .iter()
            .find(|(candidate, _)| key.contains(candidate.as_str()))
            .map(|&(_, slot)| &self.values[slot])
            .unwrap_or_else(|| self.fallback(fallback_key))
    }

    /// [`lookup`](Self::lookup) using the table default as fallback.
    pub fn lookup_or_default(&self, key: Option<&str>) -> &V {
        self.lookup(key, &self.default_key)
    }

    fn fallback(&self, fallback_key: &str) -> &V {
        let slot = self
            .index
            .get(fallback_key)
            .copied()
            .unwrap_or(self.default_slot);
        &self.values[slot]
    }
}
