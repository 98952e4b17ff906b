//! Site languages.
//!
//! The catalog is published in Italian, English and Spanish. Italian is the
//! authoring language and the last resort for every lookup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Closed set of languages the site is published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    It,
    En,
    Es,
}

impl Language {
    /// Every supported language, default first.
    pub const ALL: [Language; 3] = [Language::It, Language::En, Language::Es];

    pub const fn as_str(self) -> &'static str {
        match self {
            Language::It => "it",
            Language::En => "en",
            Language::Es => "es",
        }
    }

    /// Parse a language code, tolerating case and region tags (`en-GB`, `es_ES`).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        let primary = normalized.split(['-', '_']).next().unwrap_or("");
        match primary {
            "it" => Some(Language::It),
            "en" => Some(Language::En),
            "es" => Some(Language::Es),
            _ => None,
        }
    }

    /// Pick the preferred supported language from an `Accept-Language` header.
    ///
    /// Entries are ranked by their `q` weight; ties keep header order. Entries
    /// with `q=0` are ignored. Falls back to Italian when nothing matches.
    pub fn from_accept_language(header: &str) -> Self {
        let mut candidates: Vec<(f32, usize, Language)> = header
            .split(',')
            .enumerate()
            .filter_map(|(position, entry)| {
                let mut parts = entry.split(';');
                let language = Language::parse(parts.next()?)?;
                let weight = parts
                    .filter_map(|param| param.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (weight > 0.0).then_some((weight, position, language))
            })
            .collect();

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        candidates
            .first()
            .map(|(_, _, language)| *language)
            .unwrap_or_default()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Language::parse(value)
            .ok_or_else(|| DomainError::validation(format!("unsupported language `{value}`")))
    }
}
