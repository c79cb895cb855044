//! URL → tracing-mode lookup with a TTL positive/negative cache.
//!
//! The match list is built once at load time from configuration entries and
//! is read-only afterwards; only the cache is mutated on the request path.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use regex::Regex;

use crate::flags::TracingMode;

const CACHE_TTL: Duration = Duration::from_secs(600);

/// One configured filter entry, as handed in by the config loader under
/// `transactionFiltering`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UrlFilterEntry {
    #[serde(default)]
    pub regex: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    pub tracing_mode: TracingMode,
}

enum Matcher {
    Regex(Regex),
    Extensions(std::collections::HashSet<String>),
}

impl Matcher {
    fn matches(&self, url: &str) -> bool {
        match self {
            Matcher::Regex(re) => re.is_match(url),
            Matcher::Extensions(exts) => url
                .rsplit_once('.')
                .map(|(_, suffix)| exts.contains(suffix))
                .unwrap_or(false),
        }
    }
}

struct Entry {
    matcher: Matcher,
    mode: TracingMode,
}

struct CacheEntry {
    mode: TracingMode,
    inserted: Instant,
}

/// Process-wide URL filter: an ordered, first-match-wins list of matchers
/// loaded once at startup, backed by a TTL cache keyed by URL string.
pub struct UrlFilter {
    entries: Vec<Entry>,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl UrlFilter {
    /// Compiles `entries` in declared order. A bad regex is logged and the
    /// entry skipped — the remaining matchers still apply.
    pub fn new(entries: &[UrlFilterEntry]) -> Self {
        let mut compiled = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let matcher = if !entry.regex.is_empty() {
                match Regex::new(&entry.regex) {
                    Ok(re) => Matcher::Regex(re),
                    Err(err) => {
                        tracing::warn!(
                            index = idx,
                            pattern = %entry.regex,
                            error = %err,
                            "dropping url filter entry with invalid regex"
                        );
                        continue;
                    }
                }
            } else {
                Matcher::Extensions(entry.extensions.iter().cloned().collect())
            };
            compiled.push(Entry {
                matcher,
                mode: entry.tracing_mode,
            });
        }

        UrlFilter {
            entries: compiled,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn empty() -> Self {
        UrlFilter {
            entries: Vec::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up the tracing mode for `url`, consulting (and populating) the
    /// 600s TTL cache. Negative lookups (`Unknown`) are cached too.
    pub fn get_tracing_mode(&self, url: &str) -> TracingMode {
        if self.entries.is_empty() || url.is_empty() {
            return TracingMode::Unknown;
        }

        let now = Instant::now();
        if let Some(cached) = self.cache.read().get(url) {
            if now.saturating_duration_since(cached.inserted) < CACHE_TTL {
                return cached.mode;
            }
        }

        let mode = self
            .entries
            .iter()
            .find(|entry| entry.matcher.matches(url))
            .map(|entry| entry.mode)
            .unwrap_or(TracingMode::Unknown);

        self.cache.write().insert(
            url.to_string(),
            CacheEntry {
                mode,
                inserted: now,
            },
        );
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(regex: &str, exts: &[&str], mode: TracingMode) -> UrlFilterEntry {
        UrlFilterEntry {
            regex: regex.to_string(),
            extensions: exts.iter().map(|s| s.to_string()).collect(),
            tracing_mode: mode,
        }
    }

    #[test]
    fn empty_filter_is_always_unknown() {
        let filter = UrlFilter::empty();
        assert_eq!(filter.get_tracing_mode("/health"), TracingMode::Unknown);
    }

    #[test]
    fn empty_url_is_always_unknown() {
        let filter = UrlFilter::new(&[entry("^/health$", &[], TracingMode::Disabled)]);
        assert_eq!(filter.get_tracing_mode(""), TracingMode::Unknown);
    }

    #[test]
    fn first_match_wins_in_declared_order() {
        let filter = UrlFilter::new(&[
            entry("^/health.*", &[], TracingMode::Disabled),
            entry("^/health/special$", &[], TracingMode::Enabled),
        ]);
        assert_eq!(
            filter.get_tracing_mode("/health/special"),
            TracingMode::Disabled
        );
    }

    #[test]
    fn extension_matcher_compares_suffix_after_last_dot() {
        let filter = UrlFilter::new(&[entry("", &["png", "jpg"], TracingMode::Disabled)]);
        assert_eq!(
            filter.get_tracing_mode("/assets/logo.png"),
            TracingMode::Disabled
        );
        assert_eq!(filter.get_tracing_mode("/api/users"), TracingMode::Unknown);
    }

    #[test]
    fn no_match_returns_unknown() {
        let filter = UrlFilter::new(&[entry("^/health$", &[], TracingMode::Disabled)]);
        assert_eq!(filter.get_tracing_mode("/other"), TracingMode::Unknown);
    }

    #[test]
    fn invalid_regex_is_dropped_remaining_matchers_still_apply() {
        let filter = UrlFilter::new(&[
            entry("(unterminated", &[], TracingMode::Disabled),
            entry("^/ok$", &[], TracingMode::Enabled),
        ]);
        assert_eq!(filter.get_tracing_mode("/ok"), TracingMode::Enabled);
    }

    #[test]
    fn result_is_cached_including_negative_lookups() {
        let filter = UrlFilter::new(&[entry("^/health$", &[], TracingMode::Disabled)]);
        assert_eq!(filter.get_tracing_mode("/missing"), TracingMode::Unknown);
        // second call should hit the cache and return the same answer
        assert_eq!(filter.get_tracing_mode("/missing"), TracingMode::Unknown);
        assert!(filter.cache.read().contains_key("/missing"));
    }
}
