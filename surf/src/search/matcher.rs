use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::errors::{SurfError, SurfResult};

const SIMPLE_PATTERN_THRESHOLD: usize = 32;

static PATTERN_CACHE: Lazy<DashMap<String, MatchStrategy>> = Lazy::new(DashMap::new);

/// Answers whether a pattern matches a string.
///
/// Implementations must be pure: searchers call them concurrently from every
/// worker without synchronisation. Call sites do not agree on argument order
/// (most pass `(pattern, candidate)`, attribute-name matching in the table
/// searcher passes `(attribute_name, query)`), so an implementation that is
/// not symmetric under case folding should check each caller.
pub trait Matcher: Send + Sync {
    fn is_match(&self, needle: &str, haystack: &str) -> SurfResult<bool>;
}

impl<M: Matcher + ?Sized> Matcher for &M {
    fn is_match(&self, needle: &str, haystack: &str) -> SurfResult<bool> {
        (**self).is_match(needle, haystack)
    }
}

impl<M: Matcher + ?Sized> Matcher for Arc<M> {
    fn is_match(&self, needle: &str, haystack: &str) -> SurfResult<bool> {
        (**self).is_match(needle, haystack)
    }
}

impl<M: Matcher + ?Sized> Matcher for Box<M> {
    fn is_match(&self, needle: &str, haystack: &str) -> SurfResult<bool> {
        (**self).is_match(needle, haystack)
    }
}

/// Strategy for pattern matching
#[derive(Debug, Clone)]
enum MatchStrategy {
    Simple(String),
    Regex(Arc<Regex>),
}

impl MatchStrategy {
    fn is_match(&self, haystack: &str) -> bool {
        match self {
            MatchStrategy::Simple(literal) => haystack.contains(literal.as_str()),
            MatchStrategy::Regex(regex) => regex.is_match(haystack),
        }
    }
}

/// Regular-expression matcher that case-folds its inputs before matching.
///
/// Compiled patterns are cached process-wide, so building one matcher per
/// search and sharing it between workers costs a single compilation.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    /// Lower-case the haystack first (`some/Secret/Val` -> `some/secret/val`)
    pub lower_haystack: bool,
    /// Lower-case the needle first (`Azure_user` -> `azure_user`)
    pub lower_needle: bool,
}

impl Default for RegexMatcher {
    fn default() -> Self {
        Self {
            lower_haystack: true,
            lower_needle: true,
        }
    }
}

impl RegexMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A matcher that compares both sides exactly as given.
    pub fn case_sensitive() -> Self {
        Self {
            lower_haystack: false,
            lower_needle: false,
        }
    }

    /// Determines if a pattern can use plain substring matching
    fn is_simple_pattern(pattern: &str) -> bool {
        pattern.len() < SIMPLE_PATTERN_THRESHOLD
            && !pattern.contains(|c: char| c.is_ascii_punctuation() && c != '_' && c != '-')
    }

    fn strategy_for(pattern: &str) -> SurfResult<MatchStrategy> {
        if let Some(entry) = PATTERN_CACHE.get(pattern) {
            return Ok(entry.clone());
        }

        let strategy = if Self::is_simple_pattern(pattern) {
            MatchStrategy::Simple(pattern.to_string())
        } else {
            let regex = Regex::new(pattern)
                .map_err(|e| SurfError::invalid_pattern(pattern, e.to_string()))?;
            MatchStrategy::Regex(Arc::new(regex))
        };

        PATTERN_CACHE.insert(pattern.to_string(), strategy.clone());
        Ok(strategy)
    }
}

impl Matcher for RegexMatcher {
    fn is_match(&self, needle: &str, haystack: &str) -> SurfResult<bool> {
        let needle = if self.lower_needle {
            needle.to_lowercase()
        } else {
            needle.to_string()
        };
        let strategy = Self::strategy_for(&needle)?;

        if self.lower_haystack {
            Ok(strategy.is_match(&haystack.to_lowercase()))
        } else {
            Ok(strategy.is_match(haystack))
        }
    }
}
