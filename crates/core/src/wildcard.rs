//! Wildcard lookups over in-memory keyed collections.
//!
//! The only wildcard token is `*`, matching any (possibly empty) substring.
//! Every other character matches itself.

use regex_lite::Regex;
use tracing::debug;

use crate::container::{CaseFoldingMap, KeyComparison};
use crate::errors::ConfigError;
use crate::query::WILDCARD;

/// One collection entry selected by a lookup.
#[derive(Debug, PartialEq)]
pub struct Match<'a, V> {
    pub key: &'a str,
    /// `None` when the key is present but holds no value.
    pub value: Option<&'a V>,
}

/// `true` when `query` contains the wildcard token.
pub fn has_wildcard(query: &str) -> bool {
    query.contains(WILDCARD)
}

/// Compile a wildcard query into an anchored regular expression.
///
/// The query is folded under `comparison`, so the pattern only matches keys
/// folded the same way.
pub fn compile_pattern(query: &str, comparison: KeyComparison) -> Result<Regex, ConfigError> {
    let body = comparison
        .fold(query)
        .split(WILDCARD)
        .map(regex_lite::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?s)^{body}$")).map_err(|e| ConfigError::InvalidPattern {
        pattern: query.to_string(),
        detail: e.to_string(),
    })
}

/// Looks up exact or wildcard keys in a [`CaseFoldingMap`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardMatcher;

impl WildcardMatcher {
    /// Find the entries selected by `query`.
    ///
    /// - no wildcard, key present: that single entry (its value may be `None`)
    /// - no wildcard, key missing: `None`
    /// - wildcard: every entry whose key fully matches, or `None` when no
    ///   key matches
    ///
    /// A returned vector is never empty.
    pub fn lookup<'a, V>(
        &self,
        query: &str,
        collection: &'a CaseFoldingMap<Option<V>>,
    ) -> Result<Option<Vec<Match<'a, V>>>, ConfigError> {
        if !has_wildcard(query) {
            let Some(key) = collection.stored_key(query) else {
                return Ok(None);
            };
            let value = collection.get(query).and_then(Option::as_ref);
            return Ok(Some(vec![Match { key, value }]));
        }

        let comparison = collection.comparison();
        let pattern = compile_pattern(query, comparison)?;
        let matches: Vec<Match<'a, V>> = collection
            .iter()
            .filter(|(key, _)| pattern.is_match(&comparison.fold(key)))
            .map(|(key, value)| Match {
                key,
                value: value.as_ref(),
            })
            .collect();
        debug!(query, matches = matches.len(), "wildcard lookup");

        if matches.is_empty() {
            Ok(None)
        } else {
            Ok(Some(matches))
        }
    }
}
