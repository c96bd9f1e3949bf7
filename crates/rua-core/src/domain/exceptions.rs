//! URL exception matching.
//!
//! The user can suspend spoofing for specific sites.  Exceptions are stored as
//! glob patterns in `Configuration::exception_patterns` and matched against
//! the full page URL:
//!
//! | Pattern               | Matches                                       |
//! |-----------------------|-----------------------------------------------|
//! | `chrome://*`          | any URL starting with `chrome://`             |
//! | `*://example.com/*`   | any scheme, host `example.com`, any path      |
//! | `https://*.corp/*`    | any HTTPS host ending in `.corp`              |
//!
//! `*` matches any run of characters, including `/`.  `?` matches a single
//! character and `[...]` a character class, as in the `glob` crate.
//! Patterns that fail to compile are logged and never match.

use glob::Pattern;
use tracing::warn;

/// A compiled set of exception patterns.
#[derive(Debug, Clone, Default)]
pub struct ExceptionMatcher {
    patterns: Vec<Pattern>,
}

impl ExceptionMatcher {
    /// Compiles `patterns`, skipping (and logging) the invalid ones.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw.as_ref()) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("ignoring invalid exception pattern \"{}\": {e}", raw.as_ref());
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Returns `true` when `uri` matches at least one pattern.
    pub fn is_match(&self, uri: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(uri))
    }

    /// Number of successfully compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Returns `true` when a single raw pattern matches `uri`.
pub fn pattern_matches(pattern: &str, uri: &str) -> bool {
    Pattern::new(pattern).map(|p| p.matches(uri)).unwrap_or(false)
}

/// Returns `true` when `pattern` compiles.
pub fn is_valid_pattern(pattern: &str) -> bool {
    Pattern::new(pattern).is_ok()
}

/// Extracts the authority host (with port) from a URL, without user info.
///
/// Returns `None` for URLs without a `scheme://host` part (e.g. `about:blank`).
pub fn host_of(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("://")?;
    let authority = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    (!host.is_empty()).then_some(host)
}

/// Builds the exception pattern covering the whole site of `uri`.
///
/// Produces `*://host/*` when that pattern matches `uri`.  Otherwise (no host,
/// or a URL without a path such as `https://example.com`) the URL itself is
/// escaped and used as an exact pattern.
pub fn pattern_for_uri(uri: &str) -> String {
    if let Some(host) = host_of(uri) {
        let site = format!("*://{}/*", Pattern::escape(host));
        if pattern_matches(&site, uri) {
            return site;
        }
    }
    Pattern::escape(uri)
}
