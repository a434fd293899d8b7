use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use glob::Pattern;

use crate::config::ConfigError;

/// Decides whether a route pattern applies to a request path.
///
/// The gate never interprets pattern syntax itself, so any matcher can be
/// plugged in. Closures of the right shape are matchers too.
pub trait RouteMatcher: Send + Sync {
    fn matches(&self, pattern: &str, path: &str) -> bool;
}

impl<F> RouteMatcher for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, pattern: &str, path: &str) -> bool {
        self(pattern, path)
    }
}

/// The default matcher, backed by [`glob::Pattern`].
///
/// A pattern without glob metacharacters only matches the identical path.
/// Each `*` matches any run of characters, including `/` and the empty run,
/// so `/api/*` matches `/api/users/1` but not `/api`. `?` and `[...]` keep
/// their glob meaning.
///
/// Patterns are compiled once by [`GlobMatcher::compile`]. A pattern that was
/// not compiled up front is compiled on the spot; one that fails to compile
/// never matches.
#[derive(Clone, Debug, Default)]
pub struct GlobMatcher {
    compiled: HashMap<String, Pattern>,
}

impl GlobMatcher {
    /// Compile every pattern, failing on the first invalid one.
    pub fn compile<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
        let compiled = patterns
            .into_iter()
            .map(|pattern| {
                Pattern::new(pattern)
                    .map(|compiled| (pattern.to_string(), compiled))
                    .map_err(|source| ConfigError::Pattern {
                        pattern: pattern.to_string(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { compiled })
    }
}

impl RouteMatcher for GlobMatcher {
    fn matches(&self, pattern: &str, path: &str) -> bool {
        match self.compiled.get(pattern) {
            Some(compiled) => compiled.matches(path),
            None => Pattern::new(pattern).is_ok_and(|p| p.matches(path)),
        }
    }
}

/// Allow/deny pattern lists bound to a matcher.
#[derive(Clone)]
pub struct RouteFilter {
    allow: Vec<String>,
    deny: Vec<String>,
    matcher: Arc<dyn RouteMatcher>,
}

impl Debug for RouteFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteFilter")
            .field("allow", &self.allow)
            .field("deny", &self.deny)
            .finish_non_exhaustive()
    }
}

impl RouteFilter {
    pub fn new(allow: Vec<String>, deny: Vec<String>, matcher: Arc<dyn RouteMatcher>) -> Self {
        Self {
            allow,
            deny,
            matcher,
        }
    }

    /// A path is limited when some deny pattern matches it and no allow
    /// pattern does.
    pub fn is_limited(&self, path: &str) -> bool {
        self.deny.iter().any(|p| self.matcher.matches(p, path))
            && !self.allow.iter().any(|p| self.matcher.matches(p, path))
    }
}
