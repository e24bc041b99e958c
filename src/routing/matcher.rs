//! Request path matching.
//!
//! # Responsibilities
//! - Match literal path prefixes (case-sensitive)
//! - Match anchored patterns (`^/api`) compiled to a regex
//! - Match exact paths with the query string ignored
//!
//! # Design Decisions
//! - Literal prefixes are the common case and never touch the regex engine
//! - Prefix and pattern matchers see the full path + query, like the dev
//!   server tooling these tables come from
//! - `regex` guarantees linear-time matching

use regex::Regex;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request path matches this condition.
    fn matches(&self, request_path: &str) -> bool;

    /// Human-readable form for logs and `check` output.
    fn describe(&self) -> String;
}

/// Matches a literal path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, request_path: &str) -> bool {
        request_path.starts_with(&self.prefix)
    }

    fn describe(&self) -> String {
        format!("prefix {}", self.prefix)
    }
}

/// Matches an anchored regular expression.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl Matcher for PatternMatcher {
    fn matches(&self, request_path: &str) -> bool {
        self.pattern.is_match(request_path)
    }

    fn describe(&self) -> String {
        format!("pattern {}", self.pattern.as_str())
    }
}

/// Matches one exact path, ignoring any query string or fragment.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    path: String,
}

impl ExactPathMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactPathMatcher {
    fn matches(&self, request_path: &str) -> bool {
        path_component(request_path) == self.path
    }

    fn describe(&self) -> String {
        format!("exact {}", self.path)
    }
}

/// The path part of a path + query string.
pub fn path_component(request_path: &str) -> &str {
    request_path
        .split_once(['?', '#'])
        .map_or(request_path, |(path, _)| path)
}

/// Compile a configured `match` string.
///
/// A leading `^` selects pattern matching; anything else is a literal prefix
/// and must start with `/`.
pub fn compile_pattern(pattern: &str) -> Result<Box<dyn Matcher>, String> {
    if pattern.starts_with('^') {
        return PatternMatcher::new(pattern)
            .map(|m| Box::new(m) as Box<dyn Matcher>)
            .map_err(|e| e.to_string());
    }
    if !pattern.starts_with('/') {
        return Err(format!("`{pattern}` must start with `/` (prefix) or `^` (pattern)"));
    }
    Ok(Box::new(PathPrefixMatcher::new(pattern)))
}
