//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled rules in declared order
//! - Resolve a request path to Forward, Redirect or NoMatch
//! - Reject malformed request paths
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declared order, first match wins, no specificity ranking
//! - Bypass runs before rewrite and only for the matched rule
//! - Explicit NoMatch rather than silent default

use std::sync::Arc;

use axum::http::Uri;

use crate::config::{validation::compile_rules, RuleConfig, ValidationError};
use crate::routing::bypass::TerminalResponse;
use crate::routing::rule::{Forward, Rule};

/// Result of resolving one request.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingOutcome {
    /// Proxy the request upstream.
    Forward(Forward),
    /// Already answered. The caller writes `response` and must not forward.
    Redirect {
        rule: Arc<str>,
        response: TerminalResponse,
    },
    /// Not a proxy concern; the caller falls through to local handling.
    NoMatch,
}

impl RoutingOutcome {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forward(_) => "forward",
            Self::Redirect { .. } => "redirect",
            Self::NoMatch => "no_match",
        }
    }
}

/// Caller contract violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("request path is empty")]
    Empty,

    #[error("request path `{0}` does not start with `/`")]
    MissingLeadingSlash(String),
}

/// Ordered, immutable rule table.
#[derive(Debug, Default)]
pub struct Router {
    rules: Vec<Rule>,
}

impl Router {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Compile configured rules in declared order.
    pub fn from_config<'a>(
        rules: impl IntoIterator<Item = &'a RuleConfig>,
    ) -> Result<Self, Vec<ValidationError>> {
        compile_rules(rules).map(Self::new)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Resolve a path + query string against the table.
    pub fn resolve(&self, request_path: &str) -> Result<RoutingOutcome, ResolveError> {
        if request_path.is_empty() {
            return Err(ResolveError::Empty);
        }
        if !request_path.starts_with('/') {
            return Err(ResolveError::MissingLeadingSlash(request_path.to_string()));
        }

        let Some(rule) = self.rules.iter().find(|rule| rule.matches(request_path)) else {
            return Ok(RoutingOutcome::NoMatch);
        };

        if let Some(response) = rule.check_bypass(request_path) {
            return Ok(RoutingOutcome::Redirect {
                rule: Arc::from(rule.name()),
                response,
            });
        }

        Ok(RoutingOutcome::Forward(rule.forward(request_path)))
    }

    /// Resolve the path + query of a request URI.
    pub fn resolve_uri(&self, uri: &Uri) -> Result<RoutingOutcome, ResolveError> {
        let request_path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_default();
        self.resolve(request_path)
    }
}
