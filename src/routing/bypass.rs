//! Per-rule overrides evaluated before forwarding.
//!
//! A bypass never performs I/O. It answers with a [`TerminalResponse`] that
//! the transport writes back to the client instead of proxying.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

use crate::config::BypassConfig;
use crate::routing::matcher::{ExactPathMatcher, Matcher};

/// A complete response to send instead of forwarding.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl TerminalResponse {
    /// The `Location` header, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

/// Trait for short-circuit checks attached to a rule.
pub trait Bypass: Send + Sync + std::fmt::Debug {
    /// `Some` ends the request with that response; `None` proceeds to forward.
    fn check(&self, request_path: &str) -> Option<TerminalResponse>;
}

/// Redirects one exact path (query ignored) to a fixed location.
#[derive(Debug, Clone)]
pub struct ExactPathRedirect {
    matcher: ExactPathMatcher,
    status: StatusCode,
    location: HeaderValue,
}

impl ExactPathRedirect {
    pub fn compile(config: &BypassConfig) -> Result<Self, String> {
        if !config.path.starts_with('/') {
            return Err(format!("path `{}` must start with `/`", config.path));
        }
        if config.path.contains(['?', '#']) {
            return Err(format!("path `{}` must not carry a query or fragment", config.path));
        }

        let status = StatusCode::from_u16(config.status)
            .ok()
            .filter(StatusCode::is_redirection)
            .ok_or_else(|| format!("status {} is not a redirect (3xx)", config.status))?;

        if config.location.is_empty() {
            return Err("location must not be empty".to_string());
        }
        let location = HeaderValue::from_str(&config.location)
            .map_err(|_| format!("location `{}` is not a valid header value", config.location))?;

        Ok(Self {
            matcher: ExactPathMatcher::new(config.path.clone()),
            status,
            location,
        })
    }
}

impl Bypass for ExactPathRedirect {
    fn check(&self, request_path: &str) -> Option<TerminalResponse> {
        if !self.matcher.matches(request_path) {
            return None;
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, self.location.clone());
        Some(TerminalResponse {
            status: self.status,
            headers,
        })
    }
}
