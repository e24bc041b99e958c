//! Compiled rule table entries.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::uri::{Authority, Scheme};
use url::Url;

use crate::config::{RuleConfig, ValidationError};
use crate::routing::bypass::{Bypass, ExactPathRedirect, TerminalResponse};
use crate::routing::matcher::{compile_pattern, Matcher};
use crate::routing::rewrite::PathRewrite;

/// Scheme + authority of a backend, e.g. `http://localhost:20090`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub scheme: Scheme,
    pub authority: Authority,
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| format!("`{s}`: {e}"))?;

        // The upstream client speaks plain HTTP only.
        if url.scheme() != "http" {
            return Err(format!("`{s}`: unsupported scheme `{}`, expected `http`", url.scheme()));
        }
        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => return Err(format!("`{s}`: missing host")),
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(format!("`{s}`: credentials are not allowed"));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(format!("`{s}`: must be an origin without path, query or fragment"));
        }

        let authority = &url[url::Position::BeforeHost..url::Position::AfterPort];
        Ok(Self {
            scheme: Scheme::HTTP,
            authority: Authority::from_str(authority).map_err(|e| format!("`{s}`: {e}"))?,
        })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

/// Where and how to forward a matched request.
#[derive(Debug, Clone, PartialEq)]
pub struct Forward {
    /// Name of the rule that produced this decision.
    pub rule: Arc<str>,
    pub target: Origin,
    /// Path + query to request upstream.
    pub path: String,
    /// Rewrite the Host header to the target authority.
    pub change_origin: bool,
    /// Follow upstream redirects instead of relaying them.
    pub follow_redirects: bool,
}

/// One compiled routing entry.
#[derive(Debug)]
pub struct Rule {
    name: Arc<str>,
    matcher: Box<dyn Matcher>,
    target: Origin,
    rewrite: Option<PathRewrite>,
    change_origin: bool,
    follow_redirects: bool,
    bypass: Vec<Box<dyn Bypass>>,
}

impl Rule {
    /// Compile a configured rule, reporting every problem found.
    pub fn compile(config: &RuleConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let rule = || config.name.clone();

        let matcher = compile_pattern(&config.pattern)
            .map_err(|reason| errors.push(ValidationError::InvalidPattern { rule: rule(), reason }))
            .ok();

        let target = config
            .target
            .parse::<Origin>()
            .map_err(|reason| errors.push(ValidationError::InvalidTarget { rule: rule(), reason }))
            .ok();

        let rewrite = match &config.rewrite {
            Some(rewrite) => PathRewrite::compile(rewrite)
                .map(Some)
                .map_err(|reason| errors.push(ValidationError::InvalidRewrite { rule: rule(), reason }))
                .ok(),
            None => Some(None),
        };

        let mut bypass: Vec<Box<dyn Bypass>> = Vec::with_capacity(config.bypass.len());
        for entry in &config.bypass {
            match ExactPathRedirect::compile(entry) {
                Ok(redirect) => bypass.push(Box::new(redirect)),
                Err(reason) => errors.push(ValidationError::InvalidBypass { rule: rule(), reason }),
            }
        }

        match (matcher, target, rewrite) {
            (Some(matcher), Some(target), Some(rewrite)) if errors.is_empty() => Ok(Self {
                name: Arc::from(config.name.as_str()),
                matcher,
                target,
                rewrite,
                change_origin: config.change_origin,
                follow_redirects: config.follow_redirects,
                bypass,
            }),
            _ => Err(errors),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Origin {
        &self.target
    }

    /// Human-readable matcher description.
    pub fn describe_match(&self) -> String {
        self.matcher.describe()
    }

    pub fn matches(&self, request_path: &str) -> bool {
        self.matcher.matches(request_path)
    }

    /// Run the bypass chain; the first terminal response wins.
    pub fn check_bypass(&self, request_path: &str) -> Option<TerminalResponse> {
        self.bypass.iter().find_map(|b| b.check(request_path))
    }

    /// Build the forward decision for a request this rule matched.
    pub fn forward(&self, request_path: &str) -> Forward {
        let path = match &self.rewrite {
            Some(rewrite) => rewrite.apply(request_path),
            None => request_path.to_string(),
        };

        Forward {
            rule: self.name.clone(),
            target: self.target.clone(),
            path,
            change_origin: self.change_origin,
            follow_redirects: self.follow_redirects,
        }
    }
}
