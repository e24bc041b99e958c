//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check every rule compiles (pattern, target, rewrite, bypass)
//! - Detect duplicate rule names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, RuleConfig};
use crate::routing::Rule;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("rule #{index} has an empty name")]
    EmptyRuleName { index: usize },

    #[error("rule name `{0}` is declared more than once")]
    DuplicateRuleName(String),

    #[error("rule `{rule}`: invalid match pattern: {reason}")]
    InvalidPattern { rule: String, reason: String },

    #[error("rule `{rule}`: invalid target: {reason}")]
    InvalidTarget { rule: String, reason: String },

    #[error("rule `{rule}`: invalid rewrite: {reason}")]
    InvalidRewrite { rule: String, reason: String },

    #[error("rule `{rule}`: invalid bypass: {reason}")]
    InvalidBypass { rule: String, reason: String },
}

/// Validate the whole configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("upstream.connect_timeout_secs"));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue("upstream.request_timeout_secs"));
    }

    if let Err(rule_errors) = compile_rules(&config.rules) {
        errors.extend(rule_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check and compile a rule table, preserving declared order.
pub fn compile_rules<'a>(
    rules: impl IntoIterator<Item = &'a RuleConfig>,
) -> Result<Vec<Rule>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut compiled = Vec::new();
    let mut seen = HashSet::new();

    for (index, rule) in rules.into_iter().enumerate() {
        if rule.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRuleName { index });
        } else if !seen.insert(rule.name.as_str()) {
            errors.push(ValidationError::DuplicateRuleName(rule.name.clone()));
        }

        match Rule::compile(rule) {
            Ok(rule) => compiled.push(rule),
            Err(rule_errors) => errors.extend(rule_errors),
        }
    }

    if errors.is_empty() {
        Ok(compiled)
    } else {
        Err(errors)
    }
}
