//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the development proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream connection settings shared by every rule.
    pub upstream: UpstreamConfig,

    /// Handling of requests that no rule claims.
    pub fallback: FallbackConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Ordered rule table. First match wins.
    pub rules: Vec<RuleConfig>,
}

impl ProxyConfig {
    /// Rules active in `profile`, in declared order.
    ///
    /// A rule with an empty `profiles` list is active everywhere. With no
    /// active profile only those unrestricted rules apply.
    pub fn rules_for<'a>(&'a self, profile: Option<&'a str>) -> impl Iterator<Item = &'a RuleConfig> + 'a {
        self.rules.iter().filter(move |rule| rule.is_active_in(profile))
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:5173").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5173".to_string(),
        }
    }
}

/// Upstream connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum upstream redirects followed for rules with `follow_redirects`.
    pub max_redirects: u32,

    /// Request bodies are buffered up to this size when redirects may be replayed.
    pub max_buffered_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            max_redirects: 5,
            max_buffered_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// What to do with requests that are not a proxy concern.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    /// Directory served for unmatched paths. `None` answers 404.
    pub static_dir: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Output format for log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// One routing entry of the rule table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Rule identifier for logging/metrics.
    pub name: String,

    /// Literal path prefix, or an anchored pattern when it starts with `^`.
    #[serde(rename = "match")]
    pub pattern: String,

    /// Backend origin, scheme + host + port (e.g., "http://localhost:20090").
    pub target: String,

    /// Optional path transform applied before forwarding.
    #[serde(default)]
    pub rewrite: Option<RewriteConfig>,

    /// Rewrite the forwarded Host header to the target authority.
    #[serde(default = "default_change_origin")]
    pub change_origin: bool,

    /// Follow upstream redirects instead of relaying them to the client.
    #[serde(default)]
    pub follow_redirects: bool,

    /// Short-circuit responses checked before forwarding.
    #[serde(default)]
    pub bypass: Vec<BypassConfig>,

    /// Profiles this rule is active in. Empty = all.
    #[serde(default)]
    pub profiles: Vec<String>,
}

impl RuleConfig {
    fn is_active_in(&self, profile: Option<&str>) -> bool {
        if self.profiles.is_empty() {
            return true;
        }
        profile.is_some_and(|p| self.profiles.iter().any(|candidate| candidate == p))
    }
}

fn default_change_origin() -> bool {
    true
}

/// Path transform applied to a matched request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewriteConfig {
    /// Remove a literal leading segment.
    StripPrefix(String),

    /// Replace the first match of `pattern` with `with`.
    Replace { pattern: String, with: String },
}

/// Exact-path redirect evaluated before forwarding.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BypassConfig {
    /// Exact request path (query string is ignored when comparing).
    pub path: String,

    /// Redirect status code.
    #[serde(default = "default_bypass_status")]
    pub status: u16,

    /// Value of the `Location` header.
    pub location: String,
}

fn default_bypass_status() -> u16 {
    302
}
