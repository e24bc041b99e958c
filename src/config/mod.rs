//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! dev-proxy.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, rule compilation)
//!     → ProxyConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → update sent to the server, which swaps its rule table
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BypassConfig, FallbackConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig,
    RewriteConfig, RuleConfig, UpstreamConfig,
};
pub use validation::ValidationError;
pub use watcher::{ConfigUpdates, ConfigWatcher};
