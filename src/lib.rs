//! Development reverse proxy library.
//!
//! The [`routing`] module holds the decision core: an ordered rule table that
//! turns a request path into `Forward`, `Redirect` or `NoMatch`. Everything
//! else is the runtime around it.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Router, RoutingOutcome};
