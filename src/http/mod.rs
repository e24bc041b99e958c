//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → routing (Forward | Redirect | NoMatch)
//!     → forward.rs (upstream exchange) | response.rs (bypass answer)
//!       | static fallback
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
