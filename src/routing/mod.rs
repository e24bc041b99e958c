//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path (path + query)
//!     → router.rs (walk rules in declared order)
//!     → matcher.rs (prefix / pattern test)
//!     → bypass.rs (exact-path redirect, path component only)
//!     → rewrite.rs (forwarded path)
//!     → Return: Forward | Redirect | NoMatch
//!
//! Rule Compilation (at startup and on reload):
//!     RuleConfig[] (active profile, declared order)
//!     → Compile matchers, origins, rewrites, bypasses
//!     → Freeze as immutable Router
//!     → shared.rs swaps it in atomically
//! ```
//!
//! # Design Decisions
//! - Rules compiled up front, immutable at runtime
//! - Deterministic: same input always yields the same outcome
//! - First match wins, in declared order
//! - Decisions are pure values; the transport performs all I/O

pub mod bypass;
pub mod matcher;
pub mod rewrite;
pub mod router;
pub mod rule;
pub mod shared;

pub use bypass::{Bypass, TerminalResponse};
pub use router::{ResolveError, Router, RoutingOutcome};
pub use rule::{Forward, Origin, Rule};
pub use shared::SharedRouter;
