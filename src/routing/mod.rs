//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Exchange (method, raw path)
//!     → router.rs (middleware chain, then first-match scan)
//!     → matcher.rs (anchored template match, parameter extraction)
//!     → handler.rs (invoke the matched handler)
//!     → on miss: fallback handler or fixed 404
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable while serving
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (insertion order), unlike the component container
//!   which picks the longest prefix

pub mod handler;
pub mod matcher;
pub mod router;

pub use handler::{handler_fn, middleware_fn, Handler, Middleware};
pub use matcher::{PathParams, RouteTemplate, TemplateError};
pub use router::{not_found, Next, Registration, RouteMethod, Router};
