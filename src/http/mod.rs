//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace layers)
//!     → request.rs (raw path, headers, query, deferred body)
//!     → [front controller: container → router → upstream bridge]
//!     → response.rs (buffered status/headers/body)
//!     → Send to client
//! ```

pub mod error;
pub mod exchange;
pub mod request;
pub mod response;
pub mod server;

pub use error::{BodyError, BoxError, HandlerError, HandlerResult, ResponseError};
pub use exchange::Exchange;
pub use request::Request;
pub use response::ResponseWriter;
pub use server::HttpServer;
