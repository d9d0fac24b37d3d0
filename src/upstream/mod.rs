//! Upstream application server integration.
//!
//! # Data Flow
//! ```text
//! start():  health probe (bounded retries) → metadata fetch → routes.rs snapshot
//!           → health.rs monitor (periodic probe, refetch on recovery)
//!
//! Request:  find_upstream_route (routes.rs, relative to context path)
//!           → forward: headers.rs (strip hop-by-hop) → client.rs
//!           → headers.rs (response deny-list) → client response
//! ```

pub mod bridge;
pub mod client;
pub mod headers;
mod health;
pub mod metadata;
pub mod routes;

pub use bridge::{BridgeConfig, BridgeError, BridgeStatus, UpstreamBridge};
pub use client::{
    HyperUpstreamClient, TransportError, UpstreamClient, UpstreamRequest, UpstreamResponse,
};
pub use metadata::{parse_route_document, MetadataError};
pub use routes::{RouteSnapshot, UpstreamRouteEntry, ANY_METHOD};
