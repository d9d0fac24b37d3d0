//! Component container subsystem.
//!
//! # Data Flow
//! ```text
//! register(prefix, component, params, priority?)
//!     → registered
//!     → start(): eager components init in ascending priority
//!
//! Incoming Exchange
//!     → registry.rs (longest matching prefix)
//!     → lazy init on first request if still registered
//!     → component.rs (service → per-verb method)
//!     → no prefix match: not handled, caller falls through to the router
//!
//! stop() / unregister(prefix)
//!     → destroy (best-effort on stop)
//! ```
//!
//! # Design Decisions
//! - Longest prefix wins, unlike the router's first-match rule
//! - Prefixes match on segment boundaries (`/a` never claims `/ab`)
//! - Components share nothing with the router; they are tested separately

pub mod component;
pub mod registry;
pub mod error;

pub use component::{Component, ComponentContext, ComponentState, InitParams};
pub use registry::{ComponentContainer, ComponentInfo};
pub use error::ContainerError;
