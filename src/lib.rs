//! Web front server library.
//!
//! Serves requests through three tiers: lifecycle-managed components
//! mounted on URL prefixes, a first-match route table with middleware,
//! and an upstream application server whose route table is discovered at
//! runtime.

pub mod admin;
pub mod app;
pub mod config;
pub mod container;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod session;
pub mod upstream;

pub use app::FrontController;
pub use config::AppConfig;
pub use container::{Component, ComponentContainer};
pub use http::{Exchange, HttpServer};
pub use lifecycle::{Application, Shutdown};
pub use routing::Router;
pub use upstream::UpstreamBridge;
