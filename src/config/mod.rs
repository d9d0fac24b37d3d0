//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), or nothing
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks, all problems at once)
//!     → AppConfig (validated, immutable)
//!     → handed to the bridge, server, admin API and session store
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, AppConfig, ListenerConfig, ObservabilityConfig, SessionConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
