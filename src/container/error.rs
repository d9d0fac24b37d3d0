//! Container error types.

use thiserror::Error;

use crate::http::BoxError;

/// Registration conflicts and lifecycle faults.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("component container is already running")]
    AlreadyRunning,

    #[error("URL prefix '{0}' is already mapped")]
    PrefixTaken(String),

    #[error("component name '{0}' is already registered")]
    NameTaken(String),

    #[error("invalid URL prefix '{0}'")]
    InvalidPrefix(String),

    #[error("no component mapped at '{0}'")]
    UnknownPrefix(String),

    #[error("component '{name}' failed to initialize: {source}")]
    InitFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("component '{name}' failed to destroy: {source}")]
    DestroyFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("component '{0}' has been destroyed")]
    Destroyed(String),
}
