//! Error types raised while handling a single exchange.

use axum::http::StatusCode;
use thiserror::Error;

/// Boxed error accepted from arbitrary handler code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by handlers, middleware and components.
pub type HandlerResult = Result<(), HandlerError>;

/// Misuse of the response writer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("response already finished")]
    AlreadyFinished,

    #[error("headers already sent, cannot modify status or headers")]
    HeadersSent,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("failed to serialize JSON body: {0}")]
    Json(String),
}

/// Failure reading the request body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BodyError {
    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("request body no longer available")]
    Unavailable,
}

/// An error escaping a handler, middleware or component.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("handler panicked: {0}")]
    Panic(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl HandlerError {
    pub fn msg(message: impl std::fmt::Display) -> Self {
        HandlerError::Message(message.to_string())
    }

    /// Convert a caught panic payload into an error.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        HandlerError::Panic(message)
    }

    /// Status of the error response written for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Body(BodyError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
