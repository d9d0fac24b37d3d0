//! Component abstraction.
//!
//! # Responsibilities
//! - Define the lifecycle hooks of a long-lived handler (init, destroy)
//! - Provide one request entry point with per-verb defaults
//!
//! # Lifecycle
//! ```text
//! registered --init()--> initialized --destroy()--> destroyed
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde::Serialize;
use serde_json::json;
use tracing::Span;

use crate::http::{BoxError, Exchange, HandlerResult};

/// Init parameters handed to a component at registration.
pub type InitParams = BTreeMap<String, String>;

/// Lifecycle state of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Registered,
    Initialized,
    Destroyed,
}

/// What a component learns about itself when initialized.
#[derive(Debug, Clone)]
pub struct ComponentContext {
    pub name: String,
    pub prefix: String,
    pub params: InitParams,
    /// Logging context for everything the component emits.
    pub span: Span,
}

impl ComponentContext {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// A lifecycle-managed request handler mapped to a URL prefix.
///
/// Implementors usually override a verb method (`get`, `post`, ...);
/// the default `service` dispatches on the request method and every verb
/// answers 405 unless overridden.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;

    async fn init(&self, _ctx: &ComponentContext) -> Result<(), BoxError> {
        Ok(())
    }

    async fn service(&self, ex: &mut Exchange) -> HandlerResult {
        match *ex.request.method() {
            Method::GET | Method::HEAD => self.get(ex).await,
            Method::POST => self.post(ex).await,
            Method::PUT => self.put(ex).await,
            Method::DELETE => self.delete(ex).await,
            Method::PATCH => self.patch(ex).await,
            _ => method_not_allowed(ex),
        }
    }

    async fn get(&self, ex: &mut Exchange) -> HandlerResult {
        method_not_allowed(ex)
    }

    async fn post(&self, ex: &mut Exchange) -> HandlerResult {
        method_not_allowed(ex)
    }

    async fn put(&self, ex: &mut Exchange) -> HandlerResult {
        method_not_allowed(ex)
    }

    async fn delete(&self, ex: &mut Exchange) -> HandlerResult {
        method_not_allowed(ex)
    }

    async fn patch(&self, ex: &mut Exchange) -> HandlerResult {
        method_not_allowed(ex)
    }

    async fn destroy(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

fn method_not_allowed(ex: &mut Exchange) -> HandlerResult {
    let method = ex.request.method().to_string();
    ex.response.reply_json(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({
            "error": "Method Not Allowed",
            "message": format!("{} is not supported by this component", method),
        }),
    )?;
    Ok(())
}
