//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store registrations in insertion order
//! - Run the middleware chain, then dispatch to the first matching route
//! - Emit the fixed not-found response on a route miss
//! - Recover handler faults into a generic 500
//!
//! # Design Decisions
//! - First registered wins; duplicates are allowed and simply shadowed
//! - O(n) scan in insertion order (acceptable for typical route counts)
//! - Mutation only through `&mut self`, i.e. before the router is shared

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::json;
use tracing::{Instrument, Span};

use crate::http::{Exchange, HandlerError, HandlerResult};
use crate::routing::handler::{Handler, Middleware};
use crate::routing::matcher::{PathParams, RouteTemplate, TemplateError};

/// Method condition of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMethod {
    Exact(Method),
    /// Matches every request method.
    Any,
}

impl RouteMethod {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            RouteMethod::Exact(m) => m == method,
            RouteMethod::Any => true,
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        RouteMethod::Exact(method)
    }
}

/// A (method, template, handler) tuple owned by its router.
pub struct Registration {
    method: RouteMethod,
    template: RouteTemplate,
    handler: Arc<dyn Handler>,
}

impl Registration {
    pub fn method(&self) -> &RouteMethod {
        &self.method
    }

    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("method", &self.method)
            .field("template", &self.template.as_str())
            .finish()
    }
}

/// Path-pattern router with an ordered middleware chain.
pub struct Router {
    registrations: Vec<Registration>,
    middleware: Vec<Arc<dyn Middleware>>,
    fallback: Option<Arc<dyn Handler>>,
    span: Span,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            middleware: Vec::new(),
            fallback: None,
            span: tracing::info_span!("router"),
        }
    }

    /// Replace the span all router events are emitted in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Append a registration. Only template compilation is validated.
    pub fn register(
        &mut self,
        method: impl Into<RouteMethod>,
        template: &str,
        handler: impl Handler + 'static,
    ) -> Result<&mut Self, TemplateError> {
        self.register_arc(method, template, Arc::new(handler))
    }

    pub fn register_arc(
        &mut self,
        method: impl Into<RouteMethod>,
        template: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, TemplateError> {
        let template = RouteTemplate::compile(template)?;
        let method = method.into();
        tracing::debug!(parent: &self.span, method = ?method, template = %template, "Route registered");
        self.registrations.push(Registration {
            method,
            template,
            handler,
        });
        Ok(self)
    }

    pub fn get(&mut self, template: &str, handler: impl Handler + 'static) -> Result<&mut Self, TemplateError> {
        self.register(Method::GET, template, handler)
    }

    pub fn post(&mut self, template: &str, handler: impl Handler + 'static) -> Result<&mut Self, TemplateError> {
        self.register(Method::POST, template, handler)
    }

    pub fn put(&mut self, template: &str, handler: impl Handler + 'static) -> Result<&mut Self, TemplateError> {
        self.register(Method::PUT, template, handler)
    }

    pub fn delete(&mut self, template: &str, handler: impl Handler + 'static) -> Result<&mut Self, TemplateError> {
        self.register(Method::DELETE, template, handler)
    }

    pub fn patch(&mut self, template: &str, handler: impl Handler + 'static) -> Result<&mut Self, TemplateError> {
        self.register(Method::PATCH, template, handler)
    }

    pub fn any(&mut self, template: &str, handler: impl Handler + 'static) -> Result<&mut Self, TemplateError> {
        self.register(RouteMethod::Any, template, handler)
    }

    /// Append a middleware to the chain. There is no removal.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Handler invoked instead of the fixed not-found response on a miss.
    pub fn set_fallback(&mut self, handler: Arc<dyn Handler>) -> &mut Self {
        self.fallback = Some(handler);
        self
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// First registration matching method and path, in insertion order.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&Registration, PathParams)> {
        self.registrations
            .iter()
            .filter(|r| r.method.matches(method))
            .find_map(|r| r.template.matches(path).map(|params| (r, params)))
    }

    /// Run middleware and route the exchange. Never fails: handler faults
    /// are logged and turned into a 500 when the response is still open.
    pub async fn dispatch(&self, ex: &mut Exchange) {
        let next = Next {
            chain: &self.middleware,
            router: self,
        };
        let outcome = AssertUnwindSafe(next.run(ex))
            .catch_unwind()
            .instrument(self.span.clone())
            .await;

        let result = outcome.unwrap_or_else(|panic| Err(HandlerError::from_panic(panic)));
        if let Err(err) = result {
            self.recover(ex, err);
        }
    }

    async fn route(&self, ex: &mut Exchange) -> HandlerResult {
        let found = self
            .find(ex.request.method(), ex.request.path())
            .map(|(registration, params)| (registration.handler.clone(), params));

        match found {
            Some((handler, params)) => {
                ex.params = params;
                handler.call(ex).await
            }
            None => match &self.fallback {
                Some(fallback) => fallback.call(ex).await,
                None => not_found(ex),
            },
        }
    }

    fn recover(&self, ex: &mut Exchange, err: HandlerError) {
        let _guard = self.span.enter();
        let method = ex.request.method().clone();
        let path = ex.request.path().to_string();

        if ex.response.headers_sent() {
            tracing::error!(method = %method, path = %path, error = %err, "Handler failed after response was committed");
            return;
        }

        let status = err.status();
        if status.is_client_error() {
            tracing::warn!(method = %method, path = %path, error = %err, "Rejected request");
        } else {
            tracing::error!(method = %method, path = %path, error = %err, "Handler failed");
        }
        let written = ex.response.reset().and_then(|_| {
            ex.response.reply_json(
                status,
                &json!({ "error": status.canonical_reason().unwrap_or("Error") }),
            )
        });
        if let Err(e) = written {
            tracing::error!(error = %e, "Failed to write error response");
        }
    }
}

/// Continuation handed to each middleware.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    router: &'a Router,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain and then route the exchange.
    pub fn run<'b>(self, ex: &'b mut Exchange) -> BoxFuture<'b, HandlerResult>
    where
        'a: 'b,
    {
        Box::pin(async move {
            match self.chain.split_first() {
                Some((first, rest)) => {
                    let next = Next {
                        chain: rest,
                        router: self.router,
                    };
                    first.handle(ex, next).await
                }
                None => self.router.route(ex).await,
            }
        })
    }
}

/// Write the fixed route-miss response: 404 naming the method and the raw path.
pub fn not_found(ex: &mut Exchange) -> HandlerResult {
    let method = ex.request.method().as_str().to_string();
    let path = ex.request.path().to_string();
    ex.response.reply_json(
        StatusCode::NOT_FOUND,
        &json!({
            "error": "Not Found",
            "message": format!("Cannot {} {}", method, path),
            "method": method,
            "path": path,
        }),
    )?;
    Ok(())
}
