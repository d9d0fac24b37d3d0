//! Handler and middleware capabilities.

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::http::{Exchange, HandlerResult};

/// A request handler with a single entry point.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ex: &mut Exchange) -> HandlerResult;
}

/// Handler backed by a closure returning a boxed future.
pub struct HandlerFn<F> {
    f: F,
}

/// Adapt a closure into a [`Handler`].
///
/// ```ignore
/// router.get("/hello/:name", handler_fn(|ex| Box::pin(async move {
///     let name = ex.param("name").unwrap_or("world").to_string();
///     ex.response.send_text(format!("Hello {}!", name))?;
///     Ok(())
/// })));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, HandlerResult> + Send + Sync,
{
    HandlerFn { f }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Exchange) -> BoxFuture<'a, HandlerResult> + Send + Sync,
{
    async fn call(&self, ex: &mut Exchange) -> HandlerResult {
        (self.f)(ex).await
    }
}

/// Cross-cutting request processing that wraps route dispatch.
///
/// A middleware that returns without running `next` short-circuits the
/// chain. `Next::run` consumes the continuation, so it can run at most once.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ex: &mut Exchange, next: crate::routing::Next<'_>) -> HandlerResult;
}

/// Middleware backed by a closure.
pub struct MiddlewareFn<F> {
    f: F,
}

pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: for<'a> Fn(&'a mut Exchange, crate::routing::Next<'a>) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync,
{
    MiddlewareFn { f }
}

#[async_trait]
impl<F> Middleware for MiddlewareFn<F>
where
    F: for<'a> Fn(&'a mut Exchange, crate::routing::Next<'a>) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync,
{
    async fn handle(&self, ex: &mut Exchange, next: crate::routing::Next<'_>) -> HandlerResult {
        (self.f)(ex, next).await
    }
}
