//! Request pipeline composition.
//!
//! # Data Flow
//! ```text
//! Request
//!     → ComponentContainer (longest prefix, if running)
//!     → Router (middleware, first-match routes, designated proxy routes)
//!     → on route miss: UpstreamFallback
//!         → upstream owns the path? forward : fixed 404
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::json;
use tracing::Span;

use crate::container::ComponentContainer;
use crate::http::{Exchange, HandlerResult, Request};
use crate::observability::metrics;
use crate::routing::{not_found, Handler, RouteMethod, Router, TemplateError};
use crate::session::{SessionAccessor, CORRELATION_HEADERS};
use crate::upstream::UpstreamBridge;

/// Entry point for every request the server accepts.
pub struct FrontController {
    container: Arc<ComponentContainer>,
    router: Arc<Router>,
    span: Span,
}

impl FrontController {
    pub fn new(container: Arc<ComponentContainer>, router: Arc<Router>) -> Self {
        Self {
            container,
            router,
            span: tracing::info_span!("front"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn container(&self) -> &Arc<ComponentContainer> {
        &self.container
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Run the exchange through container then router and produce the
    /// response. Every request gets a response.
    pub async fn handle(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().to_string();
        let mut ex = Exchange::new(request);

        let stage = match self.container.dispatch(&mut ex).await {
            Ok(true) => "component",
            Ok(false) => {
                self.router.dispatch(&mut ex).await;
                "router"
            }
            Err(e) => {
                tracing::error!(parent: &self.span, error = %e, path = %ex.request.path(), "Component dispatch failed");
                if !ex.response.headers_sent() {
                    let written = ex.response.reset().and_then(|_| {
                        ex.response.reply_json(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            &json!({ "error": "Internal Server Error" }),
                        )
                    });
                    if let Err(e) = written {
                        tracing::error!(parent: &self.span, error = %e, "Failed to write error response");
                    }
                }
                "error"
            }
        };

        metrics::record_request(&method, ex.response.status_code().as_u16(), stage, start);
        ex.response.into_response()
    }
}

/// Forward an exchange with session correlation headers. No session is
/// created while the bridge would answer 503 anyway.
async fn proxy(
    bridge: &UpstreamBridge,
    sessions: &dyn SessionAccessor,
    ex: &mut Exchange,
) -> HandlerResult {
    let extra = if bridge.is_ready() {
        sessions
            .session(&ex.request, &mut ex.response)
            .await
            .map(|session| session.correlation_headers())
            .unwrap_or_else(HeaderMap::new)
    } else {
        HeaderMap::new()
    };
    bridge.forward_exchange(ex, extra, CORRELATION_HEADERS).await
}

/// Router fallback: forwards when the upstream owns the path, otherwise
/// answers with the fixed not-found response.
pub struct UpstreamFallback {
    bridge: Arc<UpstreamBridge>,
    sessions: Arc<dyn SessionAccessor>,
}

impl UpstreamFallback {
    pub fn new(bridge: Arc<UpstreamBridge>, sessions: Arc<dyn SessionAccessor>) -> Self {
        Self { bridge, sessions }
    }
}

#[async_trait]
impl Handler for UpstreamFallback {
    async fn call(&self, ex: &mut Exchange) -> HandlerResult {
        let owned = self
            .bridge
            .matches_upstream_route(ex.request.method().as_str(), ex.request.path());
        if owned {
            proxy(&self.bridge, self.sessions.as_ref(), ex).await
        } else {
            not_found(ex)
        }
    }
}

/// Handler for routes designated as always proxied.
pub struct ProxyHandler {
    bridge: Arc<UpstreamBridge>,
    sessions: Arc<dyn SessionAccessor>,
}

impl ProxyHandler {
    pub fn new(bridge: Arc<UpstreamBridge>, sessions: Arc<dyn SessionAccessor>) -> Self {
        Self { bridge, sessions }
    }
}

#[async_trait]
impl Handler for ProxyHandler {
    async fn call(&self, ex: &mut Exchange) -> HandlerResult {
        proxy(&self.bridge, self.sessions.as_ref(), ex).await
    }
}

/// Register the designated proxy routes (any method) and install the
/// upstream fallback on `router`.
pub fn install_upstream(
    router: &mut Router,
    bridge: Arc<UpstreamBridge>,
    sessions: Arc<dyn SessionAccessor>,
    proxy_routes: &[String],
) -> Result<(), TemplateError> {
    for template in proxy_routes {
        router.register(
            RouteMethod::Any,
            template,
            ProxyHandler::new(bridge.clone(), sessions.clone()),
        )?;
    }
    router.set_fallback(Arc::new(UpstreamFallback::new(bridge, sessions)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Component, InitParams};
    use crate::http::BoxError;
    use crate::routing::handler_fn;
    use crate::session::{MemorySessions, NoSessions};
    use crate::upstream::{BridgeConfig, TransportError, UpstreamClient, UpstreamRequest, UpstreamResponse};
    use axum::body::Bytes;
    use axum::http::Method;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct Greeter;

    #[async_trait]
    impl Component for Greeter {
        fn name(&self) -> &str {
            "greeter"
        }

        async fn get(&self, ex: &mut Exchange) -> HandlerResult {
            ex.response.send_text("component")?;
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Component for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn init(&self, _: &crate::container::ComponentContext) -> Result<(), BoxError> {
            Err("no database".into())
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: StdMutex<Vec<UpstreamRequest>>,
    }

    #[async_trait]
    impl UpstreamClient for Recorder {
        async fn send(
            &self,
            request: UpstreamRequest,
            _timeout: Duration,
        ) -> Result<UpstreamResponse, TransportError> {
            let body = match request.path_and_query.as_str() {
                "/actuator/mappings" => r#"[{"method":"GET","path":"/hello"}]"#.to_string(),
                other => format!("upstream {}", other),
            };
            self.seen.lock().unwrap().push(request);
            Ok(UpstreamResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Bytes::from(body),
            })
        }
    }

    fn bridge_config() -> BridgeConfig {
        BridgeConfig {
            host: "127.0.0.1".into(),
            port: 8081,
            context_path: String::new(),
            health_path: "/actuator/health".into(),
            metadata_path: "/actuator/mappings".into(),
            timeout: Duration::from_secs(1),
            startup_attempts: 1,
            retry_delay: Duration::from_millis(1),
            check_interval: Duration::from_secs(3600),
        }
    }

    async fn front(upstream: Arc<Recorder>) -> (FrontController, Arc<UpstreamBridge>) {
        let container = Arc::new(ComponentContainer::new());
        container
            .register("/greet", Arc::new(Greeter), InitParams::new(), Some(1))
            .await
            .unwrap();
        container.start().await.unwrap();

        let bridge = Arc::new(UpstreamBridge::new(bridge_config(), upstream));
        bridge.start().await.unwrap();

        let mut router = Router::new();
        router
            .get(
                "/local",
                handler_fn(|ex| {
                    Box::pin(async move {
                        ex.response.send_text("router")?;
                        Ok(())
                    })
                }),
            )
            .unwrap();
        install_upstream(
            &mut router,
            bridge.clone(),
            Arc::new(NoSessions),
            &["/legacy/:page".to_string()],
        )
        .unwrap();

        (FrontController::new(container, Arc::new(router)), bridge)
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_pipeline_order() {
        let upstream = Arc::new(Recorder::default());
        let (front, bridge) = front(upstream.clone()).await;

        let response = front.handle(Request::empty(Method::GET, "/greet/x")).await;
        assert_eq!(body_of(response).await, "component");

        let response = front.handle(Request::empty(Method::GET, "/local")).await;
        assert_eq!(body_of(response).await, "router");

        let response = front
            .handle(Request::empty(Method::GET, "/hello?name=Rust"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "upstream /hello?name=Rust");

        let response = front
            .handle(Request::empty(Method::DELETE, "/legacy/page1"))
            .await;
        assert_eq!(body_of(response).await, "upstream /legacy/page1");

        let response = front.handle(Request::empty(Method::GET, "/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body_of(response).await).unwrap();
        assert_eq!(body["message"], "Cannot GET /missing");

        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_client_correlation_headers_are_stripped() {
        let upstream = Arc::new(Recorder::default());
        let (front, bridge) = front(upstream.clone()).await;

        let request = Request::empty(Method::GET, "/hello").with_header("X-User-Id", "admin");
        front.handle(request).await;

        let seen = upstream.seen.lock().unwrap();
        let forwarded = seen.last().unwrap();
        assert_eq!(forwarded.path_and_query, "/hello");
        assert!(forwarded.headers.get("x-user-id").is_none());
        drop(seen);
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_unready_bridge_creates_no_session() {
        let upstream = Arc::new(Recorder::default());
        let bridge = Arc::new(UpstreamBridge::new(bridge_config(), upstream.clone()));
        let sessions = Arc::new(MemorySessions::new("S"));
        let mut router = Router::new();
        router
            .register(
                RouteMethod::Any,
                "/legacy/:page",
                ProxyHandler::new(bridge.clone(), sessions.clone()),
            )
            .unwrap();
        let front = FrontController::new(Arc::new(ComponentContainer::new()), Arc::new(router));

        let response = front
            .handle(Request::empty(Method::GET, "/legacy/page1"))
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get("set-cookie").is_none());
        assert!(sessions.is_empty());
        assert!(upstream.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stopped_container_falls_through_to_router() {
        let upstream = Arc::new(Recorder::default());
        let (front, bridge) = front(upstream).await;
        front.container().stop().await;

        let response = front.handle(Request::empty(Method::GET, "/greet/x")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        bridge.stop().await;
    }

    #[tokio::test]
    async fn test_lazy_init_failure_answers_500() {
        let container = Arc::new(ComponentContainer::new());
        container
            .register("/broken", Arc::new(Failing), InitParams::new(), None)
            .await
            .unwrap();
        container.start().await.unwrap();
        let front = FrontController::new(container, Arc::new(Router::new()));

        let response = front.handle(Request::empty(Method::GET, "/broken")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
