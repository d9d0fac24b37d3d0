//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: admin routes, then one fallback endpoint
//! - Wire up middleware (tracing, timeout, request ID)
//! - Hand every other request to the front controller
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request as HttpRequest, StatusCode},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::FrontController;
use crate::config::ListenerConfig;
use crate::http::Request;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct ServerState {
    front: Arc<FrontController>,
    body_limit: usize,
}

/// HTTP server feeding the front controller.
pub struct HttpServer {
    front: Arc<FrontController>,
    config: ListenerConfig,
    admin: Option<Router>,
}

impl HttpServer {
    pub fn new(front: Arc<FrontController>, config: ListenerConfig) -> Self {
        Self {
            front,
            config,
            admin: None,
        }
    }

    /// Serve `admin` routes ahead of the front controller.
    pub fn with_admin(mut self, admin: Router) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Build the Axum router with all middleware layers.
    pub fn into_router(self) -> Router {
        let state = ServerState {
            front: self.front,
            body_limit: self.config.max_body_bytes,
        };
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        let mut router = Router::new().fallback(front_handler).with_state(state);
        if let Some(admin) = self.admin {
            router = router.merge(admin);
        }
        router
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_secs(self.config.request_timeout_secs),
            ))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.into_router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal, no longer accepting");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Span of one inbound request. The request id is already set by the outer
/// `SetRequestIdLayer`.
fn request_span(request: &HttpRequest<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

async fn front_handler(State(state): State<ServerState>, request: HttpRequest<Body>) -> Response {
    let request = Request::from_http(request, state.body_limit);
    state.front.handle(request).await
}
