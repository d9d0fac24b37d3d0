//! Bridge to the upstream application server.
//!
//! # Responsibilities
//! - Establish upstream reachability at startup (bounded retries)
//! - Keep the upstream route table current
//! - Probe upstream health periodically
//! - Forward requests and relay responses
//!
//! # State Transitions
//! ```text
//! Created --start() ok--> Ready <--probe--> Unreachable
//!    |                      |                    |
//!    +------ stop() --------+------ stop() ------+--> Stopped
//! ```
//!
//! # Design Decisions
//! - Route table is an `ArcSwap` snapshot: readers never block the refresher
//! - Routes are refetched only on an Unreachable → Ready transition
//! - A failed refetch keeps the previous snapshot
//! - Forwarding is never retried; failures map to 502

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{Instrument, Span};

use super::client::{
    HyperUpstreamClient, TransportError, UpstreamClient, UpstreamRequest, UpstreamResponse,
};
use super::headers::{client_response_headers, outbound_request_headers};
use super::health;
use super::metadata::{parse_route_document, MetadataError};
use super::routes::{RouteSnapshot, UpstreamRouteEntry};
use crate::config::UpstreamConfig;
use crate::http::{Exchange, HandlerResult};
use crate::observability::metrics;

/// Lifecycle state of the bridge, stored in an `AtomicU8`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    Created = 0,
    Ready = 1,
    Unreachable = 2,
    Stopped = 3,
}

impl From<u8> for BridgeStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => BridgeStatus::Ready,
            2 => BridgeStatus::Unreachable,
            3 => BridgeStatus::Stopped,
            _ => BridgeStatus::Created,
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("upstream bridge already started")]
    AlreadyStarted,

    #[error("upstream bridge has been stopped")]
    Stopped,

    #[error("upstream {authority} unreachable after {attempts} attempt(s)")]
    Unreachable { authority: String, attempts: u32 },

    #[error("route metadata request returned {0}")]
    MetadataStatus(StatusCode),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Resolved bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// Normalized: empty, or `/segment...` without a trailing slash.
    pub context_path: String,
    pub health_path: String,
    pub metadata_path: String,
    pub timeout: Duration,
    pub startup_attempts: u32,
    pub retry_delay: Duration,
    pub check_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_settings(&UpstreamConfig::default())
    }
}

impl BridgeConfig {
    pub fn from_settings(settings: &UpstreamConfig) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            context_path: normalize_context_path(&settings.context_path),
            health_path: settings.health_path.clone(),
            metadata_path: settings.metadata_path.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            startup_attempts: settings.startup_retries.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            check_interval: Duration::from_secs(settings.check_interval_secs.max(1)),
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Path relative to the context path, or `None` if the path lies outside it.
    pub fn relative_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.context_path.is_empty() {
            return Some(path);
        }
        match path.strip_prefix(self.context_path.as_str()) {
            Some("") => Some("/"),
            Some(rest) if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }
}

fn normalize_context_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// State shared between the bridge handle and its health monitor task.
pub(crate) struct BridgeInner {
    pub(crate) config: BridgeConfig,
    client: Arc<dyn UpstreamClient>,
    status: AtomicU8,
    routes: ArcSwap<RouteSnapshot>,
    route_refreshes: AtomicU64,
    pub(crate) span: Span,
}

struct Monitor {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

pub struct UpstreamBridge {
    inner: Arc<BridgeInner>,
    monitor: Mutex<Option<Monitor>>,
}

impl UpstreamBridge {
    pub fn new(config: BridgeConfig, client: Arc<dyn UpstreamClient>) -> Self {
        let span = tracing::info_span!("upstream", authority = %config.authority());
        Self {
            inner: Arc::new(BridgeInner {
                config,
                client,
                status: AtomicU8::new(BridgeStatus::Created as u8),
                routes: ArcSwap::from_pointee(RouteSnapshot::empty()),
                route_refreshes: AtomicU64::new(0),
                span,
            }),
            monitor: Mutex::new(None),
        }
    }

    /// Bridge using the hyper-util client against `config.host:config.port`.
    pub fn connect(config: BridgeConfig) -> Self {
        let client = Arc::new(HyperUpstreamClient::new(config.authority()));
        Self::new(config, client)
    }

    /// Replace the logging context. Only effective before `start`.
    pub fn with_span(mut self, span: Span) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.span = span;
        }
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn status(&self) -> BridgeStatus {
        self.inner.status()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == BridgeStatus::Ready
    }

    /// Current route table snapshot.
    pub fn routes(&self) -> Arc<RouteSnapshot> {
        self.inner.routes.load_full()
    }

    /// Number of successful route table fetches so far.
    pub fn route_refreshes(&self) -> u64 {
        self.inner.route_refreshes.load(Ordering::Relaxed)
    }

    /// Probe the upstream up to `startup_attempts` times, fetch the route
    /// table and start the periodic health monitor.
    ///
    /// On failure the bridge stays in `Created` and `start` may be called
    /// again. A failed route fetch is logged; the bridge still becomes ready
    /// with an empty table.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let inner = &self.inner;
        let mut monitor = self.monitor.lock().await;
        if monitor.is_some() {
            return Err(BridgeError::AlreadyStarted);
        }

        async {
            let attempts = inner.config.startup_attempts;
            let mut healthy = false;
            for attempt in 1..=attempts {
                if inner.status() == BridgeStatus::Stopped {
                    return Err(BridgeError::Stopped);
                }
                if inner.probe().await {
                    healthy = true;
                    break;
                }
                if attempt < attempts {
                    tracing::warn!(
                        attempt,
                        attempts,
                        delay = ?inner.config.retry_delay,
                        "Upstream not reachable yet, retrying"
                    );
                    time::sleep(inner.config.retry_delay).await;
                }
            }

            if !healthy {
                tracing::error!(attempts, "Upstream unreachable, giving up");
                return Err(BridgeError::Unreachable {
                    authority: inner.config.authority(),
                    attempts,
                });
            }

            inner
                .status
                .compare_exchange(
                    BridgeStatus::Created as u8,
                    BridgeStatus::Ready as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .map_err(|_| BridgeError::Stopped)?;
            metrics::record_upstream_ready(true);

            if let Err(e) = inner.refresh_routes().await {
                tracing::warn!(error = %e, "Initial route table fetch failed, starting with an empty table");
            }
            Ok(())
        }
        .instrument(inner.span.clone())
        .await?;

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(
            health::run(Arc::clone(inner), shutdown_rx).instrument(inner.span.clone()),
        );
        *monitor = Some(Monitor { shutdown, task });

        tracing::info!(parent: &inner.span, "Upstream bridge started");
        Ok(())
    }

    /// Cancel the health monitor, clear the route table and refuse further
    /// forwarding. Idempotent.
    ///
    /// Once this returns no further health tick runs.
    pub async fn stop(&self) {
        let previous = BridgeStatus::from(
            self.inner
                .status
                .swap(BridgeStatus::Stopped as u8, Ordering::SeqCst),
        );

        let monitor = self.monitor.lock().await.take();
        if let Some(monitor) = monitor {
            let _ = monitor.shutdown.send(());
            monitor.task.abort();
            let _ = monitor.task.await;
        }
        self.inner.routes.store(Arc::new(RouteSnapshot::empty()));

        if previous != BridgeStatus::Stopped {
            metrics::record_upstream_ready(false);
            tracing::info!(parent: &self.inner.span, "Upstream bridge stopped");
        }
    }

    /// Run one health check now. This is the body of each monitor tick.
    pub async fn refresh_health(&self) -> BridgeStatus {
        self.inner
            .check_health()
            .instrument(self.inner.span.clone())
            .await
    }

    /// Most specific upstream route for the request, if any.
    pub fn find_upstream_route(&self, method: &str, path: &str) -> Option<UpstreamRouteEntry> {
        let relative = self.inner.config.relative_path(path)?;
        self.inner.routes.load().find(method, relative).cloned()
    }

    pub fn matches_upstream_route(&self, method: &str, path: &str) -> bool {
        self.find_upstream_route(method, path).is_some()
    }

    /// Forward a buffered request. Never fails: errors become local
    /// 502/503 responses.
    pub async fn forward(&self, mut request: UpstreamRequest) -> UpstreamResponse {
        let inner = &self.inner;
        if inner.status() != BridgeStatus::Ready {
            metrics::record_upstream_forward("unavailable");
            return UpstreamResponse::local(
                StatusCode::SERVICE_UNAVAILABLE,
                "Service Unavailable",
                "Upstream server is not available",
            );
        }

        request.headers = outbound_request_headers(&request.headers);
        let method = request.method.clone();
        let target = request.path_and_query.clone();

        let result = inner
            .client
            .send(request, inner.config.timeout)
            .instrument(inner.span.clone())
            .await;

        match result {
            Ok(mut response) => {
                response.headers = client_response_headers(&response.headers);
                metrics::record_upstream_forward("ok");
                tracing::debug!(
                    parent: &inner.span,
                    method = %method,
                    target = %target,
                    status = %response.status,
                    "Forwarded to upstream"
                );
                response
            }
            Err(e) => {
                let outcome = match &e {
                    TransportError::Timeout(_) => "timeout",
                    _ => "error",
                };
                metrics::record_upstream_forward(outcome);
                tracing::warn!(
                    parent: &inner.span,
                    method = %method,
                    target = %target,
                    error = %e,
                    "Upstream forward failed"
                );
                UpstreamResponse::local(
                    StatusCode::BAD_GATEWAY,
                    "Bad Gateway",
                    "Upstream request failed",
                )
            }
        }
    }

    /// Forward the exchange's request (original method, path, query,
    /// headers and body) and write the upstream answer onto its response.
    ///
    /// Client headers named in `strip` are dropped, then `extra` headers are
    /// added on top.
    pub async fn forward_exchange(
        &self,
        ex: &mut Exchange,
        extra: HeaderMap,
        strip: &[&str],
    ) -> HandlerResult {
        let body = ex.request.body().await?;
        let mut headers = ex.request.headers().clone();
        for name in strip {
            headers.remove(*name);
        }
        for (name, value) in extra.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let request = UpstreamRequest {
            method: ex.request.method().clone(),
            path_and_query: ex.request.path_and_query().to_string(),
            headers,
            body,
        };
        let response = self.forward(request).await;
        response.write_to(&mut ex.response)
    }
}

impl BridgeInner {
    fn status(&self) -> BridgeStatus {
        BridgeStatus::from(self.status.load(Ordering::SeqCst))
    }

    async fn probe(&self) -> bool {
        let request = UpstreamRequest::get(&self.config.health_path);
        match self.client.send(request, self.config.timeout).await {
            Ok(response) if response.status.is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status, "Health check failed: non-success status");
                false
            }
            Err(TransportError::Timeout(_)) => {
                tracing::warn!("Health check failed: timeout");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Health check failed: connection error");
                false
            }
        }
    }

    /// One monitor tick. Only acts while Ready or Unreachable.
    pub(crate) async fn check_health(&self) -> BridgeStatus {
        let current = self.status();
        if !matches!(current, BridgeStatus::Ready | BridgeStatus::Unreachable) {
            return current;
        }

        let healthy = self.probe().await;
        let next = if healthy {
            BridgeStatus::Ready
        } else {
            BridgeStatus::Unreachable
        };

        let swapped = self
            .status
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                match BridgeStatus::from(v) {
                    BridgeStatus::Ready | BridgeStatus::Unreachable => Some(next as u8),
                    _ => None,
                }
            });
        let previous = match swapped {
            Ok(previous) => BridgeStatus::from(previous),
            Err(current) => return BridgeStatus::from(current),
        };
        metrics::record_upstream_ready(healthy);

        match (previous, next) {
            (BridgeStatus::Unreachable, BridgeStatus::Ready) => {
                tracing::info!("Upstream recovered, refreshing route table");
                if let Err(e) = self.refresh_routes().await {
                    tracing::warn!(error = %e, "Route table refresh failed, keeping previous table");
                }
            }
            (BridgeStatus::Ready, BridgeStatus::Unreachable) => {
                tracing::warn!("Upstream became unreachable");
            }
            _ => {}
        }
        next
    }

    async fn refresh_routes(&self) -> Result<usize, BridgeError> {
        let request = UpstreamRequest::get(&self.config.metadata_path);
        let response = self.client.send(request, self.config.timeout).await?;
        if !response.status.is_success() {
            return Err(BridgeError::MetadataStatus(response.status));
        }

        let entries = parse_route_document(&response.body)?;
        let count = entries.len();
        self.routes.store(Arc::new(RouteSnapshot::new(entries)));
        self.route_refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(routes = count, "Upstream route table loaded");
        Ok(count)
    }
}
