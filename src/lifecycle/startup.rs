//! Startup orchestration.
//!
//! # Responsibilities
//! - Assemble container, router, upstream bridge and session store from config
//! - Start subsystems in dependency order
//! - Serve until shutdown, then stop subsystems in reverse order
//!
//! # Design Decisions
//! - Upstream failure is not fatal: the server runs without the upstream
//!   fallback and unmatched requests get the fixed 404
//! - Container failure is fatal

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::app::{install_upstream, FrontController};
use crate::config::AppConfig;
use crate::container::{ComponentContainer, ContainerError};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::routing::{Router, TemplateError};
use crate::session::{run_sweeper, MemorySessions, NoSessions, SessionAccessor};
use crate::upstream::{BridgeConfig, UpstreamBridge};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("component container failed to start: {0}")]
    Container(#[from] ContainerError),

    #[error("invalid proxy route: {0}")]
    Route(#[from] TemplateError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully wired server, ready to `run`.
pub struct Application {
    config: AppConfig,
    container: Arc<ComponentContainer>,
    router: Router,
    bridge: Option<Arc<UpstreamBridge>>,
    sessions: Arc<dyn SessionAccessor>,
    shutdown: Arc<Shutdown>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let bridge = config.upstream.enabled.then(|| {
            Arc::new(UpstreamBridge::connect(BridgeConfig::from_settings(
                &config.upstream,
            )))
        });
        let sessions: Arc<dyn SessionAccessor> = if config.session.enabled {
            Arc::new(MemorySessions::from_config(&config.session))
        } else {
            Arc::new(NoSessions)
        };

        Self {
            config,
            container: Arc::new(ComponentContainer::new()),
            router: Router::new(),
            bridge,
            sessions,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Replace the upstream bridge (`None` disables upstream integration).
    pub fn with_bridge(mut self, bridge: Option<Arc<UpstreamBridge>>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionAccessor>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register components here before `run`.
    pub fn container(&self) -> &Arc<ComponentContainer> {
        &self.container
    }

    /// Register routes and middleware here before `run`.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn bridge(&self) -> Option<&Arc<UpstreamBridge>> {
        self.bridge.as_ref()
    }

    pub fn shutdown(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// Start everything, serve on `listener` until shutdown is triggered,
    /// then stop the bridge and the container.
    pub async fn run(self, listener: TcpListener) -> Result<(), StartupError> {
        let shutdown_rx = self.shutdown.subscribe();
        let mut router = self.router;

        let mut upstream_ready = false;
        if let Some(bridge) = &self.bridge {
            match bridge.start().await {
                Ok(()) => upstream_ready = true,
                Err(e) => tracing::warn!(
                    error = %e,
                    "Upstream bridge failed to start, running without upstream integration"
                ),
            }
        }
        if let (true, Some(bridge)) = (upstream_ready, &self.bridge) {
            if let Err(e) = install_upstream(
                &mut router,
                bridge.clone(),
                self.sessions.clone(),
                &self.config.upstream.proxy_routes,
            ) {
                bridge.stop().await;
                return Err(e.into());
            }
        }

        if let Err(e) = self.container.start().await {
            if let Some(bridge) = &self.bridge {
                bridge.stop().await;
            }
            return Err(e.into());
        }

        let front = Arc::new(FrontController::new(
            self.container.clone(),
            Arc::new(router),
        ));
        let mut server = HttpServer::new(front, self.config.listener.clone());
        if self.config.admin.enabled {
            let state = AdminState::new(
                self.container.clone(),
                self.bridge.clone(),
                &self.config.admin.api_key,
            );
            server = server.with_admin(setup_admin_router(state, &self.config.admin.path_prefix));
        }

        let sweeper = self.config.session.enabled.then(|| {
            tokio::spawn(run_sweeper(
                self.sessions.clone(),
                Duration::from_secs(self.config.session.sweep_interval_secs.max(1)),
                self.shutdown.subscribe(),
            ))
        });

        let served = server.run(listener, shutdown_rx).await;
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        tracing::info!("Stopping subsystems");
        if let Some(bridge) = &self.bridge {
            bridge.stop().await;
        }
        self.container.stop().await;
        tracing::info!("Shutdown complete");

        served.map_err(StartupError::from)
    }
}
