//! Admin API.
//!
//! Bearer-token protected JSON endpoints served by the main listener under
//! a configurable prefix:
//! - `GET {prefix}/status`
//! - `GET {prefix}/components`
//! - `GET {prefix}/upstream/routes`

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Router};

use crate::container::ComponentContainer;
use crate::upstream::UpstreamBridge;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub container: Arc<ComponentContainer>,
    pub bridge: Option<Arc<UpstreamBridge>>,
    pub api_key: Arc<str>,
    pub started_at: Instant,
}

impl AdminState {
    pub fn new(
        container: Arc<ComponentContainer>,
        bridge: Option<Arc<UpstreamBridge>>,
        api_key: &str,
    ) -> Self {
        Self {
            container,
            bridge,
            api_key: Arc::from(api_key),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState, path_prefix: &str) -> Router {
    let routes = Router::new()
        .route("/status", get(get_status))
        .route("/components", get(get_components))
        .route("/upstream/routes", get(get_upstream_routes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state);

    Router::new().nest(path_prefix.trim_end_matches('/'), routes)
}
