use axum::{extract::State, Json};
use serde::Serialize;

use super::AdminState;
use crate::container::ComponentInfo;
use crate::upstream::{BridgeStatus, UpstreamRouteEntry};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub uptime_secs: u64,
    pub container_running: bool,
    /// `None` when running without upstream integration.
    pub upstream: Option<BridgeStatus>,
}

#[derive(Serialize)]
pub struct UpstreamRoutes {
    pub status: Option<BridgeStatus>,
    /// Unix millis of the last successful fetch.
    pub fetched_at_ms: Option<u64>,
    pub refreshes: u64,
    pub routes: Vec<UpstreamRouteEntry>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        container_running: state.container.is_running(),
        upstream: state.bridge.as_ref().map(|b| b.status()),
    })
}

pub async fn get_components(State(state): State<AdminState>) -> Json<Vec<ComponentInfo>> {
    Json(state.container.components().await)
}

pub async fn get_upstream_routes(State(state): State<AdminState>) -> Json<UpstreamRoutes> {
    let Some(bridge) = state.bridge.as_ref() else {
        return Json(UpstreamRoutes {
            status: None,
            fetched_at_ms: None,
            refreshes: 0,
            routes: Vec::new(),
        });
    };

    let snapshot = bridge.routes();
    let fetched_at_ms = snapshot
        .fetched_at()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64);

    Json(UpstreamRoutes {
        status: Some(bridge.status()),
        fetched_at_ms,
        refreshes: bridge.route_refreshes(),
        routes: snapshot.entries().cloned().collect(),
    })
}
