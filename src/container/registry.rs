//! Component container.
//!
//! # Responsibilities
//! - Index components by name and URL prefix
//! - Drive component lifecycles (eager by priority, lazy on first request)
//! - Dispatch requests to the longest matching prefix
//! - Track per-component usage counters
//!
//! # Design Decisions
//! - Lifecycle operations (start/stop/register/unregister) are serialized
//! - Requests hold a read lock on the component state for the duration
//!   of `service`; destroy takes the write lock, so it waits for in-flight
//!   requests and nothing is dispatched to a destroyed component
//! - Startup is all-or-nothing for eager components
//! - Teardown is best-effort: every component is destroyed independently

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{RwLock as AsyncRwLock, RwLockReadGuard};
use tracing::{Instrument, Span};

use crate::container::component::{Component, ComponentContext, ComponentState, InitParams};
use crate::container::error::ContainerError;
use crate::http::{Exchange, HandlerError};
use crate::observability::metrics;

struct Slot {
    component: Arc<dyn Component>,
    context: ComponentContext,
    priority: Option<u32>,
    seq: u64,
    state: AsyncRwLock<ComponentState>,
    created_at: SystemTime,
    last_access: Mutex<Option<SystemTime>>,
    requests: AtomicU64,
}

impl Slot {
    fn name(&self) -> &str {
        &self.context.name
    }

    /// Read access to an initialized component, initializing it first if
    /// it is still only registered.
    async fn acquire(&self) -> Result<RwLockReadGuard<'_, ComponentState>, ContainerError> {
        loop {
            let state = self.state.read().await;
            match *state {
                ComponentState::Initialized => return Ok(state),
                ComponentState::Destroyed => {
                    return Err(ContainerError::Destroyed(self.name().to_string()))
                }
                ComponentState::Registered => {
                    drop(state);
                    self.initialize().await?;
                }
            }
        }
    }

    /// Run `init` if the component is registered. Returns true when this
    /// call performed the transition.
    async fn initialize(&self) -> Result<bool, ContainerError> {
        let mut state = self.state.write().await;
        match *state {
            ComponentState::Registered => {
                self.component
                    .init(&self.context)
                    .instrument(self.context.span.clone())
                    .await
                    .map_err(|source| ContainerError::InitFailed {
                        name: self.name().to_string(),
                        source,
                    })?;
                *state = ComponentState::Initialized;
                tracing::info!(parent: &self.context.span, "Component initialized");
                Ok(true)
            }
            ComponentState::Initialized => Ok(false),
            ComponentState::Destroyed => Err(ContainerError::Destroyed(self.name().to_string())),
        }
    }

    /// Destroy the component, waiting for in-flight requests. `next` is the
    /// state left behind (destroyed, or registered again for a rollback).
    async fn teardown(&self, next: ComponentState) -> Result<(), ContainerError> {
        let mut state = self.state.write().await;
        let was = *state;
        *state = next;
        if was != ComponentState::Initialized {
            return Ok(());
        }
        self.component
            .destroy()
            .instrument(self.context.span.clone())
            .await
            .map_err(|source| ContainerError::DestroyFailed {
                name: self.name().to_string(),
                source,
            })?;
        tracing::info!(parent: &self.context.span, "Component destroyed");
        Ok(())
    }

    fn touch(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_access.lock() {
            *last = Some(SystemTime::now());
        }
    }

    async fn info(&self) -> ComponentInfo {
        let state = *self.state.read().await;
        ComponentInfo {
            name: self.context.name.clone(),
            prefix: self.context.prefix.clone(),
            state,
            priority: self.priority,
            created_at_ms: unix_millis(self.created_at),
            last_access_ms: self
                .last_access
                .lock()
                .ok()
                .and_then(|last| last.map(unix_millis)),
            request_count: self.requests.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of a registered component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub name: String,
    pub prefix: String,
    pub state: ComponentState,
    pub priority: Option<u32>,
    pub created_at_ms: u64,
    pub last_access_ms: Option<u64>,
    pub request_count: u64,
}

#[derive(Default)]
struct Indices {
    by_prefix: HashMap<String, Arc<Slot>>,
    by_name: HashMap<String, String>,
    running: bool,
}

/// Owns named, prefix-mapped components and their lifecycles.
pub struct ComponentContainer {
    indices: RwLock<Indices>,
    lifecycle: tokio::sync::Mutex<()>,
    seq: AtomicU64,
    span: Span,
}

impl Default for ComponentContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentContainer {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(Indices::default()),
            lifecycle: tokio::sync::Mutex::new(()),
            seq: AtomicU64::new(0),
            span: tracing::info_span!("container"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_running(&self) -> bool {
        self.read().running
    }

    /// Initialize every component registered with a load priority, in
    /// ascending priority order. On failure the components started so far
    /// are torn down again and the container stays stopped.
    pub async fn start(&self) -> Result<(), ContainerError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_running() {
            return Err(ContainerError::AlreadyRunning);
        }

        let mut eager: Vec<Arc<Slot>> = self
            .read()
            .by_prefix
            .values()
            .filter(|slot| slot.priority.is_some())
            .cloned()
            .collect();
        eager.sort_by_key(|slot| (slot.priority, slot.seq));

        let mut started: Vec<Arc<Slot>> = Vec::new();
        for slot in eager {
            let initialized = slot.initialize().await;
            match initialized {
                Ok(true) => started.push(slot),
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(parent: &self.span, component = %slot.name(), error = %err, "Eager initialization failed, aborting start");
                    for done in started.iter().rev() {
                        if let Err(e) = done.teardown(ComponentState::Registered).await {
                            tracing::warn!(parent: &self.span, component = %done.name(), error = %e, "Rollback destroy failed");
                        }
                    }
                    return Err(err);
                }
            }
        }

        self.write().running = true;
        tracing::info!(parent: &self.span, eager = started.len(), "Component container started");
        Ok(())
    }

    /// Destroy every component and stop. Individual destroy failures are
    /// logged and never stop the rest of the teardown.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let slots: Vec<Arc<Slot>> = {
            let mut indices = self.write();
            if !indices.running && indices.by_prefix.is_empty() {
                return;
            }
            indices.running = false;
            indices.by_name.clear();
            indices.by_prefix.drain().map(|(_, slot)| slot).collect()
        };

        let mut failures = 0usize;
        for slot in &slots {
            if let Err(err) = slot.teardown(ComponentState::Destroyed).await {
                failures += 1;
                tracing::warn!(parent: &self.span, component = %slot.name(), error = %err, "Destroy failed during shutdown");
            }
        }
        tracing::info!(parent: &self.span, components = slots.len(), failures, "Component container stopped");
    }

    /// Register a component under a URL prefix. `priority` marks it for
    /// eager loading. When the container is already running the component
    /// is initialized right away.
    pub async fn register(
        &self,
        prefix: &str,
        component: Arc<dyn Component>,
        params: InitParams,
        priority: Option<u32>,
    ) -> Result<(), ContainerError> {
        let _lifecycle = self.lifecycle.lock().await;
        let prefix = normalize_prefix(prefix)?;
        let name = component.name().to_string();
        {
            let indices = self.read();
            if indices.by_prefix.contains_key(&prefix) {
                return Err(ContainerError::PrefixTaken(prefix));
            }
            if indices.by_name.contains_key(&name) {
                return Err(ContainerError::NameTaken(name));
            }
        }

        let span = tracing::info_span!(parent: &self.span, "component", name = %name, prefix = %prefix);
        let slot = Arc::new(Slot {
            component,
            context: ComponentContext {
                name: name.clone(),
                prefix: prefix.clone(),
                params,
                span,
            },
            priority,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            state: AsyncRwLock::new(ComponentState::Registered),
            created_at: SystemTime::now(),
            last_access: Mutex::new(None),
            requests: AtomicU64::new(0),
        });

        if self.is_running() {
            slot.initialize().await?;
        }

        let mut indices = self.write();
        indices.by_name.insert(name.clone(), prefix.clone());
        indices.by_prefix.insert(prefix.clone(), slot);
        tracing::info!(parent: &self.span, component = %name, prefix = %prefix, priority = ?priority, "Component registered");
        Ok(())
    }

    /// Remove a component and destroy it. The indices are cleared even if
    /// `destroy` fails; the failure is still reported.
    pub async fn unregister(&self, prefix: &str) -> Result<(), ContainerError> {
        let _lifecycle = self.lifecycle.lock().await;
        let prefix = normalize_prefix(prefix)?;
        let slot = {
            let mut indices = self.write();
            let slot = indices
                .by_prefix
                .remove(&prefix)
                .ok_or_else(|| ContainerError::UnknownPrefix(prefix.clone()))?;
            indices.by_name.remove(slot.name());
            slot
        };
        tracing::info!(parent: &self.span, component = %slot.name(), prefix = %prefix, "Component unregistered");
        slot.teardown(ComponentState::Destroyed).await
    }

    /// Dispatch to the component with the longest matching prefix.
    /// Returns `Ok(false)` when no component claims the path (or the
    /// container is not running) so the caller can fall through.
    pub async fn dispatch(&self, ex: &mut Exchange) -> Result<bool, ContainerError> {
        let slot = {
            let indices = self.read();
            if !indices.running {
                return Ok(false);
            }
            match longest_prefix(&indices.by_prefix, ex.request.path()) {
                Some(slot) => slot.clone(),
                None => return Ok(false),
            }
        };

        let acquired = slot.acquire().await;
        let guard = match acquired {
            Ok(guard) => guard,
            Err(err @ ContainerError::InitFailed { .. }) => {
                tracing::error!(parent: &slot.context.span, error = %err, "Lazy initialization failed");
                component_fault(ex, slot.name(), StatusCode::INTERNAL_SERVER_ERROR);
                return Ok(true);
            }
            Err(err) => return Err(err),
        };

        slot.touch();
        metrics::record_component_request(slot.name());

        let outcome = AssertUnwindSafe(slot.component.service(ex))
            .catch_unwind()
            .instrument(slot.context.span.clone())
            .await;
        drop(guard);

        let result = outcome.unwrap_or_else(|panic| Err(HandlerError::from_panic(panic)));
        if let Err(err) = result {
            if ex.response.headers_sent() {
                tracing::error!(parent: &slot.context.span, error = %err, "Component failed after response was committed");
            } else {
                tracing::error!(parent: &slot.context.span, error = %err, "Component failed");
                component_fault(ex, slot.name(), err.status());
            }
        }
        Ok(true)
    }

    /// Snapshot of every registered component, ordered by prefix.
    pub async fn components(&self) -> Vec<ComponentInfo> {
        let slots: Vec<Arc<Slot>> = self.read().by_prefix.values().cloned().collect();
        let mut infos = Vec::with_capacity(slots.len());
        for slot in slots {
            infos.push(slot.info().await);
        }
        infos.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        infos
    }

    pub async fn component(&self, name: &str) -> Option<ComponentInfo> {
        let slot = {
            let indices = self.read();
            let prefix = indices.by_name.get(name)?;
            indices.by_prefix.get(prefix).cloned()
        }?;
        Some(slot.info().await)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Indices> {
        self.indices.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Indices> {
        self.indices.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `/` stays `/`; otherwise a leading slash is required, and trailing
/// slashes or a servlet-style `/*` suffix are dropped.
fn normalize_prefix(prefix: &str) -> Result<String, ContainerError> {
    let trimmed = prefix.strip_suffix("/*").unwrap_or(prefix);
    if trimmed.is_empty() || trimmed == "/" {
        return Ok("/".to_string());
    }
    if !trimmed.starts_with('/') || trimmed.contains('*') {
        return Err(ContainerError::InvalidPrefix(prefix.to_string()));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Exact prefix first, then each shorter segment-boundary prefix.
fn longest_prefix<'a>(by_prefix: &'a HashMap<String, Arc<Slot>>, path: &str) -> Option<&'a Arc<Slot>> {
    let mut candidate = path.trim_end_matches('/');
    loop {
        if candidate.is_empty() {
            return by_prefix.get("/");
        }
        if let Some(slot) = by_prefix.get(candidate) {
            return Some(slot);
        }
        match candidate.rfind('/') {
            Some(idx) => candidate = &candidate[..idx],
            None => return by_prefix.get("/"),
        }
    }
}

fn component_fault(ex: &mut Exchange, name: &str, status: StatusCode) {
    let written = ex.response.reset().and_then(|_| {
        ex.response.reply_json(
            status,
            &json!({
                "error": status.canonical_reason().unwrap_or("Error"),
                "component": name,
                "message": format!("Component '{}' failed to handle the request", name),
            }),
        )
    });
    if let Err(e) = written {
        tracing::error!(component = %name, error = %e, "Failed to write component error response");
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{BoxError, HandlerResult, Request};
    use async_trait::async_trait;
    use axum::http::Method;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Probe {
        inits: AtomicUsize,
        destroys: AtomicUsize,
        served: AtomicUsize,
    }

    struct Echo {
        name: String,
        probe: Arc<Probe>,
        fail_init: bool,
        fail_destroy: bool,
        init_order: Option<Arc<Mutex<Vec<String>>>>,
    }

    impl Echo {
        fn new(name: &str) -> (Arc<Self>, Arc<Probe>) {
            let probe = Arc::new(Probe::default());
            let echo = Arc::new(Self {
                name: name.to_string(),
                probe: probe.clone(),
                fail_init: false,
                fail_destroy: false,
                init_order: None,
            });
            (echo, probe)
        }

        fn build(name: &str, fail_init: bool, fail_destroy: bool, order: Option<Arc<Mutex<Vec<String>>>>) -> (Arc<Self>, Arc<Probe>) {
            let probe = Arc::new(Probe::default());
            let echo = Arc::new(Self {
                name: name.to_string(),
                probe: probe.clone(),
                fail_init,
                fail_destroy,
                init_order: order,
            });
            (echo, probe)
        }
    }

    #[async_trait]
    impl Component for Echo {
        fn name(&self) -> &str {
            &self.name
        }

        async fn init(&self, _ctx: &ComponentContext) -> Result<(), BoxError> {
            if self.fail_init {
                return Err("init refused".into());
            }
            if let Some(order) = &self.init_order {
                order.lock().unwrap().push(self.name.clone());
            }
            self.probe.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get(&self, ex: &mut Exchange) -> HandlerResult {
            self.probe.served.fetch_add(1, Ordering::SeqCst);
            if ex.request.path().ends_with("/fail") {
                return Err(HandlerError::msg("component bug"));
            }
            ex.response.send_text(self.name.clone())?;
            Ok(())
        }

        async fn destroy(&self) -> Result<(), BoxError> {
            self.probe.destroys.fetch_add(1, Ordering::SeqCst);
            if self.fail_destroy {
                return Err("destroy refused".into());
            }
            Ok(())
        }
    }

    fn exchange(method: Method, path: &str) -> Exchange {
        Exchange::new(Request::empty(method, path))
    }

    fn body_of(ex: &Exchange) -> String {
        String::from_utf8(ex.response.body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        let container = ComponentContainer::new();
        let (a, _) = Echo::new("a");
        let (ab, _) = Echo::new("ab");
        container.register("/a", a, InitParams::new(), None).await.unwrap();
        container.register("/a/b", ab, InitParams::new(), None).await.unwrap();
        container.start().await.unwrap();

        let mut ex = exchange(Method::GET, "/a/b/c");
        assert!(container.dispatch(&mut ex).await.unwrap());
        assert_eq!(body_of(&ex), "ab");

        let mut ex = exchange(Method::GET, "/a/x");
        assert!(container.dispatch(&mut ex).await.unwrap());
        assert_eq!(body_of(&ex), "a");

        let mut ex = exchange(Method::GET, "/a/b");
        assert!(container.dispatch(&mut ex).await.unwrap());
        assert_eq!(body_of(&ex), "ab");
    }

    #[tokio::test]
    async fn test_prefix_respects_segment_boundaries() {
        let container = ComponentContainer::new();
        let (a, _) = Echo::new("a");
        container.register("/a", a, InitParams::new(), None).await.unwrap();
        container.start().await.unwrap();

        let mut ex = exchange(Method::GET, "/ab");
        assert!(!container.dispatch(&mut ex).await.unwrap());
        assert!(!ex.response.is_finished());
    }

    #[tokio::test]
    async fn test_unmatched_path_falls_through() {
        let container = ComponentContainer::new();
        container.start().await.unwrap();
        let mut ex = exchange(Method::GET, "/nothing");
        assert!(!container.dispatch(&mut ex).await.unwrap());
    }

    #[tokio::test]
    async fn test_lazy_component_initialized_on_first_request() {
        let container = ComponentContainer::new();
        let (lazy, probe) = Echo::new("lazy");
        container.register("/lazy", lazy, InitParams::new(), None).await.unwrap();
        container.start().await.unwrap();
        assert_eq!(probe.inits.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            let mut ex = exchange(Method::GET, "/lazy");
            assert!(container.dispatch(&mut ex).await.unwrap());
        }
        assert_eq!(probe.inits.load(Ordering::SeqCst), 1);

        let info = container.component("lazy").await.unwrap();
        assert_eq!(info.state, ComponentState::Initialized);
        assert_eq!(info.request_count, 3);
        assert!(info.last_access_ms.is_some());
    }

    #[tokio::test]
    async fn test_eager_components_start_in_priority_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let container = ComponentContainer::new();
        for (name, priority) in [("late", 5), ("early", 1), ("middle", 3)] {
            let (c, _) = Echo::build(name, false, false, Some(order.clone()));
            container
                .register(&format!("/{}", name), c, InitParams::new(), Some(priority))
                .await
                .unwrap();
        }
        let (lazy, lazy_probe) = Echo::new("lazy");
        container.register("/lazy", lazy, InitParams::new(), None).await.unwrap();

        container.start().await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["early", "middle", "late"]);
        assert_eq!(lazy_probe.inits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_is_all_or_nothing() {
        let container = ComponentContainer::new();
        let (good, good_probe) = Echo::build("good", false, false, None);
        let (bad, _) = Echo::build("bad", true, false, None);
        container.register("/good", good, InitParams::new(), Some(1)).await.unwrap();
        container.register("/bad", bad, InitParams::new(), Some(2)).await.unwrap();

        let err = container.start().await.unwrap_err();
        assert!(matches!(err, ContainerError::InitFailed { ref name, .. } if name == "bad"));
        assert!(!container.is_running());
        assert_eq!(good_probe.inits.load(Ordering::SeqCst), 1);
        assert_eq!(good_probe.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(
            container.component("good").await.unwrap().state,
            ComponentState::Registered
        );

        let mut ex = exchange(Method::GET, "/good");
        assert!(!container.dispatch(&mut ex).await.unwrap());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let container = ComponentContainer::new();
        container.start().await.unwrap();
        assert!(matches!(container.start().await, Err(ContainerError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_register_conflicts() {
        let container = ComponentContainer::new();
        let (a, _) = Echo::new("a");
        let (a_again, _) = Echo::new("a");
        let (b, _) = Echo::new("b");
        container.register("/a", a, InitParams::new(), None).await.unwrap();
        assert!(matches!(
            container.register("/other", a_again, InitParams::new(), None).await,
            Err(ContainerError::NameTaken(_))
        ));
        assert!(matches!(
            container.register("/a/", b, InitParams::new(), None).await,
            Err(ContainerError::PrefixTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_register_while_running_initializes_immediately() {
        let container = ComponentContainer::new();
        container.start().await.unwrap();
        let (late, probe) = Echo::new("late");
        container.register("/late/*", late, InitParams::new(), None).await.unwrap();
        assert_eq!(probe.inits.load(Ordering::SeqCst), 1);

        let mut ex = exchange(Method::GET, "/late/x");
        assert!(container.dispatch(&mut ex).await.unwrap());
    }

    #[tokio::test]
    async fn test_unregistered_component_is_never_dispatched() {
        let container = ComponentContainer::new();
        let (c, probe) = Echo::new("gone");
        container.register("/gone", c, InitParams::new(), Some(1)).await.unwrap();
        container.start().await.unwrap();

        container.unregister("/gone").await.unwrap();
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 1);

        let mut ex = exchange(Method::GET, "/gone");
        assert!(!container.dispatch(&mut ex).await.unwrap());
        assert_eq!(probe.served.load(Ordering::SeqCst), 0);

        assert!(matches!(
            container.unregister("/gone").await,
            Err(ContainerError::UnknownPrefix(_))
        ));
    }

    #[tokio::test]
    async fn test_destroyed_slot_fails_loudly() {
        let (c, probe) = Echo::new("dead");
        let slot = Slot {
            component: c,
            context: ComponentContext {
                name: "dead".into(),
                prefix: "/dead".into(),
                params: InitParams::new(),
                span: Span::none(),
            },
            priority: None,
            seq: 0,
            state: AsyncRwLock::new(ComponentState::Initialized),
            created_at: SystemTime::now(),
            last_access: Mutex::new(None),
            requests: AtomicU64::new(0),
        };
        slot.teardown(ComponentState::Destroyed).await.unwrap();
        assert!(matches!(slot.acquire().await, Err(ContainerError::Destroyed(_))));
        assert!(matches!(slot.initialize().await, Err(ContainerError::Destroyed(_))));
        assert_eq!(probe.destroys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_component_error_is_structured() {
        let container = ComponentContainer::new();
        let (c, _) = Echo::new("worker");
        container.register("/work", c, InitParams::new(), None).await.unwrap();
        container.start().await.unwrap();

        let mut ex = exchange(Method::GET, "/work/fail");
        assert!(container.dispatch(&mut ex).await.unwrap());
        assert_eq!(ex.response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_slice(ex.response.body()).unwrap();
        assert_eq!(body["component"], "worker");
    }

    #[tokio::test]
    async fn test_lazy_init_failure_yields_error_response() {
        let container = ComponentContainer::new();
        let (c, _) = Echo::build("broken", true, false, None);
        container.register("/broken", c, InitParams::new(), None).await.unwrap();
        container.start().await.unwrap();

        let mut ex = exchange(Method::GET, "/broken");
        assert!(container.dispatch(&mut ex).await.unwrap());
        assert_eq!(ex.response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unsupported_verb_is_405() {
        let container = ComponentContainer::new();
        let (c, _) = Echo::new("readonly");
        container.register("/ro", c, InitParams::new(), None).await.unwrap();
        container.start().await.unwrap();

        let mut ex = exchange(Method::POST, "/ro");
        assert!(container.dispatch(&mut ex).await.unwrap());
        assert_eq!(ex.response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_stop_is_best_effort() {
        let container = ComponentContainer::new();
        let (bad, bad_probe) = Echo::build("bad", false, true, None);
        let (good, good_probe) = Echo::build("good", false, false, None);
        container.register("/bad", bad, InitParams::new(), Some(1)).await.unwrap();
        container.register("/good", good, InitParams::new(), Some(2)).await.unwrap();
        container.start().await.unwrap();

        container.stop().await;
        assert!(!container.is_running());
        assert_eq!(bad_probe.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(good_probe.destroys.load(Ordering::SeqCst), 1);
        assert!(container.components().await.is_empty());

        let mut ex = exchange(Method::GET, "/good");
        assert!(!container.dispatch(&mut ex).await.unwrap());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("").unwrap(), "/");
        assert_eq!(normalize_prefix("/").unwrap(), "/");
        assert_eq!(normalize_prefix("/api/").unwrap(), "/api");
        assert_eq!(normalize_prefix("/api/*").unwrap(), "/api");
        assert!(normalize_prefix("api").is_err());
        assert!(normalize_prefix("/a*b").is_err());
    }
}
