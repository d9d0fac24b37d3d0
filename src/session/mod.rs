//! Session correlation for proxied requests.
//!
//! # Responsibilities
//! - Resolve the session of an inbound request (cookie based)
//! - Describe it as correlation headers injected into upstream requests
//!
//! # Design Decisions
//! - Sessions live in memory only; a restart drops them
//! - Idle sessions expire and a background sweep removes them; the store
//!   is capped and evicts the least recently used session when full
//! - Client-supplied correlation headers are never trusted; the proxy
//!   strips them before injecting its own

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::http::{Request, ResponseWriter};
use crate::upstream::headers::insert_lossy;

pub const SESSION_ID_HEADER: &str = "x-session-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USERNAME_HEADER: &str = "x-username";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const SESSION_ATTRIBUTES_HEADER: &str = "x-session-attributes";

/// Every header name `correlation_headers` may produce.
pub const CORRELATION_HEADERS: &[&str] = &[
    SESSION_ID_HEADER,
    USER_ID_HEADER,
    USERNAME_HEADER,
    USER_ROLES_HEADER,
    SESSION_ATTRIBUTES_HEADER,
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionContext {
    pub id: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub roles: Vec<String>,
    pub attributes: BTreeMap<String, Value>,
}

impl SessionContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Headers describing this session to the upstream. Absent fields
    /// produce no header; values that are not valid header text are dropped.
    pub fn correlation_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert_lossy(&mut headers, SESSION_ID_HEADER, &self.id);
        if let Some(user_id) = &self.user_id {
            insert_lossy(&mut headers, USER_ID_HEADER, user_id);
        }
        if let Some(username) = &self.username {
            insert_lossy(&mut headers, USERNAME_HEADER, username);
        }
        if !self.roles.is_empty() {
            insert_lossy(&mut headers, USER_ROLES_HEADER, &self.roles.join(","));
        }
        if !self.attributes.is_empty() {
            if let Ok(json) = serde_json::to_string(&self.attributes) {
                insert_lossy(&mut headers, SESSION_ATTRIBUTES_HEADER, &json);
            }
        }
        headers
    }
}

/// Looks up (or creates) the session of a request.
#[async_trait]
pub trait SessionAccessor: Send + Sync {
    async fn session(
        &self,
        request: &Request,
        response: &mut ResponseWriter,
    ) -> Option<SessionContext>;

    /// Drop expired sessions. Returns how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }
}

/// Accessor for deployments without sessions.
pub struct NoSessions;

#[async_trait]
impl SessionAccessor for NoSessions {
    async fn session(&self, _: &Request, _: &mut ResponseWriter) -> Option<SessionContext> {
        None
    }
}

struct StoredSession {
    context: SessionContext,
    last_access: Instant,
}

/// In-memory, cookie-keyed session store with idle expiry and a size cap.
pub struct MemorySessions {
    sessions: DashMap<String, StoredSession>,
    cookie_name: String,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl MemorySessions {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        let defaults = SessionConfig::default();
        Self {
            sessions: DashMap::new(),
            cookie_name: cookie_name.into(),
            idle_timeout: Duration::from_secs(defaults.idle_timeout_secs),
            max_sessions: defaults.max_sessions,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.cookie_name.clone())
            .with_limits(Duration::from_secs(config.idle_timeout_secs), config.max_sessions)
    }

    pub fn with_limits(mut self, idle_timeout: Duration, max_sessions: usize) -> Self {
        self.idle_timeout = idle_timeout;
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Live session by id. Refreshes its last access time.
    pub fn get(&self, id: &str) -> Option<SessionContext> {
        let now = Instant::now();
        {
            let mut entry = self.sessions.get_mut(id)?;
            if now.duration_since(entry.last_access) < self.idle_timeout {
                entry.last_access = now;
                return Some(entry.context.clone());
            }
        }
        self.sessions.remove(id);
        None
    }

    /// Insert or replace a session, evicting to stay within the cap.
    pub fn insert(&self, session: SessionContext) {
        if !self.sessions.contains_key(&session.id) && self.sessions.len() >= self.max_sessions {
            self.purge_expired();
            while self.sessions.len() >= self.max_sessions {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }
        self.sessions.insert(
            session.id.clone(),
            StoredSession {
                context: session,
                last_access: Instant::now(),
            },
        );
    }

    /// Apply `f` to a stored session. Returns false if it does not exist.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut SessionContext)) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut entry) => {
                f(&mut entry.context);
                entry.last_access = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> Option<SessionContext> {
        self.sessions.remove(id).map(|(_, s)| s.context)
    }

    fn evict_least_recent(&self) -> bool {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.last_access)
            .map(|entry| entry.key().clone());
        match oldest {
            Some(id) => {
                self.sessions.remove(&id);
                tracing::debug!(session_id = %id, "Session evicted, store full");
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionAccessor for MemorySessions {
    async fn session(
        &self,
        request: &Request,
        response: &mut ResponseWriter,
    ) -> Option<SessionContext> {
        if let Some(existing) = request.cookie(&self.cookie_name).and_then(|id| self.get(id)) {
            return Some(existing);
        }

        let session = SessionContext::new(uuid::Uuid::new_v4().to_string());
        let cookie = format!("{}={}; Path=/; HttpOnly", self.cookie_name, session.id);
        if let Err(e) = response.append_header("set-cookie", &cookie) {
            // Response already committed: the session cannot be handed out.
            tracing::debug!(error = %e, "Could not set session cookie");
            return None;
        }
        self.insert(session.clone());
        tracing::debug!(session_id = %session.id, "Session created");
        Some(session)
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, stored| now.duration_since(stored.last_access) < self.idle_timeout);
        before.saturating_sub(self.sessions.len())
    }
}

/// Sweep expired sessions every `every` until shutdown fires.
pub async fn run_sweeper(
    store: Arc<dyn SessionAccessor>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = time::interval_at(time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Expired sessions swept");
                }
            }
        }
    }
}
