//! Inbound request view.
//!
//! # Responsibilities
//! - Expose method, raw path, headers and query parameters
//! - Read the whole body lazily, once, bounded by a size limit
//!
//! # Design Decisions
//! - The path is kept exactly as received (no percent-decoding, no
//!   normalization) so routing and diagnostics see what the client sent
//! - The body sits behind an async mutex so `Request` stays `Sync` and
//!   can be borrowed across await points by handlers

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::LengthLimitError;
use tokio::sync::Mutex;

use crate::http::error::BodyError;

/// Default body limit when none is configured (2MB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

enum BodyState {
    Pending(Body),
    Read(Bytes),
    Failed,
}

/// An HTTP request as seen by routers, components and the upstream bridge.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Mutex<BodyState>,
    body_limit: usize,
}

impl Request {
    /// Wrap the parts of an inbound request.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            uri,
            headers,
            body: Mutex::new(BodyState::Pending(body)),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Build a request from an axum/hyper request.
    pub fn from_http(request: axum::http::Request<Body>, body_limit: usize) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body).with_body_limit(body_limit)
    }

    /// Convenience constructor for requests without a body.
    pub fn empty(method: Method, target: &str) -> Self {
        let uri = target.parse().unwrap_or_else(|_| Uri::from_static("/"));
        Self::new(method, uri, HeaderMap::new(), Body::empty())
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path as received; an empty path is reported as `/`.
    pub fn path(&self) -> &str {
        let path = self.uri.path();
        if path.is_empty() {
            "/"
        } else {
            path
        }
    }

    /// Raw query string without the leading `?`.
    pub fn query_string(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path plus query, as it should be replayed to another server.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.path())
    }

    /// First value of a form-urlencoded query parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header lookup; names are case-insensitive. Non-UTF8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of a cookie sent by the client.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Read the whole body. The first call drains the stream; later calls
    /// return the cached bytes.
    pub async fn body(&self) -> Result<Bytes, BodyError> {
        let mut state = self.body.lock().await;
        match std::mem::replace(&mut *state, BodyState::Failed) {
            BodyState::Read(bytes) => {
                *state = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
            BodyState::Pending(body) => match axum::body::to_bytes(body, self.body_limit).await {
                Ok(bytes) => {
                    *state = BodyState::Read(bytes.clone());
                    Ok(bytes)
                }
                Err(e) if exceeds_limit(&e) => Err(BodyError::TooLarge {
                    limit: self.body_limit,
                }),
                Err(e) => Err(BodyError::Read(e.to_string())),
            },
            BodyState::Failed => Err(BodyError::Unavailable),
        }
    }
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_not_decoded() {
        let req = Request::empty(Method::GET, "/files/a%20b?x=1");
        assert_eq!(req.path(), "/files/a%20b");
        assert_eq!(req.path_and_query(), "/files/a%20b?x=1");
    }

    #[test]
    fn test_query_lookup() {
        let req = Request::empty(Method::GET, "/hello?name=J%C3%BCrgen&x=1&name=second");
        assert_eq!(req.query("name").as_deref(), Some("Jürgen"));
        assert_eq!(req.query("x").as_deref(), Some("1"));
        assert!(req.query("missing").is_none());
    }

    #[test]
    fn test_header_and_cookie_lookup() {
        let req = Request::empty(Method::GET, "/")
            .with_header("X-Custom", "yes")
            .with_header("cookie", "a=1; sid=abc");
        assert_eq!(req.header("x-custom"), Some("yes"));
        assert_eq!(req.cookie("sid"), Some("abc"));
        assert!(req.cookie("nope").is_none());
    }

    #[tokio::test]
    async fn test_body_is_read_once_and_cached() {
        let req = Request::new(
            Method::POST,
            Uri::from_static("/echo"),
            HeaderMap::new(),
            Body::from("payload"),
        );
        assert_eq!(req.body().await.unwrap(), Bytes::from_static(b"payload"));
        assert_eq!(req.body().await.unwrap(), Bytes::from_static(b"payload"));
    }

    #[tokio::test]
    async fn test_body_limit_enforced() {
        let req = Request::new(
            Method::POST,
            Uri::from_static("/echo"),
            HeaderMap::new(),
            Body::from("0123456789"),
        )
        .with_body_limit(4);
        assert!(matches!(req.body().await, Err(BodyError::TooLarge { limit: 4 })));
        assert!(matches!(req.body().await, Err(BodyError::Unavailable)));
    }
}
