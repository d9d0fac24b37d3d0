//! Transport to the upstream application server.
//!
//! # Responsibilities
//! - Define the buffered request/response pair exchanged with the upstream
//! - Provide the `UpstreamClient` seam used by the bridge
//! - Implement it on top of the hyper-util pooled client

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request as HttpRequest, StatusCode};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::time;

use crate::http::{HandlerResult, ResponseWriter};

/// Upper bound on a buffered upstream response body.
pub const MAX_RESPONSE_BODY: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream connection failed: {0}")]
    Connect(String),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    #[error("failed to read upstream response body: {0}")]
    Body(String),
}

/// Request sent to the upstream. The target is relative to the upstream
/// origin.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamRequest {
    pub fn get(path_and_query: &str) -> Self {
        Self {
            method: Method::GET,
            path_and_query: path_and_query.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Fixed JSON response produced locally instead of by the upstream.
    pub fn local(status: StatusCode, error: &str, message: &str) -> Self {
        let body = serde_json::json!({ "error": error, "message": message }).to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(body),
        }
    }

    /// Copy status, headers and body onto a response writer.
    pub fn write_to(&self, response: &mut ResponseWriter) -> HandlerResult {
        response.status(self.status)?;
        for (name, value) in self.headers.iter() {
            response.append_raw_header(name.clone(), value.clone())?;
        }
        response.send_bytes(self.body.clone())?;
        Ok(())
    }
}

/// Sends one buffered request to the upstream.
///
/// `timeout` bounds the whole exchange including reading the response body.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(
        &self,
        request: UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, TransportError>;
}

/// hyper-util backed client bound to one upstream origin.
pub struct HyperUpstreamClient {
    client: Client<HttpConnector, Body>,
    authority: String,
}

impl HyperUpstreamClient {
    pub fn new(authority: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            authority: authority.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    async fn exchange(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let uri = format!("http://{}{}", self.authority, request.path_and_query);
        let mut builder = HttpRequest::builder().method(request.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = request.headers;
            if let Ok(host) = HeaderValue::from_str(&self.authority) {
                headers.insert(header::HOST, host);
            }
        }
        let outbound = builder
            .body(Body::from(request.body))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response: hyper::Response<Incoming> = self
            .client
            .request(outbound)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), MAX_RESPONSE_BODY)
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[async_trait]
impl UpstreamClient for HyperUpstreamClient {
    async fn send(
        &self,
        request: UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, TransportError> {
        match time::timeout(timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}
