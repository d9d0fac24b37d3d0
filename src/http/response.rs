//! Response handling.
//!
//! # Responsibilities
//! - Buffer status, headers and body written by handlers
//! - Track the "headers sent" and "finished" states
//! - Convert the buffered response into an axum response
//!
//! # Design Decisions
//! - Status and headers are frozen once committed (`flush_headers` or any send)
//! - Sending twice is an error, never a silent overwrite
//! - An unfinished response still produces a well-formed reply

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde::Serialize;

use crate::http::error::ResponseError;

/// Writer handed to handlers to build the client response.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    headers_sent: bool,
    finished: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            headers_sent: false,
            finished: false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// True once status and headers can no longer change.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// True once a body has been sent.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn status(&mut self, status: StatusCode) -> Result<&mut Self, ResponseError> {
        self.ensure_open()?;
        self.status = status;
        Ok(self)
    }

    /// Set (replace) a header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<&mut Self, ResponseError> {
        self.ensure_open()?;
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add a header value without replacing existing ones.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<&mut Self, ResponseError> {
        self.ensure_open()?;
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Typed variant of `append_header` for already-parsed values.
    pub fn append_raw_header(
        &mut self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<&mut Self, ResponseError> {
        self.ensure_open()?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Commit status and headers without finishing the body.
    pub fn flush_headers(&mut self) {
        self.headers_sent = true;
    }

    pub fn send_text(&mut self, body: impl Into<String>) -> Result<(), ResponseError> {
        self.send_with_type("text/plain; charset=utf-8", Bytes::from(body.into()))
    }

    pub fn send_html(&mut self, body: impl Into<String>) -> Result<(), ResponseError> {
        self.send_with_type("text/html; charset=utf-8", Bytes::from(body.into()))
    }

    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ResponseError> {
        let body = serde_json::to_vec(value).map_err(|e| ResponseError::Json(e.to_string()))?;
        self.send_with_type("application/json", Bytes::from(body))
    }

    /// Send raw bytes; the content type is left to whatever was set before.
    pub fn send_bytes(&mut self, body: impl Into<Bytes>) -> Result<(), ResponseError> {
        if self.finished {
            return Err(ResponseError::AlreadyFinished);
        }
        self.body = body.into();
        self.headers_sent = true;
        self.finished = true;
        Ok(())
    }

    /// Shorthand for `status(..)` followed by `send_json(..)`.
    pub fn reply_json<T: Serialize + ?Sized>(
        &mut self,
        status: StatusCode,
        value: &T,
    ) -> Result<(), ResponseError> {
        self.status(status)?;
        self.send_json(value)
    }

    /// Drop anything buffered so an error response can be written instead.
    /// Only possible while headers have not been sent.
    pub fn reset(&mut self) -> Result<(), ResponseError> {
        self.ensure_open()?;
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body = Bytes::new();
        Ok(())
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    fn send_with_type(&mut self, content_type: &str, body: Bytes) -> Result<(), ResponseError> {
        if self.finished {
            return Err(ResponseError::AlreadyFinished);
        }
        if !self.headers_sent && !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).map_err(|e| ResponseError::InvalidHeader(e.to_string()))?);
        }
        self.send_bytes(body)
    }

    fn ensure_open(&self) -> Result<(), ResponseError> {
        if self.finished {
            Err(ResponseError::AlreadyFinished)
        } else if self.headers_sent {
            Err(ResponseError::HeadersSent)
        } else {
            Ok(())
        }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ResponseError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ResponseError::InvalidHeader(name.to_string()))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| ResponseError::InvalidHeader(format!("{}: {}", name, value)))?;
    Ok((name, value))
}
