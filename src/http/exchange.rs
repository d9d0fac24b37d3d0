//! A single request/response exchange.

use crate::http::request::Request;
use crate::http::response::ResponseWriter;
use crate::routing::PathParams;

/// Everything a handler needs for one request.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request,
    pub response: ResponseWriter,
    /// Parameters extracted by the router; empty outside routed handlers.
    pub params: PathParams,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: ResponseWriter::new(),
            params: PathParams::default(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}
