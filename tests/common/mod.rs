//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Request as seen by a mock upstream. Header names are lowercase.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl MockRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("/")
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.target.split_once('?')?.1;
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body).header("Content-Type", "application/json")
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Bind a listener on an ephemeral loopback port.
pub async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let (listener, addr) = ephemeral_listener().await;
    drop(listener);
    addr
}

/// Start a programmable mock backend: every request is parsed and handed
/// to `f`, whose response is written back with `Connection: close`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockResponse> + Send + 'static,
{
    let (listener, addr) = ephemeral_listener().await;
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let response = f(request).await;
                        let _ = socket.write_all(&encode_response(&response)).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(MockRequest {
        method,
        target,
        headers,
        body,
    })
}

fn encode_response(response: &MockResponse) -> Vec<u8> {
    let reason = match response.status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let mut out = format!("HTTP/1.1 {} {}\r\n", response.status, reason);
    for (name, value) in &response.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.body.len(),
        response.body
    ));
    out.into_bytes()
}

pub const MAPPINGS: &str = r#"{
  "contexts": {
    "application": {
      "mappings": {
        "dispatcherServlets": {
          "dispatcherServlet": [
            {
              "handler": "com.example.TestApplication#hello(String)",
              "predicate": "{GET [/hello]}",
              "details": {
                "handlerMethod": {"className": "com.example.TestApplication", "name": "hello"},
                "requestMappingConditions": {
                  "methods": ["GET"],
                  "patterns": ["/hello"],
                  "produces": []
                }
              }
            },
            {
              "handler": "com.example.EchoController#echo",
              "predicate": "{ [/echo/**]}",
              "details": {
                "handlerMethod": {"className": "com.example.EchoController", "name": "echo"},
                "requestMappingConditions": {
                  "methods": [],
                  "patterns": ["/echo/**"]
                }
              }
            }
          ]
        }
      }
    }
  }
}"#;

/// Mock application server with actuator endpoints, `GET /hello?name=`,
/// an `/echo/**` handler that reflects method, target and body, and a
/// `/slow` path that stalls for two seconds.
#[derive(Default)]
pub struct MockUpstream {
    pub down: AtomicBool,
    pub health_calls: AtomicU32,
    pub metadata_calls: AtomicU32,
    pub requests: Mutex<Vec<MockRequest>>,
}

impl MockUpstream {
    /// Requests received outside the actuator endpoints.
    pub fn app_requests(&self) -> Vec<MockRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, request: MockRequest) -> MockResponse {
        let path = request.path().to_string();
        match path.as_str() {
            "/actuator/health" => {
                self.health_calls.fetch_add(1, Ordering::SeqCst);
                if self.down.load(Ordering::SeqCst) {
                    MockResponse::json(503, r#"{"status":"DOWN"}"#)
                } else {
                    MockResponse::json(200, r#"{"status":"UP"}"#)
                }
            }
            "/actuator/mappings" => {
                self.metadata_calls.fetch_add(1, Ordering::SeqCst);
                MockResponse::json(200, MAPPINGS)
            }
            "/hello" => {
                let name = request.query_param("name").unwrap_or_else(|| "World".into());
                self.requests.lock().unwrap().push(request);
                MockResponse::new(200, format!("Hello {}!", name))
                    .header("Content-Type", "text/plain")
                    .header("X-Upstream", "mock")
            }
            path if path.starts_with("/echo") => {
                let body = serde_json::json!({
                    "method": request.method,
                    "target": request.target,
                    "body": String::from_utf8_lossy(&request.body),
                })
                .to_string();
                self.requests.lock().unwrap().push(request);
                MockResponse::json(201, body)
            }
            _ => MockResponse::new(404, "no such mapping"),
        }
    }
}

/// Start a [`MockUpstream`] and return it with its address.
pub async fn start_mock_upstream() -> (Arc<MockUpstream>, SocketAddr) {
    let upstream = Arc::new(MockUpstream::default());
    let handle = upstream.clone();
    let addr = start_programmable_backend(move |request| {
        let upstream = handle.clone();
        async move {
            if request.path() == "/slow" {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            upstream.respond(request)
        }
    })
    .await;
    (upstream, addr)
}

/// Client that never pools connections or goes through a system proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn hits(counter: &AtomicU32) -> u32 {
    counter.load(Ordering::SeqCst)
}
