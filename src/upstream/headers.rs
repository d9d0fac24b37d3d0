//! Header filtering for forwarded exchanges.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Never copied from the client request to the upstream.
///
/// `accept-encoding` is dropped so the upstream answers uncompressed; the
/// response deny-list below removes `content-encoding` anyway.
pub const REQUEST_DENY_LIST: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "accept-encoding",
];

/// Never copied from the upstream response to the client.
pub const RESPONSE_DENY_LIST: &[&str] = &[
    "connection",
    "transfer-encoding",
    "content-encoding",
    "content-length",
];

/// Headers to send upstream, minus hop-by-hop headers and anything the
/// client listed in its own `Connection` header.
pub fn outbound_request_headers(source: &HeaderMap) -> HeaderMap {
    let connection_listed: Vec<String> = source
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    filtered(source, |name| {
        !REQUEST_DENY_LIST.contains(&name) && !connection_listed.iter().any(|t| t == name)
    })
}

/// Headers to copy back to the client.
pub fn client_response_headers(source: &HeaderMap) -> HeaderMap {
    filtered(source, |name| !RESPONSE_DENY_LIST.contains(&name))
}

/// Insert a header if both name and value are valid; invalid pairs are
/// skipped.
pub fn insert_lossy(headers: &mut HeaderMap, name: &str, value: &str) -> bool {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
            true
        }
        _ => false,
    }
}

fn filtered(source: &HeaderMap, keep: impl Fn(&str) -> bool) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(source.len());
    for (name, value) in source.iter() {
        if keep(name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn test_request_hop_by_hop_removed() {
        let src = map(&[
            ("host", "front.local"),
            ("connection", "keep-alive, x-private"),
            ("x-private", "secret"),
            ("accept-encoding", "gzip"),
            ("accept", "text/plain"),
            ("cookie", "a=b"),
        ]);
        let out = outbound_request_headers(&src);
        assert!(out.get("host").is_none());
        assert!(out.get("connection").is_none());
        assert!(out.get("x-private").is_none());
        assert!(out.get("accept-encoding").is_none());
        assert_eq!(out["accept"], "text/plain");
        assert_eq!(out["cookie"], "a=b");
    }

    #[test]
    fn test_response_deny_list() {
        let src = map(&[
            ("content-type", "text/plain"),
            ("content-length", "2"),
            ("transfer-encoding", "chunked"),
            ("content-encoding", "gzip"),
            ("connection", "close"),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
        ]);
        let out = client_response_headers(&src);
        assert_eq!(out.len(), 3);
        assert_eq!(out.get_all("set-cookie").iter().count(), 2);
        for denied in RESPONSE_DENY_LIST {
            assert!(out.get(*denied).is_none());
        }
    }

    #[test]
    fn test_insert_lossy_skips_invalid() {
        let mut headers = HeaderMap::new();
        assert!(insert_lossy(&mut headers, "X-User-Id", "42"));
        assert!(!insert_lossy(&mut headers, "bad name", "x"));
        assert!(!insert_lossy(&mut headers, "x-ok", "line\nbreak"));
        assert_eq!(headers.len(), 1);
    }
}
