//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Validate path shapes (context path, upstream probe paths, templates)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;
use crate::routing::RouteTemplate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `upstream.port`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", listener.bind_address),
        ));
    }
    if listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }
    if listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }

    let upstream = &config.upstream;
    if upstream.host.trim().is_empty() {
        errors.push(ValidationError::new("upstream.host", "must not be empty"));
    }
    if upstream.port == 0 {
        errors.push(ValidationError::new("upstream.port", "must not be 0"));
    }
    let ctx = &upstream.context_path;
    if !ctx.is_empty() && (!ctx.starts_with('/') || ctx.ends_with('/')) {
        errors.push(ValidationError::new(
            "upstream.context_path",
            "must be empty or start with '/' and not end with '/'",
        ));
    }
    for (field, path) in [
        ("upstream.health_path", &upstream.health_path),
        ("upstream.metadata_path", &upstream.metadata_path),
    ] {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(field, "must start with '/'"));
        }
    }
    for (field, value) in [
        ("upstream.timeout_ms", upstream.timeout_ms),
        ("upstream.check_interval_secs", upstream.check_interval_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }
    if upstream.enabled
        && listener.request_timeout_secs.saturating_mul(1000) <= upstream.timeout_ms
    {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            format!(
                "must exceed upstream.timeout_ms ({} ms)",
                upstream.timeout_ms
            ),
        ));
    }
    if upstream.startup_retries == 0 {
        errors.push(ValidationError::new("upstream.startup_retries", "must be > 0"));
    }
    for template in &upstream.proxy_routes {
        if let Err(e) = RouteTemplate::compile(template) {
            errors.push(ValidationError::new("upstream.proxy_routes", e.to_string()));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let admin = &config.admin;
    if admin.enabled {
        if admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
        if !admin.path_prefix.starts_with('/') || admin.path_prefix.len() < 2 {
            errors.push(ValidationError::new(
                "admin.path_prefix",
                "must start with '/' and not be the root",
            ));
        }
    }

    let session = &config.session;
    if session.enabled {
        if session.cookie_name.trim().is_empty() {
            errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
        }
        for (field, value) in [
            ("session.idle_timeout_secs", session.idle_timeout_secs),
            ("session.max_sessions", session.max_sessions as u64),
            ("session.sweep_interval_secs", session.sweep_interval_secs),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(field, "must be > 0"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_context_path_shape() {
        for bad in ["app", "/app/"] {
            let mut config = AppConfig::default();
            config.upstream.context_path = bad.to_string();
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors[0].field, "upstream.context_path");
        }
        let mut config = AppConfig::default();
        config.upstream.context_path = "/app".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_all_problems_reported() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "nope".into();
        config.upstream.health_path = "health".into();
        config.upstream.timeout_ms = 0;
        config.upstream.proxy_routes = vec!["/a/:".into()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "upstream.health_path",
                "upstream.timeout_ms",
                "upstream.proxy_routes",
            ]
        );
    }

    #[test]
    fn test_listener_timeout_must_outlast_upstream_timeout() {
        let mut config = AppConfig::default();
        config.listener.request_timeout_secs = 5;
        config.upstream.timeout_ms = 5_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "listener.request_timeout_secs");

        config.upstream.timeout_ms = 4_999;
        assert!(validate_config(&config).is_ok());

        config.upstream.timeout_ms = 30_000;
        config.upstream.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_checked_only_when_enabled() {
        let mut config = AppConfig::default();
        config.admin.api_key = String::new();
        assert!(validate_config(&config).is_ok());
        config.admin.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
