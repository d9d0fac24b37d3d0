//! Parsing of the upstream route metadata document.
//!
//! Two shapes are accepted:
//! - the Spring Boot actuator `mappings` document
//!   (`contexts.*.mappings.dispatcherServlets.*[].details`)
//! - a flat JSON array of `{method, path, className, methodName}` objects
//!   (`pattern` is accepted in place of `path`)
//!
//! Mappings without request-mapping conditions (resource handlers, error
//! pages registered as plain handlers) are skipped.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::routes::{UpstreamRouteEntry, ANY_METHOD};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("route metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("route metadata has an unrecognized shape")]
    UnrecognizedFormat,
}

#[derive(Debug, Deserialize)]
struct Mapping {
    #[serde(default)]
    details: Option<MappingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MappingDetails {
    #[serde(default)]
    handler_method: Option<HandlerMethod>,
    #[serde(default)]
    request_mapping_conditions: Option<MappingConditions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandlerMethod {
    #[serde(default)]
    class_name: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct MappingConditions {
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    produces: Vec<MediaType>,
    #[serde(default)]
    consumes: Vec<MediaType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaType {
    media_type: String,
}

/// Parse a metadata document into route entries.
pub fn parse_route_document(raw: &[u8]) -> Result<Vec<UpstreamRouteEntry>, MetadataError> {
    let document: Value = serde_json::from_slice(raw)?;

    match document {
        Value::Array(_) => {
            let entries: Vec<UpstreamRouteEntry> = serde_json::from_value(document)?;
            Ok(entries
                .into_iter()
                .map(|mut e| {
                    e.method = normalize_method(&e.method);
                    e
                })
                .collect())
        }
        Value::Object(ref root) => {
            let contexts = root
                .get("contexts")
                .and_then(Value::as_object)
                .ok_or(MetadataError::UnrecognizedFormat)?;

            let mut entries = Vec::new();
            for context in contexts.values() {
                let Some(servlets) = context
                    .pointer("/mappings/dispatcherServlets")
                    .and_then(Value::as_object)
                else {
                    continue;
                };

                for mappings in servlets.values() {
                    let mappings: Vec<Mapping> = serde_json::from_value(mappings.clone())?;
                    for mapping in mappings {
                        entries.extend(expand(mapping));
                    }
                }
            }
            Ok(entries)
        }
        _ => Err(MetadataError::UnrecognizedFormat),
    }
}

fn expand(mapping: Mapping) -> Vec<UpstreamRouteEntry> {
    let Some(details) = mapping.details else {
        return Vec::new();
    };
    let Some(conditions) = details.request_mapping_conditions else {
        return Vec::new();
    };
    let (class_name, method_name) = details
        .handler_method
        .map(|h| (h.class_name, h.name))
        .unwrap_or_default();

    let methods = if conditions.methods.is_empty() {
        vec![ANY_METHOD.to_string()]
    } else {
        conditions.methods.iter().map(|m| normalize_method(m)).collect()
    };
    let produces: Vec<String> = conditions.produces.into_iter().map(|m| m.media_type).collect();
    let consumes: Vec<String> = conditions.consumes.into_iter().map(|m| m.media_type).collect();

    let mut entries = Vec::with_capacity(methods.len() * conditions.patterns.len());
    for pattern in &conditions.patterns {
        for method in &methods {
            entries.push(UpstreamRouteEntry {
                method: method.clone(),
                pattern: pattern.clone(),
                class_name: class_name.clone(),
                method_name: method_name.clone(),
                produces: produces.clone(),
                consumes: consumes.clone(),
            });
        }
    }
    entries
}

fn normalize_method(method: &str) -> String {
    let method = method.trim();
    if method.is_empty() || method == "*" {
        ANY_METHOD.to_string()
    } else {
        method.to_ascii_uppercase()
    }
}
