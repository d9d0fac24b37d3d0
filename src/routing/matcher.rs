//! Route template compilation and path matching.
//!
//! # Responsibilities
//! - Compile a template such as `/users/:id/posts/:post_id` into segments
//! - Match a concrete request path and extract parameter values in order
//!
//! # Design Decisions
//! - Fully anchored: the whole path must match, never a prefix
//! - A parameter captures exactly one non-empty segment
//! - Trailing slashes are significant; no normalization
//! - No regex, a segment-by-segment comparison keeps matching O(n)
//! - Parameter values are percent-decoded; literal segments compare raw

use percent_encoding::percent_decode_str;

/// Marker that introduces a named parameter segment.
pub const PARAM_MARKER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    source: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

/// Template that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("route template '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("route template '{template}' has an unnamed parameter at segment {index}")]
    UnnamedParam { template: String, index: usize },

    #[error("route template '{template}' repeats parameter '{name}'")]
    DuplicateParam { template: String, name: String },
}

impl RouteTemplate {
    /// Compile a template. An empty template is the root (`/`).
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        let source = if template.is_empty() { "/" } else { template };
        if !source.starts_with('/') {
            return Err(TemplateError::MissingLeadingSlash(source.to_string()));
        }

        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();
        for (index, raw) in split_segments(source).enumerate() {
            match raw.strip_prefix(PARAM_MARKER) {
                Some("") => {
                    return Err(TemplateError::UnnamedParam {
                        template: source.to_string(),
                        index,
                    })
                }
                Some(name) => {
                    if param_names.iter().any(|n| n == name) {
                        return Err(TemplateError::DuplicateParam {
                            template: source.to_string(),
                            name: name.to_string(),
                        });
                    }
                    param_names.push(name.to_string());
                    segments.push(Segment::Param);
                }
                None => segments.push(Segment::Literal(raw.to_string())),
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            param_names,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameter names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a request path. Returns `None` on any mismatch.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let path = if path.is_empty() { "/" } else { path };
        if !path.starts_with('/') {
            return None;
        }

        let mut values = Vec::with_capacity(self.param_names.len());
        let mut parts = split_segments(path);
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param => {
                    if part.is_empty() {
                        return None;
                    }
                    values.push(decode(part));
                }
            }
        }
        if parts.next().is_some() {
            return None;
        }

        Some(PathParams {
            entries: self.param_names.iter().cloned().zip(values).collect(),
        })
    }
}

impl std::fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Segments after the leading slash; `/` yields one empty segment and a
/// trailing slash yields a trailing empty segment.
fn split_segments(path: &str) -> std::str::Split<'_, char> {
    path[1..].split('/')
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Parameters extracted from a matched path, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}
