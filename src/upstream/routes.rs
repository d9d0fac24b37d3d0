//! Upstream route table.
//!
//! # Responsibilities
//! - Represent routes declared by the upstream application server
//! - Compile their path patterns (literal, `*`, `{var}`, `**`, `{*var}`)
//! - Pick the most specific entry for a (method, path) pair
//!
//! # Precedence
//! ```text
//! 1. exact literal pattern
//! 2. single-segment wildcards / path variables (more literal segments first)
//! 3. patterns spanning segments, `**` or `{*var}` (more literal segments first)
//! ties: method-specific before ANY, then declaration order
//! ```

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Method value that matches every request method.
pub const ANY_METHOD: &str = "ANY";

/// One route declared by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamRouteEntry {
    pub method: String,
    #[serde(alias = "path")]
    pub pattern: String,
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub method_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
}

impl UpstreamRouteEntry {
    pub fn new(method: &str, pattern: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            pattern: pattern.to_string(),
            class_name: String::new(),
            method_name: String::new(),
            produces: Vec::new(),
            consumes: Vec::new(),
        }
    }

    pub fn is_any_method(&self) -> bool {
        self.method == ANY_METHOD || self.method == "*"
    }

    fn accepts(&self, method: &str) -> bool {
        self.is_any_method() || self.method.eq_ignore_ascii_case(method)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    /// `*` or `{name}`: exactly one segment.
    Single,
    /// `**` or `{*name}`: zero or more segments.
    Multi,
}

impl PatternSegment {
    fn parse(part: &str) -> Self {
        if part == "**" || (part.starts_with("{*") && part.ends_with('}')) {
            PatternSegment::Multi
        } else if part == "*" || (part.starts_with('{') && part.ends_with('}')) {
            PatternSegment::Single
        } else {
            PatternSegment::Literal(part.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompiledPattern {
    segments: Vec<PatternSegment>,
}

/// Lower ranks win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    class: u8,
    /// Negated literal count so more literal segments sort first.
    literal_penalty: isize,
    any_method: bool,
    position: usize,
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Self {
        let trimmed = pattern.strip_prefix('/').unwrap_or(pattern);
        let segments = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').map(PatternSegment::parse).collect()
        };
        Self { segments }
    }

    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PatternSegment::Literal(_)))
            .count()
    }

    fn spans_segments(&self) -> bool {
        self.segments.contains(&PatternSegment::Multi)
    }

    fn is_exact(&self) -> bool {
        self.literal_count() == self.segments.len()
    }

    /// `path` is relative to the upstream context path and starts with `/`.
    fn matches(&self, path: &str) -> bool {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };
        match_segments(&self.segments, &parts)
    }
}

fn match_segments(segments: &[PatternSegment], parts: &[&str]) -> bool {
    match segments.split_first() {
        None => parts.is_empty(),
        Some((PatternSegment::Multi, rest)) => {
            (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..]))
        }
        Some((segment, rest)) => match parts.split_first() {
            Some((part, tail)) => {
                let accepted = match segment {
                    PatternSegment::Literal(literal) => literal == part,
                    _ => true,
                };
                accepted && match_segments(rest, tail)
            }
            None => false,
        },
    }
}

#[derive(Debug, Clone)]
struct CompiledEntry {
    entry: UpstreamRouteEntry,
    pattern: CompiledPattern,
}

/// Immutable snapshot of the upstream route table.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    entries: Vec<CompiledEntry>,
    fetched_at: Option<SystemTime>,
}

impl Default for RouteSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl RouteSnapshot {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            fetched_at: None,
        }
    }

    pub fn new(entries: Vec<UpstreamRouteEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| CompiledEntry {
                pattern: CompiledPattern::compile(&entry.pattern),
                entry,
            })
            .collect();
        Self {
            entries,
            fetched_at: Some(SystemTime::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fetched_at(&self) -> Option<SystemTime> {
        self.fetched_at
    }

    pub fn entries(&self) -> impl Iterator<Item = &UpstreamRouteEntry> {
        self.entries.iter().map(|e| &e.entry)
    }

    /// Most specific entry matching the request.
    pub fn find(&self, method: &str, path: &str) -> Option<&UpstreamRouteEntry> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.entry.accepts(method) && e.pattern.matches(path))
            .min_by_key(|(position, e)| rank(e, *position))
            .map(|(_, e)| &e.entry)
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.find(method, path).is_some()
    }
}

fn rank(entry: &CompiledEntry, position: usize) -> Rank {
    let class = if entry.pattern.is_exact() {
        0
    } else if !entry.pattern.spans_segments() {
        1
    } else {
        2
    };
    Rank {
        class,
        literal_penalty: -(entry.pattern.literal_count() as isize),
        any_method: entry.entry.is_any_method(),
        position,
    }
}
