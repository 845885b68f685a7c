//! Archetype node paths such as `/data[id2]/events[id3, 2]/data[id4]`.
//!
//! A segment names an attribute, optionally the archetype node id of the
//! child, and optionally a 1-based occurrence index among siblings sharing
//! that id. Query paths may leave indices out; resolved paths carry an index
//! wherever more than one sibling shares the node id.

pub mod query;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::PathError;

pub use query::ResolvedMatch;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub attribute: String,
    pub node_id: Option<String>,
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            node_id: None,
            index: None,
        }
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn without_index(&self) -> Self {
        Self {
            attribute: self.attribute.clone(),
            node_id: self.node_id.clone(),
            index: None,
        }
    }

    fn parse(raw: &str, whole: &str) -> Result<Self, PathError> {
        let (attribute, predicate) = match raw.find('[') {
            Some(open) => {
                let Some(inner) = raw[open + 1..].strip_suffix(']') else {
                    return Err(PathError::malformed(whole, format!("unclosed '[' in '{raw}'")));
                };
                (&raw[..open], Some(inner))
            }
            None => (raw, None),
        };

        if attribute.is_empty()
            || !attribute
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PathError::malformed(
                whole,
                format!("invalid attribute name '{attribute}'"),
            ));
        }

        let mut segment = PathSegment::new(attribute);
        let Some(predicate) = predicate else {
            return Ok(segment);
        };

        let parts: Vec<&str> = predicate.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [single] if single.chars().all(|c| c.is_ascii_digit()) => {
                segment.index = Some(parse_index(single, whole)?);
            }
            [node_id] => {
                segment.node_id = Some(parse_node_id(node_id, whole)?);
            }
            [node_id, index] => {
                segment.node_id = Some(parse_node_id(node_id, whole)?);
                segment.index = Some(parse_index(index, whole)?);
            }
            _ => {
                return Err(PathError::malformed(
                    whole,
                    format!("unsupported predicate '[{predicate}]'"),
                ));
            }
        }
        Ok(segment)
    }
}

fn parse_index(raw: &str, whole: &str) -> Result<usize, PathError> {
    match raw.parse::<usize>() {
        Ok(index) if index >= 1 => Ok(index),
        _ => Err(PathError::malformed(
            whole,
            format!("occurrence index '{raw}' must be a positive integer"),
        )),
    }
}

fn parse_node_id(raw: &str, whole: &str) -> Result<String, PathError> {
    if raw.is_empty() || raw.chars().any(|c| c.is_whitespace() || c == '[' || c == ']') {
        return Err(PathError::malformed(whole, format!("invalid node id '{raw}'")));
    }
    Ok(raw.to_string())
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribute)?;
        match (&self.node_id, self.index) {
            (Some(node_id), Some(index)) => write!(f, "[{node_id}, {index}]"),
            (Some(node_id), None) => write!(f, "[{node_id}]"),
            (None, Some(index)) => write!(f, "[{index}]"),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchetypePath {
    segments: Vec<PathSegment>,
    absolute: bool,
}

impl ArchetypePath {
    /// The absolute root path `/`.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
            absolute: true,
        }
    }

    pub fn relative(segments: Vec<PathSegment>) -> Self {
        Self {
            segments,
            absolute: false,
        }
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        path.parse()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_segment(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn last_attribute(&self) -> Option<&str> {
        self.segments.last().map(|segment| segment.attribute.as_str())
    }

    /// Path without its last segment, or `None` for an empty path.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
            absolute: self.absolute,
        })
    }

    /// The first `len` segments.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments.iter().take(len).cloned().collect(),
            absolute: self.absolute,
        }
    }

    pub fn child(&self, segment: PathSegment) -> Self {
        let mut path = self.clone();
        path.segments.push(segment);
        path
    }

    pub fn child_attribute(&self, attribute: impl Into<String>) -> Self {
        self.child(PathSegment::new(attribute))
    }

    /// Appends every segment of `other`, keeping this path's anchoring.
    pub fn join(&self, other: &ArchetypePath) -> Self {
        let mut path = self.clone();
        path.segments.extend(other.segments.iter().cloned());
        path
    }

    /// Same path with every occurrence index removed, as used for constraint lookups.
    pub fn strip_indices(&self) -> Self {
        Self {
            segments: self.segments.iter().map(PathSegment::without_index).collect(),
            absolute: self.absolute,
        }
    }

    /// True when the trailing attribute names equal `attributes`, ignoring predicates.
    pub fn ends_with_attributes(&self, attributes: &[&str]) -> bool {
        if attributes.len() > self.segments.len() {
            return false;
        }
        let offset = self.segments.len() - attributes.len();
        self.segments[offset..]
            .iter()
            .zip(attributes)
            .all(|(segment, attribute)| segment.attribute == *attribute)
    }
}

impl FromStr for ArchetypePath {
    type Err = PathError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::malformed(raw, "empty path"));
        }
        let absolute = trimmed.starts_with('/');
        let body = if absolute { &trimmed[1..] } else { trimmed };
        if body.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        for (position, c) in body.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| PathError::malformed(raw, "unbalanced ']'"))?;
                }
                '/' if depth == 0 => {
                    segments.push(PathSegment::parse(&body[start..position], raw)?);
                    start = position + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(PathError::malformed(raw, "unbalanced '['"));
        }
        segments.push(PathSegment::parse(&body[start..], raw)?);

        Ok(Self { segments, absolute })
    }
}

impl fmt::Display for ArchetypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            if self.segments.is_empty() {
                return f.write_str("/");
            }
            for segment in &self.segments {
                write!(f, "/{segment}")?;
            }
            Ok(())
        } else {
            for (position, segment) in self.segments.iter().enumerate() {
                if position > 0 {
                    f.write_str("/")?;
                }
                write!(f, "{segment}")?;
            }
            Ok(())
        }
    }
}

impl Serialize for ArchetypePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ArchetypePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_ids_and_indices_with_or_without_space() {
        let compact: ArchetypePath = "/data[id2]/events[id3,2]/data[id4]".parse().unwrap();
        let spaced: ArchetypePath = "/data[id2]/events[id3, 2]/data[id4]".parse().unwrap();
        assert_eq!(compact, spaced);
        assert_eq!(compact.segments()[1].node_id.as_deref(), Some("id3"));
        assert_eq!(compact.segments()[1].index, Some(2));
        assert_eq!(compact.to_string(), "/data[id2]/events[id3, 2]/data[id4]");
    }

    #[test]
    fn parses_positional_index_and_relative_paths() {
        let path: ArchetypePath = "items[1]/value/magnitude".parse().unwrap();
        assert!(!path.is_absolute());
        assert_eq!(path.segments()[0].index, Some(1));
        assert_eq!(path.segments()[0].node_id, None);
        assert_eq!(path.to_string(), "items[1]/value/magnitude");
    }

    #[test]
    fn root_path_round_trips() {
        let root: ArchetypePath = "/".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.child_attribute("data").to_string(), "/data");
    }

    #[test]
    fn rejects_malformed_paths() {
        for raw in ["", "/data[id2", "/data]/x", "/data//x", "/data[id2, 0]", "/da-ta"] {
            assert!(
                matches!(ArchetypePath::parse(raw), Err(PathError::Malformed { .. })),
                "expected '{raw}' to be rejected"
            );
        }
    }

    #[test]
    fn parent_strip_and_suffix_helpers() {
        let path: ArchetypePath = "/items[id7, 2]/value/symbol/defining_code".parse().unwrap();
        assert!(path.ends_with_attributes(&["symbol", "defining_code"]));
        assert!(!path.ends_with_attributes(&["value", "defining_code"]));
        assert_eq!(
            path.parent().unwrap().to_string(),
            "/items[id7, 2]/value/symbol"
        );
        assert_eq!(
            path.strip_indices().to_string(),
            "/items[id7]/value/symbol/defining_code"
        );
    }
}
