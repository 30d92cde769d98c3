//! Property-path parsing and resolution.
//!
//! A path names the animated property relative to a target node. Segments
//! are separated by dots; parenthesised segments carry an owner type:
//!
//! ```text
//! Opacity
//! (Canvas.Left)
//! RenderTransform.(TranslateTransform.X)
//! (UIElement.RenderTransform).(TransformGroup.Children)[1].(RotateTransform.Angle)
//! ```
//!
//! Every segment except the last must hold a node reference; resolution
//! follows it, so the property found may live on a different node than the
//! one the path started from.

use std::fmt;

use super::kind::NodeKind;
use super::property::PropertyId;
use super::{NodeId, SceneGraph};
use crate::error::{Result, TimingError};

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A named property, optionally qualified by its owner type.
    Property {
        qualifier: Option<String>,
        name: String,
    },
    /// Item of the collection produced by the previous segment.
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property {
                qualifier: Some(q),
                name,
            } => write!(f, "({q}.{name})"),
            Self::Property {
                qualifier: None,
                name,
            } => f.write_str(name),
            Self::Index(i) => write!(f, "[{i}]"),
        }
    }
}

/// A parsed property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Parse a textual path.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TimingError::PropertyPath("empty path".to_string()));
        }

        let mut segments = Vec::new();
        let mut rest = text;
        let mut expect_property = true;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                if expect_property {
                    return Err(malformed(text, "index must follow a property"));
                }
                let end = after
                    .find(']')
                    .ok_or_else(|| malformed(text, "unterminated index"))?;
                let index = after[..end]
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| malformed(text, "index is not a non-negative integer"))?;
                segments.push(PathSegment::Index(index));
                rest = &after[end + 1..];
                expect_property = false;
                continue;
            }

            if !expect_property {
                rest = rest
                    .strip_prefix('.')
                    .ok_or_else(|| malformed(text, "expected '.' between segments"))?;
                expect_property = true;
                continue;
            }

            if let Some(after) = rest.strip_prefix('(') {
                let end = after
                    .find(')')
                    .ok_or_else(|| malformed(text, "unterminated '('"))?;
                let inner = after[..end].trim();
                let (owner, name) = inner
                    .rsplit_once('.')
                    .ok_or_else(|| malformed(text, "qualified segment needs Owner.Name"))?;
                let (owner, name) = (owner.trim(), name.trim());
                if !is_identifier(owner) || !is_identifier(name) {
                    return Err(malformed(text, "invalid qualified segment"));
                }
                segments.push(PathSegment::Property {
                    qualifier: Some(owner.to_string()),
                    name: name.to_string(),
                });
                rest = &after[end + 1..];
            } else {
                let end = rest.find(['.', '[']).unwrap_or(rest.len());
                let name = rest[..end].trim();
                if !is_identifier(name) {
                    return Err(malformed(text, "invalid property name"));
                }
                segments.push(PathSegment::Property {
                    qualifier: None,
                    name: name.to_string(),
                });
                rest = &rest[end..];
            }
            expect_property = false;
        }

        if expect_property {
            return Err(malformed(text, "trailing '.'"));
        }
        if matches!(segments.last(), Some(PathSegment::Index(_))) {
            return Err(malformed(text, "path must end in a property"));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolve the path starting at `target`.
    ///
    /// Returns the node that owns the final property together with that
    /// property.
    pub fn resolve(&self, scene: &dyn SceneGraph, target: NodeId) -> Result<(NodeId, PropertyId)> {
        let mut current = target;
        let last = self.segments.len() - 1;

        for (i, segment) in self.segments.iter().enumerate() {
            let kind = scene
                .kind_of(current)
                .ok_or_else(|| {
                    TimingError::PropertyPath(format!("{self}: node {current} is gone"))
                })?;

            match segment {
                PathSegment::Index(index) => {
                    current = scene.child_at(current, *index).ok_or_else(|| {
                        TimingError::PropertyPath(format!(
                            "{self}: {} has no item {index}",
                            kind.type_name()
                        ))
                    })?;
                }
                PathSegment::Property { qualifier, name } => {
                    let qualifier = match qualifier {
                        Some(q) => Some(NodeKind::from_type_name(q).ok_or_else(|| {
                            TimingError::PropertyPath(format!("{self}: unknown type {q}"))
                        })?),
                        None => None,
                    };
                    let property = PropertyId::lookup(kind, qualifier, name).ok_or_else(|| {
                        TimingError::PropertyPath(format!(
                            "{self}: {} has no property {name}",
                            kind.type_name()
                        ))
                    })?;

                    if i == last {
                        return Ok((current, property));
                    }

                    current = scene
                        .value(current, property)
                        .and_then(|v| v.as_node())
                        .ok_or_else(|| {
                            TimingError::PropertyPath(format!("{self}: {name} holds no object"))
                        })?;
                }
            }
        }

        // parse() guarantees the last segment is a property
        Err(TimingError::PropertyPath(format!("{self}: no property segment")))
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && !matches!(segment, PathSegment::Index(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn malformed(text: &str, why: &str) -> TimingError {
    TimingError::PropertyPath(format!("{text}: {why}"))
}
