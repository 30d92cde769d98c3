//! Scene-graph contract consumed by the timing engine.
//!
//! The engine never owns scene nodes. It reads and writes property values,
//! asks about node kinds and parents, and holds [`WeakNode`] handles that
//! must be upgraded on every use.
//!
//! This module provides:
//! - `SceneGraph`: node queries and property access
//! - `NameScopeResolver`: namescope-aware name lookup
//! - `SceneTree`: an in-memory implementation used by the demo runner and tests
//! - Property identities and property-path parsing

pub mod kind;
pub mod path;
pub mod property;
pub mod tree;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::animation::types::AnimatableValue;
use crate::error::Result;

pub use kind::NodeKind;
pub use path::{PathSegment, PropertyPath};
pub use property::{PropertyDescriptor, PropertyId};
pub use tree::SceneTree;

/// Generational handle to a scene node.
///
/// A handle whose slot has been reused compares unequal to the new occupant,
/// so a stale handle simply fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Non-owning reference to a scene node.
///
/// Timelines store targets only in this form. Call [`SceneGraph::upgrade`]
/// each time the node is needed; `None` means the node is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeakNode(NodeId);

impl WeakNode {
    pub fn new(node: NodeId) -> Self {
        Self(node)
    }

    /// The handle this reference was taken from. Not proof of liveness.
    pub fn id(&self) -> NodeId {
        self.0
    }
}

/// Namescope a name lookup runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameScopeKind {
    /// The page-level scope, owned by its root (or unowned).
    Standard,
    /// A template instantiation, owned by the templated parent.
    Template,
}

/// Resolves names to nodes.
pub trait NameScopeResolver {
    fn find_named_object(
        &self,
        name: &str,
        scope_owner: Option<NodeId>,
        scope: NameScopeKind,
    ) -> Option<NodeId>;
}

/// Node queries and property access used by the timing engine.
pub trait SceneGraph: NameScopeResolver {
    /// Concrete kind of a live node, `None` if the handle is stale.
    fn kind_of(&self, node: NodeId) -> Option<NodeKind>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Current effective value of a property.
    fn value(&self, node: NodeId, property: PropertyId) -> Option<AnimatableValue>;

    fn set_value(&mut self, node: NodeId, property: PropertyId, value: AnimatableValue)
    -> Result<()>;

    /// Item `index` of a collection node, for indexed path segments.
    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId>;

    fn is_of_kind(&self, node: NodeId, kind: NodeKind) -> bool {
        self.kind_of(node).is_some_and(|k| k.derives_from(kind))
    }

    fn downgrade(&self, node: NodeId) -> WeakNode {
        WeakNode::new(node)
    }

    fn upgrade(&self, weak: WeakNode) -> Option<NodeId> {
        self.kind_of(weak.id()).map(|_| weak.id())
    }

    /// Short human-readable label for diagnostics.
    fn debug_label(&self, node: NodeId) -> String {
        match self.kind_of(node) {
            Some(kind) => format!("{}{}", kind.type_name(), node),
            None => format!("<dropped>{}", node),
        }
    }
}
