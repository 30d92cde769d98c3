//! In-memory scene graph.
//!
//! `SceneTree` is a generational arena of nodes. It backs the demo runner and
//! the tests; hosts with their own visual tree implement [`SceneGraph`]
//! directly instead.
//!
//! Parent links follow ownership: a node added as a collection item or
//! assigned to an object-valued property (a transform set as an element's
//! `RenderTransform`, say) takes the holder as its parent.

use std::collections::HashMap;

use super::kind::NodeKind;
use super::property::PropertyId;
use super::{NameScopeKind, NameScopeResolver, NodeId, SceneGraph};
use crate::animation::types::{AnimatableValue, Point, Visibility as VisibilityValue};
use crate::error::{Result, TimingError};

#[derive(Debug, Clone)]
struct NodeEntry {
    kind: NodeKind,
    parent: Option<NodeId>,
    items: Vec<NodeId>,
    values: HashMap<PropertyId, AnimatableValue>,
    name: Option<String>,
    /// Templated parent, for nodes created inside a template instantiation.
    template_owner: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    entry: Option<NodeEntry>,
}

/// Generational arena implementing the scene-graph contract.
#[derive(Debug, Clone, Default)]
pub struct SceneTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let entry = NodeEntry {
            kind,
            parent: None,
            items: Vec::new(),
            values: HashMap::new(),
            name: None,
            template_owner: None,
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Create a node and append it to `parent`'s items.
    pub fn create_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let child = self.create(kind);
        self.add_child(parent, child);
        child
    }

    /// Append `child` to `parent`'s items and reparent it.
    ///
    /// No-op if either handle is stale.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.detach(child);
        if let Some(entry) = self.entry_mut(parent) {
            entry.items.push(child);
        }
        if let Some(entry) = self.entry_mut(child) {
            entry.parent = Some(parent);
        }
    }

    /// Remove `child` from its parent's items, leaving it detached.
    pub fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.entry(child).and_then(|e| e.parent) else {
            return;
        };
        if let Some(entry) = self.entry_mut(parent) {
            entry.items.retain(|&c| c != child);
        }
        if let Some(entry) = self.entry_mut(child) {
            entry.parent = None;
        }
    }

    /// Destroy a node and its items. Outstanding handles stop resolving.
    pub fn remove(&mut self, node: NodeId) {
        if !self.contains(node) {
            return;
        }
        self.detach(node);

        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if slot.generation != current.generation {
                continue;
            }
            if let Some(entry) = slot.entry.take() {
                stack.extend(entry.items);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
            }
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entry(node).is_some()
    }

    pub fn items(&self, node: NodeId) -> &[NodeId] {
        self.entry(node).map(|e| e.items.as_slice()).unwrap_or(&[])
    }

    /// Register `name` for the node in its namescope.
    pub fn set_name(&mut self, node: NodeId, name: impl Into<String>) {
        if let Some(entry) = self.entry_mut(node) {
            entry.name = Some(name.into());
        }
    }

    /// Place the node in the template namescope owned by `owner`.
    pub fn set_template_owner(&mut self, node: NodeId, owner: NodeId) {
        if let Some(entry) = self.entry_mut(node) {
            entry.template_owner = Some(owner);
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, node: NodeId) -> Option<&NodeEntry> {
        self.slots
            .get(node.index as usize)
            .filter(|s| s.generation == node.generation)
            .and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, node: NodeId) -> Option<&mut NodeEntry> {
        self.slots
            .get_mut(node.index as usize)
            .filter(|s| s.generation == node.generation)
            .and_then(|s| s.entry.as_mut())
    }
}

/// Value a property reports before anything sets it.
pub fn default_value(property: PropertyId) -> Option<AnimatableValue> {
    use PropertyId::*;
    match property {
        Opacity | TransitionOpacity => Some(1.0.into()),
        ScaleX | ScaleY | CompositeScaleX | CompositeScaleY | Transform3DScaleX
        | Transform3DScaleY | Transform3DScaleZ => Some(1.0.into()),
        Visibility => Some(VisibilityValue::Visible.into()),
        RenderTransformOrigin => Some(Point::default().into()),
        Background => Some([0.0, 0.0, 0.0, 0.0].into()),
        BrushColor => Some([0.0, 0.0, 0.0, 1.0].into()),
        RenderTransform | Projection | Transform3D | Clip | TransformGroupChildren
        | GeometryTransform | TransitionCompositeTransform | TransitionClipTransform => None,
        _ => Some(0.0.into()),
    }
}

impl NameScopeResolver for SceneTree {
    fn find_named_object(
        &self,
        name: &str,
        scope_owner: Option<NodeId>,
        scope: NameScopeKind,
    ) -> Option<NodeId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let entry = slot.entry.as_ref()?;
            let in_scope = match scope {
                NameScopeKind::Standard => entry.template_owner.is_none(),
                NameScopeKind::Template => {
                    scope_owner.is_some() && entry.template_owner == scope_owner
                }
            };
            (in_scope && entry.name.as_deref() == Some(name)).then_some(NodeId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }
}

impl SceneGraph for SceneTree {
    fn kind_of(&self, node: NodeId) -> Option<NodeKind> {
        self.entry(node).map(|e| e.kind)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.entry(node).and_then(|e| e.parent)
    }

    fn value(&self, node: NodeId, property: PropertyId) -> Option<AnimatableValue> {
        let entry = self.entry(node)?;
        if !property.applies_to(entry.kind) {
            return None;
        }
        entry
            .values
            .get(&property)
            .cloned()
            .or_else(|| default_value(property))
    }

    fn set_value(
        &mut self,
        node: NodeId,
        property: PropertyId,
        value: AnimatableValue,
    ) -> Result<()> {
        let kind = self
            .kind_of(node)
            .ok_or_else(|| TimingError::Scene(format!("node {node} is gone")))?;
        if !property.applies_to(kind) {
            return Err(TimingError::Scene(format!(
                "{} does not apply to {}",
                property.name(),
                kind.type_name()
            )));
        }
        if value.value_type() != property.value_type() {
            return Err(TimingError::Scene(format!(
                "{} expects {:?}, got {:?}",
                property.name(),
                property.value_type(),
                value.value_type()
            )));
        }

        let new_child = value.as_node();
        if let Some(child) = new_child {
            if !self.contains(child) {
                return Err(TimingError::Scene(format!("node {child} is gone")));
            }
        }

        let previous = self
            .entry_mut(node)
            .and_then(|e| e.values.insert(property, value))
            .and_then(|v| v.as_node());

        if let Some(old) = previous.filter(|old| Some(*old) != new_child) {
            if let Some(entry) = self.entry_mut(old) {
                if entry.parent == Some(node) {
                    entry.parent = None;
                }
            }
        }
        if let Some(child) = new_child {
            self.detach(child);
            if let Some(entry) = self.entry_mut(child) {
                entry.parent = Some(node);
            }
        }
        Ok(())
    }

    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.entry(node).and_then(|e| e.items.get(index).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generational_handles() {
        let mut scene = SceneTree::new();
        let a = scene.create(NodeKind::Element);
        scene.remove(a);
        let b = scene.create(NodeKind::Element);

        assert_eq!(a.index, b.index);
        assert_ne!(a, b);
        assert!(scene.kind_of(a).is_none());
        assert_eq!(scene.kind_of(b), Some(NodeKind::Element));
        assert!(scene.upgrade(scene.downgrade(a)).is_none());
    }

    #[test]
    fn test_remove_takes_items() {
        let mut scene = SceneTree::new();
        let canvas = scene.create(NodeKind::Canvas);
        let child = scene.create_child(canvas, NodeKind::Element);
        scene.remove(canvas);
        assert!(!scene.contains(child));
        assert!(scene.is_empty());
    }

    #[test]
    fn test_defaults_and_type_checks() {
        let mut scene = SceneTree::new();
        let element = scene.create(NodeKind::Element);

        assert_eq!(scene.value(element, PropertyId::Opacity), Some(1.0.into()));
        assert_eq!(scene.value(element, PropertyId::CanvasLeft), Some(0.0.into()));
        assert_eq!(scene.value(element, PropertyId::RenderTransform), None);
        assert_eq!(scene.value(element, PropertyId::TranslateX), None);

        scene.set_value(element, PropertyId::Opacity, 0.25.into()).unwrap();
        assert_eq!(scene.value(element, PropertyId::Opacity), Some(0.25.into()));

        assert!(scene.set_value(element, PropertyId::Opacity, Point::default().into()).is_err());
        assert!(scene.set_value(element, PropertyId::TranslateX, 1.0.into()).is_err());
    }

    #[test]
    fn test_object_values_reparent() {
        let mut scene = SceneTree::new();
        let element = scene.create(NodeKind::Element);
        let first = scene.create(NodeKind::TranslateTransform);
        let second = scene.create(NodeKind::ScaleTransform);

        scene.set_value(element, PropertyId::RenderTransform, first.into()).unwrap();
        assert_eq!(scene.parent(first), Some(element));

        scene.set_value(element, PropertyId::RenderTransform, second.into()).unwrap();
        assert_eq!(scene.parent(first), None);
        assert_eq!(scene.parent(second), Some(element));
    }

    #[test]
    fn test_namescopes() {
        let mut scene = SceneTree::new();
        let page = scene.create(NodeKind::Canvas);
        let templated = scene.create_child(page, NodeKind::Element);
        let outer = scene.create_child(page, NodeKind::Element);
        let inner = scene.create_child(templated, NodeKind::Element);
        scene.set_name(outer, "part");
        scene.set_name(inner, "part");
        scene.set_template_owner(inner, templated);

        assert_eq!(
            scene.find_named_object("part", None, NameScopeKind::Standard),
            Some(outer)
        );
        assert_eq!(
            scene.find_named_object("part", Some(templated), NameScopeKind::Template),
            Some(inner)
        );
        assert_eq!(
            scene.find_named_object("part", None, NameScopeKind::Template),
            None
        );
        assert_eq!(scene.find_named_object("missing", None, NameScopeKind::Standard), None);
    }
}
