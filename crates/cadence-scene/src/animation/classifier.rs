//! Independent-animation classification.
//!
//! Decides, for an animated property, whether the compositor could play the
//! animation without the UI thread. The walk starts at the node that owns
//! the property and climbs through wrapper objects (transforms, transform
//! collections, projections, clip geometry, transition proxies) until it
//! reaches a visual. Only a short allow-list of (visual, slot) pairs is
//! independent:
//!
//! - `Opacity` on a visual
//! - `Canvas.Left` / `Canvas.Top` on a visual whose parent is a canvas
//! - transform components reached through `RenderTransform`, `Projection`,
//!   `Transform3D` or a rectangular `Clip`
//! - transition-proxy opacity, transform and clip
//!
//! The result is recomputed every tick because targets can be reparented.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::scene::{NodeId, NodeKind, PropertyId, SceneGraph, WeakNode};

/// What part of a visual an independent animation drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndependentKind {
    /// Record for an animated sub-object rather than a visual.
    None,
    Offset,
    ElementOpacity,
    ElementTransform,
    ElementProjection,
    ElementTransform3D,
    ElementClip,
    TransitionOpacity,
    TransitionTransform,
    TransitionClip,
}

/// One visual (or sub-object) an independent animation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndependentTarget {
    pub kind: IndependentKind,
    pub target: WeakNode,
}

/// Outcome of classifying one animated property.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    pub independent: bool,
    pub targets: Vec<IndependentTarget>,
}

const MAX_DEPTH: usize = 64;

/// Classify the animation of `property` on `target`.
pub fn find_independent_targets(
    scene: &dyn SceneGraph,
    target: NodeId,
    property: PropertyId,
) -> Classification {
    let mut targets = Vec::new();
    let mut independent = find_recursive(scene, target, None, property, None, &mut targets, 0);
    independent = independent && !targets.is_empty();

    if independent && !scene.kind_of(target).is_some_and(NodeKind::is_visual) {
        targets.push(IndependentTarget {
            kind: IndependentKind::None,
            target: scene.downgrade(target),
        });
    }

    trace!(
        node = %scene.debug_label(target),
        property = property.name(),
        independent,
        "classified animation"
    );

    if !independent {
        targets.clear();
    }
    Classification {
        independent,
        targets,
    }
}

/// Visual slot holding `child`, if it is one of the independent ones.
fn visual_slot_kind(
    scene: &dyn SceneGraph,
    visual: NodeId,
    child: NodeId,
) -> Option<IndependentKind> {
    const SLOTS: [(PropertyId, IndependentKind); 4] = [
        (PropertyId::RenderTransform, IndependentKind::ElementTransform),
        (PropertyId::Projection, IndependentKind::ElementProjection),
        (PropertyId::Transform3D, IndependentKind::ElementTransform3D),
        (PropertyId::Clip, IndependentKind::ElementClip),
    ];
    SLOTS
        .iter()
        .find(|(slot, _)| holds(scene, visual, *slot, child))
        .map(|(_, kind)| *kind)
}

fn holds(scene: &dyn SceneGraph, owner: NodeId, slot: PropertyId, child: NodeId) -> bool {
    scene.value(owner, slot).and_then(|v| v.as_node()) == Some(child)
}

fn find_recursive(
    scene: &dyn SceneGraph,
    object: NodeId,
    sender: Option<NodeId>,
    property: PropertyId,
    pending: Option<IndependentKind>,
    targets: &mut Vec<IndependentTarget>,
    depth: usize,
) -> bool {
    if depth > MAX_DEPTH {
        return false;
    }
    let Some(kind) = scene.kind_of(object) else {
        return false;
    };

    if kind.is_visual() {
        let found = match sender {
            None => match property {
                PropertyId::Opacity => Some(IndependentKind::ElementOpacity),
                PropertyId::CanvasLeft | PropertyId::CanvasTop => scene
                    .parent(object)
                    .filter(|&p| scene.is_of_kind(p, NodeKind::Canvas))
                    .map(|_| IndependentKind::Offset),
                _ => None,
            },
            Some(child) => visual_slot_kind(scene, object, child).or_else(|| {
                scene
                    .is_of_kind(child, NodeKind::TransitionTarget)
                    .then_some(pending)
                    .flatten()
            }),
        };

        return match found {
            Some(kind) => {
                targets.push(IndependentTarget {
                    kind,
                    target: scene.downgrade(object),
                });
                true
            }
            None => false,
        };
    }

    match kind {
        NodeKind::TransitionTarget => {
            let tag = match sender {
                None => (property == PropertyId::TransitionOpacity)
                    .then_some(IndependentKind::TransitionOpacity),
                Some(child)
                    if holds(scene, object, PropertyId::TransitionCompositeTransform, child) =>
                {
                    Some(IndependentKind::TransitionTransform)
                }
                Some(child) if holds(scene, object, PropertyId::TransitionClipTransform, child) => {
                    Some(IndependentKind::TransitionClip)
                }
                Some(_) => None,
            };
            match tag {
                Some(tag) => check_parents(scene, object, property, Some(tag), targets, depth),
                None => false,
            }
        }
        NodeKind::TransformCollection
        | NodeKind::PlaneProjection
        | NodeKind::CompositeTransform3D => {
            if sender.is_none() && !property.is_transform_component() {
                return false;
            }
            check_parents(scene, object, property, pending, targets, depth)
        }
        NodeKind::RectangleGeometry => {
            if sender.is_none() {
                return false;
            }
            check_parents(scene, object, property, pending, targets, depth)
        }
        NodeKind::ResourceDictionary => true,
        k if k.is_transform() => {
            if sender.is_none() && !property.is_transform_component() {
                return false;
            }
            check_parents(scene, object, property, pending, targets, depth)
        }
        _ => false,
    }
}

fn check_parents(
    scene: &dyn SceneGraph,
    object: NodeId,
    property: PropertyId,
    pending: Option<IndependentKind>,
    targets: &mut Vec<IndependentTarget>,
    depth: usize,
) -> bool {
    let found = match scene.parent(object) {
        Some(parent) => find_recursive(
            scene,
            parent,
            Some(object),
            property,
            pending,
            targets,
            depth + 1,
        ),
        None => false,
    };

    // A transition proxy not yet attached to a visual still animates independently.
    if !found && scene.is_of_kind(object, NodeKind::TransitionTarget) {
        targets.push(IndependentTarget {
            kind: IndependentKind::None,
            target: scene.downgrade(object),
        });
        return true;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneTree;

    fn kinds(c: &Classification) -> Vec<IndependentKind> {
        c.targets.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_opacity_is_independent() {
        let mut scene = SceneTree::new();
        let panel = scene.create(NodeKind::StackPanel);
        let element = scene.create_child(panel, NodeKind::Element);

        let c = find_independent_targets(&scene, element, PropertyId::Opacity);
        assert!(c.independent);
        assert_eq!(kinds(&c), vec![IndependentKind::ElementOpacity]);
        assert_eq!(c.targets[0].target, scene.downgrade(element));
    }

    #[test]
    fn test_canvas_offset_requires_canvas_parent() {
        let mut scene = SceneTree::new();
        let stack = scene.create(NodeKind::StackPanel);
        let in_stack = scene.create_child(stack, NodeKind::Element);
        let canvas = scene.create(NodeKind::Canvas);
        let in_canvas = scene.create_child(canvas, NodeKind::Element);

        let c = find_independent_targets(&scene, in_stack, PropertyId::CanvasLeft);
        assert!(!c.independent);
        assert!(c.targets.is_empty());

        let c = find_independent_targets(&scene, in_canvas, PropertyId::CanvasTop);
        assert!(c.independent);
        assert_eq!(kinds(&c), vec![IndependentKind::Offset]);
    }

    #[test]
    fn test_other_visual_properties_are_dependent() {
        let mut scene = SceneTree::new();
        let element = scene.create(NodeKind::Element);
        assert!(!find_independent_targets(&scene, element, PropertyId::Width).independent);

        let brush = scene.create(NodeKind::SolidColorBrush);
        assert!(!find_independent_targets(&scene, brush, PropertyId::BrushColor).independent);
    }

    #[test]
    fn test_render_transform_component() {
        let mut scene = SceneTree::new();
        let element = scene.create(NodeKind::Element);
        let translate = scene.create(NodeKind::TranslateTransform);
        scene
            .set_value(element, PropertyId::RenderTransform, translate.into())
            .unwrap();

        let c = find_independent_targets(&scene, translate, PropertyId::TranslateX);
        assert!(c.independent);
        assert_eq!(
            kinds(&c),
            vec![IndependentKind::ElementTransform, IndependentKind::None]
        );
        assert_eq!(c.targets[1].target, scene.downgrade(translate));
    }

    #[test]
    fn test_transform_group_chain() {
        let mut scene = SceneTree::new();
        let element = scene.create(NodeKind::Element);
        let group = scene.create(NodeKind::TransformGroup);
        let items = scene.create(NodeKind::TransformCollection);
        let rotate = scene.create_child(items, NodeKind::RotateTransform);
        scene
            .set_value(group, PropertyId::TransformGroupChildren, items.into())
            .unwrap();
        scene
            .set_value(element, PropertyId::RenderTransform, group.into())
            .unwrap();

        let c = find_independent_targets(&scene, rotate, PropertyId::Angle);
        assert!(c.independent);
        assert_eq!(c.targets[0].kind, IndependentKind::ElementTransform);
        assert_eq!(c.targets[0].target, scene.downgrade(element));
    }

    #[test]
    fn test_projection_and_clip() {
        let mut scene = SceneTree::new();
        let element = scene.create(NodeKind::Element);
        let projection = scene.create(NodeKind::PlaneProjection);
        scene
            .set_value(element, PropertyId::Projection, projection.into())
            .unwrap();
        let c = find_independent_targets(&scene, projection, PropertyId::ProjectionRotationY);
        assert_eq!(c.targets[0].kind, IndependentKind::ElementProjection);

        let clip = scene.create(NodeKind::RectangleGeometry);
        let scale = scene.create(NodeKind::ScaleTransform);
        scene.set_value(clip, PropertyId::GeometryTransform, scale.into()).unwrap();
        scene.set_value(element, PropertyId::Clip, clip.into()).unwrap();
        let c = find_independent_targets(&scene, scale, PropertyId::ScaleX);
        assert!(c.independent);
        assert_eq!(c.targets[0].kind, IndependentKind::ElementClip);
    }

    #[test]
    fn test_detached_transform_is_dependent() {
        let mut scene = SceneTree::new();
        let translate = scene.create(NodeKind::TranslateTransform);
        assert!(!find_independent_targets(&scene, translate, PropertyId::TranslateY).independent);
    }

    #[test]
    fn test_resource_dictionary_without_visual() {
        let mut scene = SceneTree::new();
        let resources = scene.create(NodeKind::ResourceDictionary);
        let translate = scene.create_child(resources, NodeKind::TranslateTransform);

        // Provisionally independent, but no visual was found to record.
        let c = find_independent_targets(&scene, translate, PropertyId::TranslateX);
        assert!(!c.independent);
    }

    #[test]
    fn test_transition_target() {
        let mut scene = SceneTree::new();
        let proxy = scene.create(NodeKind::TransitionTarget);
        let c = find_independent_targets(&scene, proxy, PropertyId::TransitionOpacity);
        assert!(c.independent);
        assert_eq!(kinds(&c), vec![IndependentKind::None, IndependentKind::None]);

        let element = scene.create(NodeKind::Element);
        scene.add_child(element, proxy);
        let c = find_independent_targets(&scene, proxy, PropertyId::TransitionOpacity);
        assert_eq!(c.targets[0].kind, IndependentKind::TransitionOpacity);
        assert_eq!(c.targets[0].target, scene.downgrade(element));

        let composite = scene.create(NodeKind::CompositeTransform);
        scene
            .set_value(proxy, PropertyId::TransitionCompositeTransform, composite.into())
            .unwrap();
        let c = find_independent_targets(&scene, composite, PropertyId::CompositeTranslateX);
        assert_eq!(c.targets[0].kind, IndependentKind::TransitionTransform);
    }

    #[test]
    fn test_stale_target_is_dependent() {
        let mut scene = SceneTree::new();
        let element = scene.create(NodeKind::Element);
        scene.remove(element);
        assert!(!find_independent_targets(&scene, element, PropertyId::Opacity).independent);
    }
}
