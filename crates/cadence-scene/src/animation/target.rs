//! Target resolution for animation leaves.
//!
//! Target name, property path and manual overrides are inherited: each is
//! taken from the nearest node in the ancestor chain that sets it. A
//! `Dynamic` container above the leaf switches name lookup to its
//! template's namescope.

use tracing::trace;

use super::manager::TimeManager;
use super::timeline::ContainerKind;
use super::types::TimelineId;
use crate::error::{ErrorCode, Result, TimingError};
use crate::scene::{NameScopeKind, NodeId, PropertyId, PropertyPath, SceneGraph, WeakNode};

/// Targeting attributes collected up the ancestor chain.
#[derive(Debug, Default)]
struct InheritedTarget {
    manual_target: Option<WeakNode>,
    manual_property: Option<PropertyId>,
    name: Option<String>,
    path: Option<String>,
    template_owner: Option<WeakNode>,
}

impl TimeManager {
    fn inherited_target(&self, id: TimelineId) -> Result<InheritedTarget> {
        let mut found = InheritedTarget::default();
        for node in self.ancestry(id)? {
            let node = self.node(node)?;
            let spec = node.target();
            found.manual_target = found.manual_target.or(spec.manual_target);
            found.manual_property = found.manual_property.or(spec.manual_property);
            if found.name.is_none() {
                found.name = spec.target_name.clone().filter(|n| !n.is_empty());
            }
            if found.path.is_none() {
                found.path = spec.target_property.clone().filter(|p| !p.is_empty());
            }
            if let (None, Some(ContainerKind::Dynamic { template_owner })) =
                (found.template_owner, node.container_kind())
            {
                found.template_owner = *template_owner;
            }
        }
        Ok(found)
    }

    /// Resolve the node and property a leaf animates.
    ///
    /// `Ok(None)` means no target or no property was specified anywhere up
    /// the chain, or a manually set target no longer exists. A name that
    /// does not resolve is always reported as an error, never a panic.
    pub(crate) fn resolve_target(
        &self,
        id: TimelineId,
        scene: &dyn SceneGraph,
    ) -> Result<Option<(NodeId, PropertyId)>> {
        let inherited = self.inherited_target(id)?;

        let target = match (inherited.manual_target, &inherited.name) {
            (Some(weak), _) => scene.upgrade(weak),
            (None, Some(name)) => {
                let owner = inherited.template_owner.and_then(|w| scene.upgrade(w));
                let scope = if owner.is_some() {
                    NameScopeKind::Template
                } else {
                    NameScopeKind::Standard
                };
                let found = scene.find_named_object(name, owner, scope);
                if found.is_none() {
                    return Err(TimingError::invalid_operation(
                        ErrorCode::SbBeginInvalidTarget,
                        format!("cannot resolve target name {name:?}"),
                    ));
                }
                found
            }
            (None, None) => None,
        };
        let Some(target) = target else {
            return Ok(None);
        };

        if let Some(property) = inherited.manual_property {
            return Ok(Some((target, property)));
        }
        let Some(path) = inherited.path else {
            return Ok(None);
        };

        match PropertyPath::parse(&path).and_then(|p| p.resolve(scene, target)) {
            Ok(resolved) => {
                trace!(
                    timeline = id.0,
                    path = %path,
                    node = %scene.debug_label(resolved.0),
                    property = resolved.1.name(),
                    "target resolved"
                );
                Ok(Some(resolved))
            }
            Err(err) => self.policy.errors.report(TimingError::invalid_operation(
                ErrorCode::SbBeginInvalidProp,
                format!(
                    "cannot resolve property path {path:?} on {}: {err}",
                    scene.debug_label(target)
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::leaf::{FromToByAnimation, LeafSource};
    use crate::animation::manager::TimingPolicy;
    use crate::animation::test_support::Fixture;
    use crate::animation::timeline::TimingProperties;
    use crate::animation::types::ObjectValue;
    use crate::scene::NodeKind;

    fn leaf(manager: &mut TimeManager) -> TimelineId {
        let source = LeafSource::FromToBy(FromToByAnimation::to(1.0.into()).unwrap());
        manager
            .create_animation(TimingProperties::with_duration(1.0), source)
            .unwrap()
    }

    #[test]
    fn test_name_and_path_inherited_from_parent() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(element, "box");
        let mut manager = TimeManager::default();
        let storyboard = manager.create_storyboard(TimingProperties::default());
        manager.set_target_name(storyboard, "box").unwrap();
        let child = leaf(&mut manager);
        manager.set_target_property(child, "(Canvas.Left)").unwrap();
        manager.add_child(storyboard, child).unwrap();

        assert_eq!(
            manager.resolve_target(child, &fx.scene).unwrap(),
            Some((element, PropertyId::CanvasLeft))
        );
        // Resolution has no side effects and can be repeated.
        assert_eq!(
            manager.resolve_target(child, &fx.scene).unwrap(),
            Some((element, PropertyId::CanvasLeft))
        );
    }

    #[test]
    fn test_resolution_stable_across_no_op_changes() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(element, "box");
        let mut manager = TimeManager::default();
        let storyboard = manager.create_storyboard(TimingProperties::default());
        manager.set_target_name(storyboard, "box").unwrap();
        let child = leaf(&mut manager);
        manager.set_target_property(child, "Opacity").unwrap();
        manager.add_child(storyboard, child).unwrap();

        let before = manager.resolve_target(child, &fx.scene).unwrap();
        assert_eq!(before, Some((element, PropertyId::Opacity)));

        fx.scene.set_name(element, "box");
        manager.set_target_name(storyboard, "box").unwrap();
        let unrelated = leaf(&mut manager);
        manager.add_child(storyboard, unrelated).unwrap();
        manager.remove_child(storyboard, unrelated).unwrap();
        let sibling = fx.scene.create(NodeKind::Element);
        fx.scene.remove(sibling);

        assert_eq!(manager.resolve_target(child, &fx.scene).unwrap(), before);
    }

    #[test]
    fn test_nearest_name_wins() {
        let mut fx = Fixture::new();
        let outer = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(outer, "outer");
        let inner = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(inner, "inner");
        let mut manager = TimeManager::default();
        let storyboard = manager.create_storyboard(TimingProperties::default());
        manager.set_target_name(storyboard, "outer").unwrap();
        let child = leaf(&mut manager);
        manager.set_target_name(child, "inner").unwrap();
        manager.set_target_property(child, "Opacity").unwrap();
        manager.add_child(storyboard, child).unwrap();

        assert_eq!(
            manager.resolve_target(child, &fx.scene).unwrap(),
            Some((inner, PropertyId::Opacity))
        );
    }

    #[test]
    fn test_path_through_sub_object() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(element, "box");
        let translate = fx.scene.create(NodeKind::TranslateTransform);
        fx.scene
            .set_value(
                element,
                PropertyId::RenderTransform,
                ObjectValue::Node { node: translate }.into(),
            )
            .unwrap();
        let mut manager = TimeManager::default();
        let child = leaf(&mut manager);
        manager.set_target_name(child, "box").unwrap();
        manager
            .set_target_property(child, "(UIElement.RenderTransform).(TranslateTransform.X)")
            .unwrap();

        assert_eq!(
            manager.resolve_target(child, &fx.scene).unwrap(),
            Some((translate, PropertyId::TranslateX))
        );
    }

    #[test]
    fn test_manual_target_wins() {
        let mut fx = Fixture::new();
        let named = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(named, "box");
        let manual = fx.scene.create(NodeKind::Element);
        let mut manager = TimeManager::default();
        let child = leaf(&mut manager);
        manager.set_target_name(child, "box").unwrap();
        manager.set_target_property(child, "Opacity").unwrap();
        manager.set_manual_target(child, manual, PropertyId::Width).unwrap();

        assert_eq!(
            manager.resolve_target(child, &fx.scene).unwrap(),
            Some((manual, PropertyId::Width))
        );

        fx.scene.remove(manual);
        assert_eq!(manager.resolve_target(child, &fx.scene).unwrap(), None);
    }

    #[test]
    fn test_template_scope_through_dynamic_container() {
        let mut fx = Fixture::new();
        let page_item = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(page_item, "part");
        let owner = fx.scene.create(NodeKind::Element);
        let template_item = fx.scene.create_child(owner, NodeKind::Element);
        fx.scene.set_name(template_item, "part");
        fx.scene.set_template_owner(template_item, owner);

        let mut manager = TimeManager::default();
        let proxy = manager.create_dynamic(TimingProperties::default(), Some(owner));
        let child = leaf(&mut manager);
        manager.set_target_name(child, "part").unwrap();
        manager.set_target_property(child, "Opacity").unwrap();
        manager.add_child(proxy, child).unwrap();

        assert_eq!(
            manager.resolve_target(child, &fx.scene).unwrap(),
            Some((template_item, PropertyId::Opacity))
        );

        let plain = leaf(&mut manager);
        manager.set_target_name(plain, "part").unwrap();
        manager.set_target_property(plain, "Opacity").unwrap();
        assert_eq!(
            manager.resolve_target(plain, &fx.scene).unwrap(),
            Some((page_item, PropertyId::Opacity))
        );
    }

    #[test]
    fn test_missing_name_is_recoverable_even_when_failing_fast() {
        let fx = Fixture::new();
        let mut manager = TimeManager::new(TimingPolicy::default().fail_fast());
        let child = leaf(&mut manager);
        manager.set_target_name(child, "nobody").unwrap();
        manager.set_target_property(child, "Opacity").unwrap();

        let err = manager.resolve_target(child, &fx.scene).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SbBeginInvalidTarget));
    }

    #[test]
    fn test_bad_path_reported() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(element, "box");
        let mut manager = TimeManager::default();
        let child = leaf(&mut manager);
        manager.set_target_name(child, "box").unwrap();
        manager.set_target_property(child, "(Canvas.Left").unwrap();

        let err = manager.resolve_target(child, &fx.scene).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SbBeginInvalidProp));

        manager.set_target_property(child, "Angle").unwrap();
        let err = manager.resolve_target(child, &fx.scene).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SbBeginInvalidProp));
    }

    #[test]
    #[should_panic(expected = "fail-fast")]
    fn test_bad_path_fails_fast() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(element, "box");
        let mut manager = TimeManager::new(TimingPolicy::default().fail_fast());
        let child = leaf(&mut manager);
        manager.set_target_name(child, "box").unwrap();
        manager.set_target_property(child, "Opacity.").unwrap();
        let _ = manager.resolve_target(child, &fx.scene);
    }

    #[test]
    fn test_no_target_or_property() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        fx.scene.set_name(element, "box");
        let mut manager = TimeManager::default();
        let child = leaf(&mut manager);
        assert_eq!(manager.resolve_target(child, &fx.scene).unwrap(), None);

        manager.set_target_name(child, "box").unwrap();
        assert_eq!(manager.resolve_target(child, &fx.scene).unwrap(), None);
    }
}
