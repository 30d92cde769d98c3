//! Animatable property identities.
//!
//! Each [`PropertyId`] names one property slot on one declaring node kind.
//! Names are not unique on their own (`CenterX` exists on several
//! transforms), so path lookup always goes through the owner kind.

use serde::{Deserialize, Serialize};

use super::kind::NodeKind;
use crate::animation::types::AnimatableValueType;

/// Identity of an animatable property slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyId {
    // UIElement
    Opacity,
    Width,
    Height,
    Visibility,
    RenderTransform,
    RenderTransformOrigin,
    Projection,
    Transform3D,
    Clip,

    // Attached layout
    CanvasLeft,
    CanvasTop,

    // Panel
    Background,

    // TranslateTransform
    TranslateX,
    TranslateY,

    // ScaleTransform
    ScaleX,
    ScaleY,
    ScaleCenterX,
    ScaleCenterY,

    // RotateTransform
    Angle,
    RotateCenterX,
    RotateCenterY,

    // SkewTransform
    SkewAngleX,
    SkewAngleY,
    SkewCenterX,
    SkewCenterY,

    // CompositeTransform
    CompositeCenterX,
    CompositeCenterY,
    CompositeScaleX,
    CompositeScaleY,
    CompositeSkewX,
    CompositeSkewY,
    CompositeRotation,
    CompositeTranslateX,
    CompositeTranslateY,

    // TransformGroup
    TransformGroupChildren,

    // PlaneProjection
    ProjectionRotationX,
    ProjectionRotationY,
    ProjectionRotationZ,
    ProjectionCenterOfRotationX,
    ProjectionCenterOfRotationY,
    ProjectionCenterOfRotationZ,
    ProjectionGlobalOffsetX,
    ProjectionGlobalOffsetY,
    ProjectionGlobalOffsetZ,
    ProjectionLocalOffsetX,
    ProjectionLocalOffsetY,
    ProjectionLocalOffsetZ,

    // CompositeTransform3D
    Transform3DRotationX,
    Transform3DRotationY,
    Transform3DRotationZ,
    Transform3DScaleX,
    Transform3DScaleY,
    Transform3DScaleZ,
    Transform3DTranslateX,
    Transform3DTranslateY,
    Transform3DTranslateZ,

    // RectangleGeometry
    GeometryTransform,

    // SolidColorBrush
    BrushColor,

    // TransitionTarget
    TransitionOpacity,
    TransitionCompositeTransform,
    TransitionClipTransform,
}

/// Static description of a property slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub declaring_kind: NodeKind,
    pub value_type: AnimatableValueType,
    /// Attached properties may be set on any visual, not only the declaring kind.
    pub attached: bool,
}

const fn desc(
    name: &'static str,
    declaring_kind: NodeKind,
    value_type: AnimatableValueType,
) -> PropertyDescriptor {
    PropertyDescriptor {
        name,
        declaring_kind,
        value_type,
        attached: false,
    }
}

impl PropertyId {
    pub const ALL: &'static [PropertyId] = &[
        PropertyId::Opacity,
        PropertyId::Width,
        PropertyId::Height,
        PropertyId::Visibility,
        PropertyId::RenderTransform,
        PropertyId::RenderTransformOrigin,
        PropertyId::Projection,
        PropertyId::Transform3D,
        PropertyId::Clip,
        PropertyId::CanvasLeft,
        PropertyId::CanvasTop,
        PropertyId::Background,
        PropertyId::TranslateX,
        PropertyId::TranslateY,
        PropertyId::ScaleX,
        PropertyId::ScaleY,
        PropertyId::ScaleCenterX,
        PropertyId::ScaleCenterY,
        PropertyId::Angle,
        PropertyId::RotateCenterX,
        PropertyId::RotateCenterY,
        PropertyId::SkewAngleX,
        PropertyId::SkewAngleY,
        PropertyId::SkewCenterX,
        PropertyId::SkewCenterY,
        PropertyId::CompositeCenterX,
        PropertyId::CompositeCenterY,
        PropertyId::CompositeScaleX,
        PropertyId::CompositeScaleY,
        PropertyId::CompositeSkewX,
        PropertyId::CompositeSkewY,
        PropertyId::CompositeRotation,
        PropertyId::CompositeTranslateX,
        PropertyId::CompositeTranslateY,
        PropertyId::TransformGroupChildren,
        PropertyId::ProjectionRotationX,
        PropertyId::ProjectionRotationY,
        PropertyId::ProjectionRotationZ,
        PropertyId::ProjectionCenterOfRotationX,
        PropertyId::ProjectionCenterOfRotationY,
        PropertyId::ProjectionCenterOfRotationZ,
        PropertyId::ProjectionGlobalOffsetX,
        PropertyId::ProjectionGlobalOffsetY,
        PropertyId::ProjectionGlobalOffsetZ,
        PropertyId::ProjectionLocalOffsetX,
        PropertyId::ProjectionLocalOffsetY,
        PropertyId::ProjectionLocalOffsetZ,
        PropertyId::Transform3DRotationX,
        PropertyId::Transform3DRotationY,
        PropertyId::Transform3DRotationZ,
        PropertyId::Transform3DScaleX,
        PropertyId::Transform3DScaleY,
        PropertyId::Transform3DScaleZ,
        PropertyId::Transform3DTranslateX,
        PropertyId::Transform3DTranslateY,
        PropertyId::Transform3DTranslateZ,
        PropertyId::GeometryTransform,
        PropertyId::BrushColor,
        PropertyId::TransitionOpacity,
        PropertyId::TransitionCompositeTransform,
        PropertyId::TransitionClipTransform,
    ];

    /// Returns the static descriptor for this property.
    pub fn descriptor(self) -> PropertyDescriptor {
        use AnimatableValueType::{Color, F64, Object, Point};
        use NodeKind as K;
        use PropertyId::*;
        match self {
            Opacity => desc("Opacity", K::UIElement, F64),
            Width => desc("Width", K::UIElement, F64),
            Height => desc("Height", K::UIElement, F64),
            Visibility => desc("Visibility", K::UIElement, Object),
            RenderTransform => desc("RenderTransform", K::UIElement, Object),
            RenderTransformOrigin => desc("RenderTransformOrigin", K::UIElement, Point),
            Projection => desc("Projection", K::UIElement, Object),
            Transform3D => desc("Transform3D", K::UIElement, Object),
            Clip => desc("Clip", K::UIElement, Object),
            CanvasLeft => PropertyDescriptor {
                attached: true,
                ..desc("Left", K::Canvas, F64)
            },
            CanvasTop => PropertyDescriptor {
                attached: true,
                ..desc("Top", K::Canvas, F64)
            },
            Background => desc("Background", K::Panel, Color),
            TranslateX => desc("X", K::TranslateTransform, F64),
            TranslateY => desc("Y", K::TranslateTransform, F64),
            ScaleX => desc("ScaleX", K::ScaleTransform, F64),
            ScaleY => desc("ScaleY", K::ScaleTransform, F64),
            ScaleCenterX => desc("CenterX", K::ScaleTransform, F64),
            ScaleCenterY => desc("CenterY", K::ScaleTransform, F64),
            Angle => desc("Angle", K::RotateTransform, F64),
            RotateCenterX => desc("CenterX", K::RotateTransform, F64),
            RotateCenterY => desc("CenterY", K::RotateTransform, F64),
            SkewAngleX => desc("AngleX", K::SkewTransform, F64),
            SkewAngleY => desc("AngleY", K::SkewTransform, F64),
            SkewCenterX => desc("CenterX", K::SkewTransform, F64),
            SkewCenterY => desc("CenterY", K::SkewTransform, F64),
            CompositeCenterX => desc("CenterX", K::CompositeTransform, F64),
            CompositeCenterY => desc("CenterY", K::CompositeTransform, F64),
            CompositeScaleX => desc("ScaleX", K::CompositeTransform, F64),
            CompositeScaleY => desc("ScaleY", K::CompositeTransform, F64),
            CompositeSkewX => desc("SkewX", K::CompositeTransform, F64),
            CompositeSkewY => desc("SkewY", K::CompositeTransform, F64),
            CompositeRotation => desc("Rotation", K::CompositeTransform, F64),
            CompositeTranslateX => desc("TranslateX", K::CompositeTransform, F64),
            CompositeTranslateY => desc("TranslateY", K::CompositeTransform, F64),
            TransformGroupChildren => desc("Children", K::TransformGroup, Object),
            ProjectionRotationX => desc("RotationX", K::PlaneProjection, F64),
            ProjectionRotationY => desc("RotationY", K::PlaneProjection, F64),
            ProjectionRotationZ => desc("RotationZ", K::PlaneProjection, F64),
            ProjectionCenterOfRotationX => desc("CenterOfRotationX", K::PlaneProjection, F64),
            ProjectionCenterOfRotationY => desc("CenterOfRotationY", K::PlaneProjection, F64),
            ProjectionCenterOfRotationZ => desc("CenterOfRotationZ", K::PlaneProjection, F64),
            ProjectionGlobalOffsetX => desc("GlobalOffsetX", K::PlaneProjection, F64),
            ProjectionGlobalOffsetY => desc("GlobalOffsetY", K::PlaneProjection, F64),
            ProjectionGlobalOffsetZ => desc("GlobalOffsetZ", K::PlaneProjection, F64),
            ProjectionLocalOffsetX => desc("LocalOffsetX", K::PlaneProjection, F64),
            ProjectionLocalOffsetY => desc("LocalOffsetY", K::PlaneProjection, F64),
            ProjectionLocalOffsetZ => desc("LocalOffsetZ", K::PlaneProjection, F64),
            Transform3DRotationX => desc("RotationX", K::CompositeTransform3D, F64),
            Transform3DRotationY => desc("RotationY", K::CompositeTransform3D, F64),
            Transform3DRotationZ => desc("RotationZ", K::CompositeTransform3D, F64),
            Transform3DScaleX => desc("ScaleX", K::CompositeTransform3D, F64),
            Transform3DScaleY => desc("ScaleY", K::CompositeTransform3D, F64),
            Transform3DScaleZ => desc("ScaleZ", K::CompositeTransform3D, F64),
            Transform3DTranslateX => desc("TranslateX", K::CompositeTransform3D, F64),
            Transform3DTranslateY => desc("TranslateY", K::CompositeTransform3D, F64),
            Transform3DTranslateZ => desc("TranslateZ", K::CompositeTransform3D, F64),
            GeometryTransform => desc("Transform", K::Geometry, Object),
            BrushColor => desc("Color", K::SolidColorBrush, Color),
            TransitionOpacity => desc("Opacity", K::TransitionTarget, F64),
            TransitionCompositeTransform => {
                desc("CompositeTransform", K::TransitionTarget, Object)
            }
            TransitionClipTransform => desc("ClipTransform", K::TransitionTarget, Object),
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn value_type(self) -> AnimatableValueType {
        self.descriptor().value_type
    }

    /// Returns true if the property may be read or written on a node of `kind`.
    pub fn applies_to(self, kind: NodeKind) -> bool {
        let d = self.descriptor();
        kind.derives_from(d.declaring_kind) || (d.attached && kind.is_visual())
    }

    /// Returns true for numeric components of a transform, projection or 3-D transform.
    pub fn is_transform_component(self) -> bool {
        let d = self.descriptor();
        d.value_type == AnimatableValueType::F64
            && (d.declaring_kind.is_transform()
                || matches!(
                    d.declaring_kind,
                    NodeKind::PlaneProjection | NodeKind::CompositeTransform3D
                ))
    }

    /// Find the property called `name` that applies to a node of `kind`.
    ///
    /// `qualifier` restricts the search to properties declared on that kind,
    /// as written in `(Owner.Name)` path segments.
    pub fn lookup(kind: NodeKind, qualifier: Option<NodeKind>, name: &str) -> Option<PropertyId> {
        Self::ALL.iter().copied().find(|p| {
            let d = p.descriptor();
            d.name == name
                && p.applies_to(kind)
                && qualifier.is_none_or(|q| q.derives_from(d.declaring_kind))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_disambiguates_by_owner() {
        assert_eq!(
            PropertyId::lookup(NodeKind::ScaleTransform, None, "CenterX"),
            Some(PropertyId::ScaleCenterX)
        );
        assert_eq!(
            PropertyId::lookup(NodeKind::RotateTransform, None, "CenterX"),
            Some(PropertyId::RotateCenterX)
        );
        assert_eq!(PropertyId::lookup(NodeKind::Element, None, "CenterX"), None);
    }

    #[test]
    fn test_attached_properties_apply_to_any_visual() {
        assert!(PropertyId::CanvasLeft.applies_to(NodeKind::Element));
        assert!(PropertyId::CanvasLeft.applies_to(NodeKind::StackPanel));
        assert!(!PropertyId::CanvasLeft.applies_to(NodeKind::TranslateTransform));
        assert_eq!(
            PropertyId::lookup(NodeKind::Element, Some(NodeKind::Canvas), "Left"),
            Some(PropertyId::CanvasLeft)
        );
    }

    #[test]
    fn test_qualified_lookup_through_base_kind() {
        assert_eq!(
            PropertyId::lookup(NodeKind::Canvas, Some(NodeKind::UIElement), "Opacity"),
            Some(PropertyId::Opacity)
        );
        assert_eq!(
            PropertyId::lookup(NodeKind::Canvas, Some(NodeKind::TranslateTransform), "Opacity"),
            None
        );
    }

    #[test]
    fn test_transform_components() {
        assert!(PropertyId::TranslateX.is_transform_component());
        assert!(PropertyId::ProjectionRotationY.is_transform_component());
        assert!(PropertyId::Transform3DTranslateZ.is_transform_component());
        assert!(!PropertyId::Opacity.is_transform_component());
        assert!(!PropertyId::TransformGroupChildren.is_transform_component());
    }

    #[test]
    fn test_all_is_exhaustive() {
        let mut names = std::collections::HashSet::new();
        for p in PropertyId::ALL {
            assert!(names.insert(*p));
        }
        assert_eq!(names.len(), 61);
    }
}
