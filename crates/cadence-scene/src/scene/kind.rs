//! Node kinds and the derivation relation between them.

use serde::{Deserialize, Serialize};

/// Kind of a scene-graph node.
///
/// Abstract kinds (`UIElement`, `Panel`, `Transform`, `Geometry`) are never
/// instantiated directly; they exist so callers can ask "is this node a
/// transform" without enumerating every concrete transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    // Visuals
    UIElement,
    Element,
    Panel,
    Canvas,
    StackPanel,

    // Transforms
    Transform,
    TranslateTransform,
    ScaleTransform,
    RotateTransform,
    SkewTransform,
    CompositeTransform,
    TransformGroup,
    TransformCollection,

    // 3-D
    PlaneProjection,
    CompositeTransform3D,

    // Geometry
    Geometry,
    RectangleGeometry,

    // Brushes
    SolidColorBrush,

    // Internal proxies and containers
    TransitionTarget,
    ResourceDictionary,
}

impl NodeKind {
    /// Immediate base kind, if any.
    pub fn base(self) -> Option<NodeKind> {
        use NodeKind::*;
        match self {
            Element | Panel => Some(UIElement),
            Canvas | StackPanel => Some(Panel),
            TranslateTransform | ScaleTransform | RotateTransform | SkewTransform
            | CompositeTransform | TransformGroup => Some(Transform),
            RectangleGeometry => Some(Geometry),
            _ => None,
        }
    }

    /// Returns true if `self` is `other` or derives from it.
    pub fn derives_from(self, other: NodeKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.base();
        }
        false
    }

    pub fn is_visual(self) -> bool {
        self.derives_from(NodeKind::UIElement)
    }

    pub fn is_transform(self) -> bool {
        self.derives_from(NodeKind::Transform)
    }

    /// Type name as written in qualified property paths, e.g. `TranslateTransform`.
    pub fn type_name(self) -> &'static str {
        use NodeKind::*;
        match self {
            UIElement => "UIElement",
            Element => "FrameworkElement",
            Panel => "Panel",
            Canvas => "Canvas",
            StackPanel => "StackPanel",
            Transform => "Transform",
            TranslateTransform => "TranslateTransform",
            ScaleTransform => "ScaleTransform",
            RotateTransform => "RotateTransform",
            SkewTransform => "SkewTransform",
            CompositeTransform => "CompositeTransform",
            TransformGroup => "TransformGroup",
            TransformCollection => "TransformCollection",
            PlaneProjection => "PlaneProjection",
            CompositeTransform3D => "CompositeTransform3D",
            Geometry => "Geometry",
            RectangleGeometry => "RectangleGeometry",
            SolidColorBrush => "SolidColorBrush",
            TransitionTarget => "TransitionTarget",
            ResourceDictionary => "ResourceDictionary",
        }
    }

    /// Look up a kind by its path type name.
    pub fn from_type_name(name: &str) -> Option<NodeKind> {
        ALL_KINDS.iter().copied().find(|k| k.type_name() == name)
    }
}

const ALL_KINDS: &[NodeKind] = &[
    NodeKind::UIElement,
    NodeKind::Element,
    NodeKind::Panel,
    NodeKind::Canvas,
    NodeKind::StackPanel,
    NodeKind::Transform,
    NodeKind::TranslateTransform,
    NodeKind::ScaleTransform,
    NodeKind::RotateTransform,
    NodeKind::SkewTransform,
    NodeKind::CompositeTransform,
    NodeKind::TransformGroup,
    NodeKind::TransformCollection,
    NodeKind::PlaneProjection,
    NodeKind::CompositeTransform3D,
    NodeKind::Geometry,
    NodeKind::RectangleGeometry,
    NodeKind::SolidColorBrush,
    NodeKind::TransitionTarget,
    NodeKind::ResourceDictionary,
];
