//! Core timing types and animatable values.
//!
//! This module defines the fundamental types for the timing engine:
//! - `TimelineId`: Unique identifier for timeline nodes
//! - `Duration`, `RepeatBehavior`, `FillBehavior`: Timing attributes
//! - `ClockState`: Per-tick state of a clock
//! - `AnimatableValue`: Enum for all animatable property values

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::scene::NodeId;

/// Unique identifier for a timeline node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineId(pub u64);

impl TimelineId {
    /// Generate a new unique timeline ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TimelineId {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared length of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Duration {
    /// Resolved by the node kind: one second for simple animations, the last
    /// key time for key-frame animations, the union of children for containers.
    #[default]
    Automatic,
    /// Fixed span in seconds.
    TimeSpan { seconds: f64 },
    /// Never ends.
    Forever,
}

impl Duration {
    pub fn seconds(seconds: f64) -> Self {
        Self::TimeSpan { seconds }
    }

    pub fn is_zero_length(&self) -> bool {
        matches!(self, Self::TimeSpan { seconds } if *seconds == 0.0)
    }
}

/// Duration after `Automatic` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedDuration {
    TimeSpan { seconds: f64 },
    Forever,
}

impl ResolvedDuration {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            Self::TimeSpan { seconds } => Some(*seconds),
            Self::Forever => None,
        }
    }
}

/// How many times, or for how long, a node repeats its iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepeatBehavior {
    /// Repeat a (possibly fractional) number of times.
    Count { count: f64 },
    /// Repeat until this many seconds have elapsed.
    Duration { seconds: f64 },
    Forever,
}

impl Default for RepeatBehavior {
    fn default() -> Self {
        Self::Count { count: 1.0 }
    }
}

impl RepeatBehavior {
    pub fn is_zero_length(&self) -> bool {
        match self {
            Self::Count { count } => *count == 0.0,
            Self::Duration { seconds } => *seconds == 0.0,
            Self::Forever => false,
        }
    }
}

/// What a clock does after its active period ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillBehavior {
    /// Keep presenting the final value.
    #[default]
    HoldEnd,
    /// Go inactive and release the property.
    Stop,
}

/// Per-tick state of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClockState {
    #[default]
    NotStarted,
    Active,
    Filling,
    Stopped,
}

impl ClockState {
    /// State as reported to callers, which do not distinguish "not yet started".
    pub fn public(self) -> Self {
        match self {
            Self::NotStarted => Self::Active,
            other => other,
        }
    }
}

/// 2-D point value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Visibility state for elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Visible,
    Collapsed,
}

/// Values that only change discretely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectValue {
    Text { text: String },
    Boolean { value: bool },
    Integer { value: i64 },
    Visibility { value: Visibility },
    /// Reference to another scene node (a transform, a projection, ...).
    Node { node: NodeId },
}

/// Enum representing all animatable value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnimatableValue {
    /// Numeric value (opacity, offsets, transform components, ...)
    F64 { value: f64 },
    /// 2-D point.
    Point { point: Point },
    /// RGBA color value, components in [0, 1].
    Color { rgba: [f32; 4] },
    /// Discrete value.
    Object { value: ObjectValue },
}

impl AnimatableValue {
    pub fn value_type(&self) -> AnimatableValueType {
        match self {
            Self::F64 { .. } => AnimatableValueType::F64,
            Self::Point { .. } => AnimatableValueType::Point,
            Self::Color { .. } => AnimatableValueType::Color,
            Self::Object { .. } => AnimatableValueType::Object,
        }
    }

    /// Try to extract an f64 value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64 { value } => Some(*value),
            _ => None,
        }
    }

    /// Try to extract a point value.
    pub fn as_point(&self) -> Option<Point> {
        match self {
            Self::Point { point } => Some(*point),
            _ => None,
        }
    }

    /// Try to extract a color value.
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color { rgba } => Some(*rgba),
            _ => None,
        }
    }

    /// Try to extract a discrete value.
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object { value } => Some(value),
            _ => None,
        }
    }

    /// Try to extract a node reference.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Object {
                value: ObjectValue::Node { node },
            } => Some(*node),
            _ => None,
        }
    }

    /// Add a By-operand to this value using the value type's own addition.
    ///
    /// Returns `None` for mismatched types and for discrete values, which
    /// have no addition.
    pub fn add(&self, by: &AnimatableValue) -> Option<AnimatableValue> {
        match (self, by) {
            (Self::F64 { value: a }, Self::F64 { value: b }) => Some(Self::F64 { value: a + b }),
            (Self::Point { point: a }, Self::Point { point: b }) => Some(Self::Point {
                point: Point::new(a.x + b.x, a.y + b.y),
            }),
            (Self::Color { rgba: a }, Self::Color { rgba: b }) => Some(Self::Color {
                rgba: [
                    (a[0] + b[0]).clamp(0.0, 1.0),
                    (a[1] + b[1]).clamp(0.0, 1.0),
                    (a[2] + b[2]).clamp(0.0, 1.0),
                    (a[3] + b[3]).clamp(0.0, 1.0),
                ],
            }),
            _ => None,
        }
    }
}

impl From<f64> for AnimatableValue {
    fn from(v: f64) -> Self {
        Self::F64 { value: v }
    }
}

impl From<Point> for AnimatableValue {
    fn from(p: Point) -> Self {
        Self::Point { point: p }
    }
}

impl From<[f32; 4]> for AnimatableValue {
    fn from(c: [f32; 4]) -> Self {
        Self::Color { rgba: c }
    }
}

impl From<ObjectValue> for AnimatableValue {
    fn from(v: ObjectValue) -> Self {
        Self::Object { value: v }
    }
}

impl From<NodeId> for AnimatableValue {
    fn from(node: NodeId) -> Self {
        Self::Object {
            value: ObjectValue::Node { node },
        }
    }
}

impl From<Visibility> for AnimatableValue {
    fn from(v: Visibility) -> Self {
        Self::Object {
            value: ObjectValue::Visibility { value: v },
        }
    }
}

/// Expected value type for an animatable property or an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimatableValueType {
    F64,
    Point,
    Color,
    Object,
}

impl AnimatableValueType {
    /// Returns true if an animation producing `self` may drive a property of type `property`.
    pub fn can_animate(self, property: AnimatableValueType) -> bool {
        self == AnimatableValueType::Object || self == property
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_id_uniqueness() {
        let id1 = TimelineId::new();
        let id2 = TimelineId::new();
        assert_ne!(id1, id2);
        assert!(id2 > id1);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Duration::default(), Duration::Automatic);
        assert_eq!(RepeatBehavior::default(), RepeatBehavior::Count { count: 1.0 });
        assert_eq!(FillBehavior::default(), FillBehavior::HoldEnd);
        assert_eq!(ClockState::default(), ClockState::NotStarted);
        assert_eq!(Visibility::default(), Visibility::Visible);
    }

    #[test]
    fn test_public_clock_state() {
        assert_eq!(ClockState::NotStarted.public(), ClockState::Active);
        assert_eq!(ClockState::Filling.public(), ClockState::Filling);
        assert_eq!(ClockState::Stopped.public(), ClockState::Stopped);
    }

    #[test]
    fn test_zero_length() {
        assert!(Duration::seconds(0.0).is_zero_length());
        assert!(!Duration::Automatic.is_zero_length());
        assert!(RepeatBehavior::Count { count: 0.0 }.is_zero_length());
        assert!(RepeatBehavior::Duration { seconds: 0.0 }.is_zero_length());
        assert!(!RepeatBehavior::Forever.is_zero_length());
    }

    #[test]
    fn test_value_addition() {
        let sum = AnimatableValue::from(2.0).add(&AnimatableValue::from(3.5));
        assert_eq!(sum, Some(AnimatableValue::from(5.5)));

        let sum = AnimatableValue::from(Point::new(1.0, 2.0)).add(&Point::new(3.0, -1.0).into());
        assert_eq!(sum.and_then(|v| v.as_point()), Some(Point::new(4.0, 1.0)));

        let sum = AnimatableValue::from([0.8, 0.2, 0.0, 1.0]).add(&[0.5, 0.1, 0.0, 0.5].into());
        let rgba = sum.and_then(|v| v.as_color()).unwrap();
        assert_eq!(rgba[0], 1.0);
        assert_eq!(rgba[3], 1.0);

        assert_eq!(AnimatableValue::from(1.0).add(&Point::default().into()), None);
        assert_eq!(
            AnimatableValue::from(Visibility::Visible).add(&Visibility::Collapsed.into()),
            None
        );
    }

    #[test]
    fn test_value_type_compatibility() {
        assert!(AnimatableValueType::F64.can_animate(AnimatableValueType::F64));
        assert!(!AnimatableValueType::F64.can_animate(AnimatableValueType::Color));
        assert!(AnimatableValueType::Object.can_animate(AnimatableValueType::F64));
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&Duration::seconds(1.5)).unwrap();
        assert_eq!(json, r#"{"type":"time_span","seconds":1.5}"#);
        let value: AnimatableValue = serde_json::from_str(r#"{"type":"f64","value":2.0}"#).unwrap();
        assert_eq!(value.as_f64(), Some(2.0));
    }
}
