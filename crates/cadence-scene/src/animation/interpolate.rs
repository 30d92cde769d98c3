//! Interpolation system for animatable values.
//!
//! This module provides the `Interpolate` trait and implementations for all
//! animatable value types. Progress values outside [0, 1] extrapolate, since
//! overshooting easing functions legitimately produce them.
//!
//! Discrete (object) values have no intermediate states: they snap to the
//! start value at progress 0 and to the end value at progress 1. Any other
//! progress reaching an object interpolation is an engine defect and panics.

use super::types::{AnimatableValue, Point};

/// Trait for types that can be interpolated between two values.
pub trait Interpolate: Sized {
    /// Interpolate between self and another value.
    ///
    /// When t = 0.0, returns self.
    /// When t = 1.0, returns to.
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

#[inline]
fn lerp_f64(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

#[inline]
fn lerp_f32(from: f32, to: f32, t: f64) -> f32 {
    from + (to - from) * t as f32
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        lerp_f64(*self, *to, t)
    }
}

impl Interpolate for Point {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        Point::new(lerp_f64(self.x, to.x, t), lerp_f64(self.y, to.y, t))
    }
}

impl Interpolate for [f32; 4] {
    /// Interpolate RGBA color values per component.
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        [
            lerp_f32(self[0], to[0], t),
            lerp_f32(self[1], to[1], t),
            lerp_f32(self[2], to[2], t),
            lerp_f32(self[3], to[3], t),
        ]
    }
}

impl Interpolate for AnimatableValue {
    /// Interpolate between two animatable values.
    ///
    /// Both values must be of the same variant. If they differ, returns self unchanged.
    ///
    /// # Panics
    /// Panics if an object value is asked for a progress other than 0 or 1.
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        match (self, to) {
            (Self::F64 { value: from }, Self::F64 { value: to_val }) => Self::F64 {
                value: from.interpolate(to_val, t),
            },
            (Self::Point { point: from }, Self::Point { point: to_val }) => Self::Point {
                point: from.interpolate(to_val, t),
            },
            (Self::Color { rgba: from }, Self::Color { rgba: to_val }) => Self::Color {
                rgba: from.interpolate(to_val, t),
            },
            (Self::Object { .. }, Self::Object { .. }) => {
                if t == 0.0 {
                    self.clone()
                } else if t == 1.0 {
                    to.clone()
                } else {
                    panic!("object value interpolated at fractional progress {t}");
                }
            }
            // Type mismatch - return self unchanged
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::types::{ObjectValue, Visibility};

    const EPSILON: f64 = 0.0001;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_eq_f32(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.0001
    }

    #[test]
    fn test_f64_interpolation() {
        let from = 0.0_f64;
        let to = 100.0_f64;

        assert!(approx_eq(from.interpolate(&to, 0.0), 0.0));
        assert!(approx_eq(from.interpolate(&to, 0.25), 25.0));
        assert!(approx_eq(from.interpolate(&to, 1.0), 100.0));
        assert!(approx_eq((-50.0_f64).interpolate(&50.0, 0.5), 0.0));
    }

    #[test]
    fn test_point_interpolation() {
        let mid = Point::new(0.0, 10.0).interpolate(&Point::new(10.0, 30.0), 0.5);
        assert!(approx_eq(mid.x, 5.0));
        assert!(approx_eq(mid.y, 20.0));
    }

    #[test]
    fn test_color_interpolation() {
        let red: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
        let blue: [f32; 4] = [0.0, 0.0, 1.0, 0.0];

        let mid = red.interpolate(&blue, 0.5);
        assert!(approx_eq_f32(mid[0], 0.5));
        assert!(approx_eq_f32(mid[1], 0.0));
        assert!(approx_eq_f32(mid[2], 0.5));
        assert!(approx_eq_f32(mid[3], 0.5));
    }

    #[test]
    fn test_animatable_value_interpolation() {
        let from = AnimatableValue::F64 { value: 0.0 };
        let to = AnimatableValue::F64 { value: 10.0 };
        assert_eq!(from.interpolate(&to, 0.5).as_f64(), Some(5.0));

        let from = AnimatableValue::Color {
            rgba: [1.0, 0.0, 0.0, 1.0],
        };
        let to = AnimatableValue::Color {
            rgba: [0.0, 0.0, 1.0, 1.0],
        };
        let color = from.interpolate(&to, 0.5).as_color().unwrap();
        assert!(approx_eq_f32(color[0], 0.5));
        assert!(approx_eq_f32(color[2], 0.5));
    }

    #[test]
    fn test_type_mismatch_returns_self() {
        let from = AnimatableValue::F64 { value: 50.0 };
        let to = AnimatableValue::Color {
            rgba: [1.0, 0.0, 0.0, 1.0],
        };
        assert_eq!(from.interpolate(&to, 0.5).as_f64(), Some(50.0));
    }

    #[test]
    fn test_object_snaps_at_endpoints() {
        let from = AnimatableValue::from(Visibility::Visible);
        let to = AnimatableValue::from(Visibility::Collapsed);
        assert_eq!(from.interpolate(&to, 0.0), from);
        assert_eq!(from.interpolate(&to, 1.0), to);
    }

    #[test]
    #[should_panic(expected = "object value interpolated at fractional progress")]
    fn test_object_fractional_progress_panics() {
        let from = AnimatableValue::from(ObjectValue::Integer { value: 1 });
        let to = AnimatableValue::from(ObjectValue::Integer { value: 2 });
        from.interpolate(&to, 0.5);
    }

    #[test]
    fn test_extrapolation() {
        let from = 0.0_f64;
        let to = 100.0_f64;
        assert!(approx_eq(from.interpolate(&to, 1.5), 150.0));
        assert!(approx_eq(from.interpolate(&to, -0.5), -50.0));
    }
}
