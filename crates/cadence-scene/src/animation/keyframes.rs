//! Key-frame value providers.
//!
//! This module provides:
//! - `KeyFrame`: A target value at a key time with an interpolation kind
//! - `KeyFrameCollection`: An ordered sequence of frames for one animation
//! - `Segment`: The bracketing pair of values and the eased sub-progress
//!
//! Frames are partitioned by time: a frame at key time T owns the half-open
//! interval that ends at T. Progress before the first frame interpolates from
//! the animation's base value; progress after the last frame holds the last
//! value. Duplicate key times are legal and resolved in insertion order.
//!
//! # Example
//!
//! ```
//! use cadence_scene::animation::keyframes::{KeyFrame, KeyFrameCollection};
//! use cadence_scene::animation::types::AnimatableValue;
//!
//! let mut frames = KeyFrameCollection::new(vec![
//!     KeyFrame::linear(1.0, 30.0.into()),
//!     KeyFrame::linear(2.0, 10.0.into()),
//!     KeyFrame::linear(3.0, 50.0.into()),
//! ]).unwrap();
//! frames.initialize(3.0);
//!
//! let segment = frames.segment_at(2.5 / 3.0, &AnimatableValue::from(0.0));
//! let value = segment.value().as_f64().unwrap();
//! assert!((value - 30.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};

use super::easing::{EasingFunction, cubic_bezier};
use super::interpolate::Interpolate;
use super::types::{AnimatableValue, AnimatableValueType};
use crate::error::{Result, TimingError};

/// Control points of a spline key frame's timing curve.
///
/// The curve runs from (0, 0) to (1, 1); both control points must lie in the
/// unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeySpline {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl KeySpline {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_range(x1) && in_range(y1) && in_range(x2) && in_range(y2)) {
            return Err(TimingError::InvalidArgument(format!(
                "key spline control points ({x1}, {y1}) ({x2}, {y2}) must lie in [0, 1]"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn evaluate(&self, progress: f64) -> f64 {
        cubic_bezier(self.x1, self.y1, self.x2, self.y2, progress)
    }
}

impl Default for KeySpline {
    fn default() -> Self {
        Self {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        }
    }
}

/// How a frame interpolates into its value from the preceding one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyFrameKind {
    /// Hold the previous value until the key time, then jump.
    Discrete,
    #[default]
    Linear,
    Spline { spline: KeySpline },
    Easing { easing: EasingFunction },
}

/// A single key frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    /// Key time in seconds from the start of the iteration.
    pub key_time: f64,
    pub value: AnimatableValue,
    #[serde(default)]
    pub kind: KeyFrameKind,
}

impl KeyFrame {
    pub fn new(key_time: f64, value: AnimatableValue, kind: KeyFrameKind) -> Self {
        Self {
            key_time,
            value,
            kind,
        }
    }

    pub fn linear(key_time: f64, value: AnimatableValue) -> Self {
        Self::new(key_time, value, KeyFrameKind::Linear)
    }

    pub fn discrete(key_time: f64, value: AnimatableValue) -> Self {
        Self::new(key_time, value, KeyFrameKind::Discrete)
    }

    pub fn spline(key_time: f64, value: AnimatableValue, spline: KeySpline) -> Self {
        Self::new(key_time, value, KeyFrameKind::Spline { spline })
    }

    pub fn eased(key_time: f64, value: AnimatableValue, easing: EasingFunction) -> Self {
        Self::new(key_time, value, KeyFrameKind::Easing { easing })
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self.kind, KeyFrameKind::Discrete)
    }

    /// Map linear segment progress to this frame's eased progress.
    pub fn effective_progress(&self, progress: f64) -> f64 {
        match self.kind {
            KeyFrameKind::Discrete => {
                if progress < 1.0 {
                    0.0
                } else {
                    1.0
                }
            }
            KeyFrameKind::Linear => progress,
            KeyFrameKind::Spline { spline } => spline.evaluate(progress),
            KeyFrameKind::Easing { easing } => easing.evaluate(progress),
        }
    }
}

/// Bracketing values for the current progress and the eased progress between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub from: AnimatableValue,
    pub to: AnimatableValue,
    pub progress: f64,
}

impl Segment {
    /// The interpolated value for this segment.
    pub fn value(&self) -> AnimatableValue {
        self.from.interpolate(&self.to, self.progress)
    }
}

/// Ordered key frames of one animation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFrameCollection {
    /// Frames sorted by key time, stable with respect to insertion order.
    frames: Vec<KeyFrame>,
    /// Key time of each frame as a fraction of the natural duration.
    percents: Vec<f64>,
}

impl KeyFrameCollection {
    /// Build a collection. Negative key times and mixed value types are rejected.
    pub fn new(mut frames: Vec<KeyFrame>) -> Result<Self> {
        if let Some(frame) = frames.iter().find(|f| !(f.key_time >= 0.0)) {
            return Err(TimingError::InvalidArgument(format!(
                "key time {} must be a non-negative number of seconds",
                frame.key_time
            )));
        }
        if let Some(first) = frames.first() {
            let value_type = first.value.value_type();
            if frames.iter().any(|f| f.value.value_type() != value_type) {
                return Err(TimingError::InvalidArgument(
                    "key frames must all hold the same value type".into(),
                ));
            }
            if value_type == AnimatableValueType::Object
                && frames.iter().any(|f| !f.is_discrete())
            {
                return Err(TimingError::InvalidArgument(
                    "object key frames must be discrete".into(),
                ));
            }
        }
        frames.sort_by(|a, b| a.key_time.total_cmp(&b.key_time));
        let percents = vec![0.0; frames.len()];
        Ok(Self { frames, percents })
    }

    pub fn frames(&self) -> &[KeyFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Value type of the frames, if there are any.
    pub fn value_type(&self) -> Option<AnimatableValueType> {
        self.frames.first().map(|f| f.value.value_type())
    }

    /// Largest key time, used as the automatic duration.
    pub fn max_key_time(&self) -> f64 {
        self.frames.last().map(|f| f.key_time).unwrap_or(0.0)
    }

    pub fn percent(&self, index: usize) -> f64 {
        self.percents[index]
    }

    /// Fail if any key time lies past an explicit duration.
    pub fn validate_against(&self, duration: f64) -> Result<()> {
        match self.frames.iter().find(|f| f.key_time > duration) {
            Some(frame) => Err(TimingError::KeyFrameBeyondDuration {
                key_time: frame.key_time,
                duration,
            }),
            None => Ok(()),
        }
    }

    /// Resolve key times to fractions of `natural_duration`.
    pub fn initialize(&mut self, natural_duration: f64) {
        self.percents = self
            .frames
            .iter()
            .map(|f| {
                if natural_duration > 0.0 {
                    f.key_time / natural_duration
                } else {
                    0.0
                }
            })
            .collect();
    }

    /// Index of the first frame whose key time lies strictly after `progress`.
    pub fn current_segment(&self, progress: f64) -> usize {
        self.percents
            .iter()
            .position(|p| *p > progress)
            .unwrap_or(self.percents.len())
    }

    /// Find the bracketing values for `progress` and the eased sub-progress.
    ///
    /// `base` is the value interpolated from when the first frame lies after 0.
    pub fn segment_at(&self, progress: f64, base: &AnimatableValue) -> Segment {
        let count = self.frames.len();
        if count == 0 {
            return Segment {
                from: base.clone(),
                to: base.clone(),
                progress: 0.0,
            };
        }

        let first = &self.frames[0];
        let mut span = 0.0;
        let mut from = base.clone();
        if self.percents[0] > 0.0 {
            span = self.percents[0];
        } else {
            from = first.value.clone();
        }
        let mut to = first.value.clone();

        let mut segment = 0;
        let mut cumulative = 0.0;
        while segment < count && self.percents[segment] <= progress {
            segment += 1;
            from = to.clone();
            cumulative += span;

            if segment < count {
                to = self.frames[segment].value.clone();
                span = self.percents[segment] - cumulative;
            } else {
                to = self.frames[count - 1].value.clone();
                // Past the last key time the segment may be empty; avoid dividing by zero.
                span = if cumulative < 1.0 { 1.0 - cumulative } else { 1.0 };
            }
        }

        let linear = (progress - cumulative) / span;
        let owner = &self.frames[segment.min(count - 1)];
        Segment {
            from,
            to,
            progress: owner.effective_progress(linear),
        }
    }

    /// Milliseconds until the animated value next changes.
    ///
    /// Inside a continuously interpolated segment this is 0 (tick every frame).
    /// Otherwise it is the time to the next key time in the direction of play,
    /// or to the end (start) of the iteration after the last (before the first) frame.
    pub fn next_tick_delay_ms(
        &self,
        progress: f64,
        current_time: f64,
        duration: f64,
        is_reversed: bool,
        speed_ratio: f64,
    ) -> u64 {
        let count = self.frames.len();
        let segment = self.current_segment(progress);
        if segment < count && !self.frames[segment].is_discrete() {
            return 0;
        }

        let target_segment = if is_reversed {
            segment as i64 - 1
        } else {
            segment as i64
        };
        let target_time = if target_segment < 0 {
            0.0
        } else if target_segment as usize >= count {
            duration
        } else {
            self.percents[target_segment as usize] * duration
        };

        let interval = (current_time - target_time).abs();
        (interval * 1000.0 / speed_ratio).ceil().max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::easing::EasingMode;
    use crate::animation::types::{ObjectValue, Visibility};

    const EPSILON: f64 = 0.0001;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn value_at(frames: &KeyFrameCollection, progress: f64, base: f64) -> f64 {
        frames
            .segment_at(progress, &AnimatableValue::from(base))
            .value()
            .as_f64()
            .unwrap()
    }

    fn three_frames() -> KeyFrameCollection {
        let mut frames = KeyFrameCollection::new(vec![
            KeyFrame::linear(1.0, 30.0.into()),
            KeyFrame::linear(2.0, 10.0.into()),
            KeyFrame::linear(3.0, 50.0.into()),
        ])
        .unwrap();
        frames.initialize(3.0);
        frames
    }

    #[test]
    fn test_kind_defaults_to_linear() {
        assert_eq!(KeyFrameKind::default(), KeyFrameKind::Linear);
        let frame: KeyFrame =
            serde_json::from_str(r#"{ "key_time": 1.0, "value": { "type": "f64", "value": 2.0 } }"#)
                .unwrap();
        assert_eq!(frame.kind, KeyFrameKind::Linear);
        assert!(!frame.is_discrete());
    }

    #[test]
    fn test_scenario_value_between_second_and_third_frame() {
        let mut frames = KeyFrameCollection::new(vec![
            KeyFrame::linear(1.0, 30.0.into()),
            KeyFrame::linear(2.0, 10.0.into()),
            KeyFrame::linear(3.0, 50.0.into()),
        ])
        .unwrap();
        frames.initialize(3.0);
        assert!(approx_eq(value_at(&frames, 2.5 / 3.0, 0.0), 30.0));
    }

    #[test]
    fn test_linear_segments() {
        let frames = three_frames();
        assert!(approx_eq(value_at(&frames, 2.5 / 3.0, 0.0), 30.0));
        assert!(approx_eq(value_at(&frames, 1.5 / 3.0, 0.0), 20.0));
        assert!(approx_eq(value_at(&frames, 1.0, 0.0), 50.0));
    }

    #[test]
    fn test_interpolates_from_base_before_first_frame() {
        let frames = three_frames();
        assert!(approx_eq(value_at(&frames, 0.0, 6.0), 6.0));
        assert!(approx_eq(value_at(&frames, 0.5 / 3.0, 6.0), 18.0));
    }

    #[test]
    fn test_first_frame_at_zero_ignores_base() {
        let mut frames = KeyFrameCollection::new(vec![
            KeyFrame::linear(0.0, 100.0.into()),
            KeyFrame::linear(2.0, 200.0.into()),
        ])
        .unwrap();
        frames.initialize(2.0);
        assert!(approx_eq(value_at(&frames, 0.0, -1.0), 100.0));
        assert!(approx_eq(value_at(&frames, 0.25, -1.0), 125.0));
    }

    #[test]
    fn test_holds_last_value_after_final_frame() {
        let mut frames = KeyFrameCollection::new(vec![KeyFrame::linear(1.0, 8.0.into())]).unwrap();
        frames.initialize(4.0);
        assert!(approx_eq(value_at(&frames, 0.125, 0.0), 4.0));
        assert!(approx_eq(value_at(&frames, 0.5, 0.0), 8.0));
        assert!(approx_eq(value_at(&frames, 1.0, 0.0), 8.0));
    }

    #[test]
    fn test_discrete_frames() {
        let mut frames = KeyFrameCollection::new(vec![
            KeyFrame::discrete(0.0, 1.0.into()),
            KeyFrame::discrete(1.0, 2.0.into()),
        ])
        .unwrap();
        frames.initialize(2.0);
        assert!(approx_eq(value_at(&frames, 0.25, 0.0), 1.0));
        assert!(approx_eq(value_at(&frames, 0.49, 0.0), 1.0));
        assert!(approx_eq(value_at(&frames, 0.5, 0.0), 2.0));
    }

    #[test]
    fn test_duplicate_key_times_keep_insertion_order() {
        let mut frames = KeyFrameCollection::new(vec![
            KeyFrame::linear(1.0, 5.0.into()),
            KeyFrame::discrete(1.0, 7.0.into()),
        ])
        .unwrap();
        frames.initialize(2.0);
        assert_eq!(frames.frames()[0].value.as_f64(), Some(5.0));
        assert!(approx_eq(value_at(&frames, 0.75, 0.0), 7.0));
    }

    #[test]
    fn test_zero_duration_lands_on_last_value() {
        let mut frames = KeyFrameCollection::new(vec![
            KeyFrame::discrete(0.0, 3.0.into()),
            KeyFrame::discrete(0.0, 4.0.into()),
        ])
        .unwrap();
        frames.initialize(0.0);
        assert!(approx_eq(value_at(&frames, 1.0, 0.0), 4.0));
    }

    #[test]
    fn test_spline_and_easing_progress() {
        let spline = KeyFrame::spline(1.0, 1.0.into(), KeySpline::default());
        assert!(approx_eq(spline.effective_progress(0.3), 0.3));

        let eased = KeyFrame::eased(
            1.0,
            1.0.into(),
            EasingFunction::Quadratic {
                mode: EasingMode::EaseIn,
            },
        );
        assert!(approx_eq(eased.effective_progress(0.5), 0.25));
    }

    #[test]
    fn test_invalid_key_spline() {
        assert!(KeySpline::new(0.0, 0.0, 1.5, 1.0).is_err());
        assert!(KeySpline::new(0.25, 0.1, 0.25, 1.0).is_ok());
    }

    #[test]
    fn test_key_frame_beyond_duration() {
        let frames = KeyFrameCollection::new(vec![KeyFrame::linear(50.0, 1.0.into())]).unwrap();
        assert_eq!(
            frames.validate_against(20.5),
            Err(TimingError::KeyFrameBeyondDuration {
                key_time: 50.0,
                duration: 20.5
            })
        );
        assert!(frames.validate_against(50.0).is_ok());
    }

    #[test]
    fn test_rejects_negative_key_time_and_mixed_types() {
        assert!(KeyFrameCollection::new(vec![KeyFrame::linear(-1.0, 1.0.into())]).is_err());
        assert!(
            KeyFrameCollection::new(vec![
                KeyFrame::linear(0.0, 1.0.into()),
                KeyFrame::linear(1.0, [1.0, 0.0, 0.0, 1.0].into()),
            ])
            .is_err()
        );
        assert!(
            KeyFrameCollection::new(vec![KeyFrame::linear(
                0.0,
                ObjectValue::Visibility {
                    value: Visibility::Collapsed
                }
                .into()
            )])
            .is_err()
        );
    }

    #[test]
    fn test_tick_delay_inside_continuous_segment() {
        let frames = three_frames();
        assert_eq!(frames.next_tick_delay_ms(0.5, 1.5, 3.0, false, 1.0), 0);
    }

    #[test]
    fn test_tick_delay_for_discrete_frames() {
        let mut frames = KeyFrameCollection::new(vec![
            KeyFrame::discrete(1.0, 1.0.into()),
            KeyFrame::discrete(2.0, 2.0.into()),
        ])
        .unwrap();
        frames.initialize(4.0);

        // Forward: wait for the next key time.
        assert_eq!(frames.next_tick_delay_ms(0.0625, 0.25, 4.0, false, 1.0), 750);
        // Forward past the last frame: wait for the end of the duration.
        assert_eq!(frames.next_tick_delay_ms(0.75, 3.0, 4.0, false, 2.0), 500);
        // Reverse before the first frame: wait for time zero.
        assert_eq!(frames.next_tick_delay_ms(0.1875, 0.75, 4.0, true, 1.0), 750);
        // Reverse between frames: wait for the previous key time.
        assert_eq!(frames.next_tick_delay_ms(0.375, 1.5, 4.0, true, 1.0), 500);
    }
}
