//! Declarative timing trees.
//!
//! `TimelineSpec` describes a storyboard and its descendants as plain data so
//! hosts can ship animations as JSON and build them into a [`TimeManager`].
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "kind": "storyboard",
//!   "target_name": "box",
//!   "children": [
//!     {
//!       "kind": "animation",
//!       "target_property": "Opacity",
//!       "timing": { "duration": { "type": "time_span", "seconds": 0.5 } },
//!       "to": { "type": "f64", "value": 0.0 }
//!     },
//!     {
//!       "kind": "key_frames",
//!       "target_property": "(Canvas.Left)",
//!       "frames": [
//!         { "key_time": 0.0, "value": { "type": "f64", "value": 0.0 } },
//!         { "key_time": 1.0, "value": { "type": "f64", "value": 120.0 } }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::easing::EasingFunction;
use super::keyframes::KeyFrame;
use super::leaf::{FromToByAnimation, KeyFrameAnimation, LeafSource};
use super::manager::TimeManager;
use super::timeline::TimingProperties;
use super::types::{AnimatableValue, TimelineId};
use crate::error::{Result, TimingError};

/// Node kind in a declarative timing tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Storyboard,
    Parallel,
    /// From/to/by interpolation.
    Animation,
    KeyFrames,
}

impl TimelineKind {
    fn is_container(self) -> bool {
        matches!(self, Self::Storyboard | Self::Parallel)
    }
}

/// One node of a declarative timing tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSpec {
    pub kind: TimelineKind,

    #[serde(default)]
    pub timing: TimingProperties,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    /// Property path, e.g. `(UIElement.RenderTransform).(TranslateTransform.X)`.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_property: Option<String>,

    /// Only valid on containers.
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TimelineSpec>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<AnimatableValue>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<AnimatableValue>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<AnimatableValue>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easing: Option<EasingFunction>,

    /// Only valid on `key_frames` nodes.
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<KeyFrame>,

    #[serde(default)]
    pub enable_dependent_animation: bool,
}

impl TimelineSpec {
    /// Parse a tree from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TimingError::InvalidArgument(format!("timeline spec: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TimingError::InvalidArgument(format!("timeline spec: {e}")))
    }

    /// Create every node of the tree in `manager` and return the root id.
    ///
    /// On error, nodes created so far stay registered but detached; nothing
    /// references them.
    pub fn build(&self, manager: &mut TimeManager) -> Result<TimelineId> {
        if !self.kind.is_container() && !self.children.is_empty() {
            return Err(TimingError::InvalidArgument(format!(
                "{:?} nodes cannot have children",
                self.kind
            )));
        }

        let id = match self.kind {
            TimelineKind::Storyboard => manager.create_storyboard(self.timing.clone()),
            TimelineKind::Parallel => manager.create_parallel(self.timing.clone()),
            TimelineKind::Animation => {
                let mut animation =
                    FromToByAnimation::new(self.from.clone(), self.to.clone(), self.by.clone())?;
                if let Some(easing) = self.easing {
                    animation = animation.with_easing(easing);
                }
                manager.create_animation(self.timing.clone(), LeafSource::FromToBy(animation))?
            }
            TimelineKind::KeyFrames => {
                let frames = KeyFrameAnimation::new(self.frames.clone())?;
                manager.create_animation(self.timing.clone(), LeafSource::KeyFrames(frames))?
            }
        };

        if let Some(name) = &self.target_name {
            manager.set_target_name(id, name.as_str())?;
        }
        if let Some(path) = &self.target_property {
            manager.set_target_property(id, path.as_str())?;
        }
        if self.enable_dependent_animation {
            manager.set_enable_dependent_animation(id, true)?;
        }
        for child in &self.children {
            let child = child.build(manager)?;
            manager.add_child(id, child)?;
        }
        Ok(id)
    }
}
