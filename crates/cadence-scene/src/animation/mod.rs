//! Hierarchical timing engine for the scene graph.
//!
//! This module provides:
//! - **Timing trees**: storyboards and parallel groups of animations, each node
//!   a clock deriving its local time from its parent
//! - **Leaves**: from/to/by and key-frame animations that write property values
//! - **Compositor mirrors**: independent animations run off the UI thread
//! - **Storyboard control**: begin, pause, resume, seek, stop, skip to fill
//!
//! # Architecture
//!
//! ```text
//! TimeManager
//!   ├── Timeline nodes (arena keyed by TimelineId)
//!   │     ├── Containers (storyboard / parallel / dynamic)
//!   │     └── Leaves (value sources, target, mirror handle)
//!   ├── Property registry ((node, property) → controlling leaf)
//!   └── EventQueue (completed, independent-animation changed)
//!
//! HostContext
//!   ├── SceneGraph      (targets, property values)
//!   ├── FrameScheduler  (next-tick requests)
//!   └── Compositor      (mirrored animations)
//! ```

pub mod classifier;
pub mod clock;
pub mod compositor;
pub mod easing;
pub mod events;
pub mod interpolate;
pub mod keyframes;
pub mod leaf;
pub mod manager;
pub mod scheduler;
pub mod schema;
mod storyboard;
mod target;
pub mod timeline;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use classifier::{Classification, IndependentKind, IndependentTarget, find_independent_targets};
pub use compositor::{
    Compositor, CompositorLimits, ConversionResult, MirrorAnimation, MirrorEasing, MirrorId,
    MirrorIterations, MirrorKeyFrame, PlaybackDirection, RecordingCompositor,
};
pub use easing::{EasingFunction, EasingMode, StepPosition};
pub use events::{EventQueue, ListenerToken, TimelineEvent};
pub use interpolate::Interpolate;
pub use keyframes::{KeyFrame, KeyFrameCollection, KeyFrameKind, KeySpline};
pub use leaf::{AnimationValues, FromToByAnimation, KeyFrameAnimation, Leaf, LeafSource};
pub use manager::{HostContext, PropertyRecord, TimeManager, TimingPolicy};
pub use scheduler::{FrameRequest, FrameScheduler, RecordingScheduler, RequestFrameReason};
pub use schema::{TimelineKind, TimelineSpec};
pub use timeline::{
    ContainerKind, NodeBody, StoryboardState, TargetSpec, TimelineNode, TimingProperties,
};
pub use types::{
    AnimatableValue, AnimatableValueType, ClockState, Duration, FillBehavior, ObjectValue, Point,
    RepeatBehavior, ResolvedDuration, TimelineId, Visibility,
};
