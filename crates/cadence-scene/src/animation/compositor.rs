//! Compositor mirror contract.
//!
//! An independent animation is converted once, at begin, into a
//! [`MirrorAnimation`]: a flat list of key frames plus iteration settings the
//! compositor can play on its own clock. While a mirror runs, the UI-thread
//! clock of the animation holds at its expiration until the compositor
//! reports completion through the [`CompletionSender`] it was handed.
//!
//! Completion is a one-shot message. The engine polls the matching
//! [`CompletionReceiver`] at the start of every tick; nothing blocks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};

use super::classifier::IndependentTarget;
use super::easing::EasingFunction;
use super::keyframes::KeySpline;
use super::types::{AnimatableValue, RepeatBehavior, ResolvedDuration};
use crate::scene::PropertyId;

/// Ratios closer than this to a whole number count as whole.
const WHOLE_EPSILON: f64 = 1e-9;

/// Limits a timing tree must respect to be played by the compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorLimits {
    pub minimum_duration: f64,
    pub maximum_time: f64,
}

impl Default for CompositorLimits {
    fn default() -> Self {
        Self {
            minimum_duration: 0.001,
            maximum_time: 24.0 * 24.0 * 60.0 * 60.0,
        }
    }
}

/// Outcome of converting an animation for the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionResult {
    Success,
    CannotHaveNegativeTime,
    CannotHaveLessThanMinimumDuration,
    CannotExceedMaximumTimeLimit,
    CannotHaveFractionalRepeat,
    CannotHaveNonpositiveRepeat,
}

impl ConversionResult {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Check a leaf's timing against the compositor limits.
///
/// `natural` is the per-iteration duration after `Automatic` resolution.
pub fn check_timing(
    begin_time: f64,
    natural: ResolvedDuration,
    repeat: RepeatBehavior,
    limits: &CompositorLimits,
) -> ConversionResult {
    let ResolvedDuration::TimeSpan { seconds: duration } = natural else {
        return ConversionResult::CannotExceedMaximumTimeLimit;
    };

    if begin_time < 0.0 || duration < 0.0 {
        return ConversionResult::CannotHaveNegativeTime;
    }
    if duration < limits.minimum_duration {
        return ConversionResult::CannotHaveLessThanMinimumDuration;
    }
    if duration > limits.maximum_time || begin_time > limits.maximum_time {
        return ConversionResult::CannotExceedMaximumTimeLimit;
    }

    match repeat {
        RepeatBehavior::Count { count } => {
            if count <= 0.0 {
                ConversionResult::CannotHaveNonpositiveRepeat
            } else if !is_whole(count) {
                ConversionResult::CannotHaveFractionalRepeat
            } else {
                ConversionResult::Success
            }
        }
        RepeatBehavior::Duration { seconds } => {
            if seconds <= 0.0 {
                ConversionResult::CannotHaveNonpositiveRepeat
            } else if seconds > limits.maximum_time {
                ConversionResult::CannotExceedMaximumTimeLimit
            } else if !is_whole(seconds / duration) {
                ConversionResult::CannotHaveFractionalRepeat
            } else {
                ConversionResult::Success
            }
        }
        RepeatBehavior::Forever => ConversionResult::Success,
    }
}

fn is_whole(value: f64) -> bool {
    (value - value.round()).abs() < WHOLE_EPSILON
}

/// How the compositor interpolates into a mirror key frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorEasing {
    Linear,
    Step,
    CubicBezier { spline: KeySpline },
    Function { easing: EasingFunction },
}

/// One key frame of a mirror, at a fraction of the iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorKeyFrame {
    pub progress: f64,
    pub value: AnimatableValue,
    /// `None` for the first frame, which has nothing to interpolate from.
    pub easing: Option<MirrorEasing>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorIterations {
    Count { count: u32 },
    Forever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackDirection {
    Normal,
    Alternate,
}

/// Everything the compositor needs to play an animation by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorAnimation {
    pub property: PropertyId,
    /// Visuals the animation drives, filled in when the mirror is started.
    pub targets: Vec<IndependentTarget>,
    pub key_frames: Vec<MirrorKeyFrame>,
    /// Seconds per iteration, already divided by the accumulated speed ratio.
    pub duration: f64,
    pub delay: f64,
    pub iterations: MirrorIterations,
    pub direction: PlaybackDirection,
    /// The animation starts from a value another animation was presenting.
    pub handoff: bool,
}

impl MirrorAnimation {
    /// Build a mirror for a leaf whose timing already passed [`check_timing`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        property: PropertyId,
        key_frames: Vec<MirrorKeyFrame>,
        natural_seconds: f64,
        begin_time: f64,
        repeat: RepeatBehavior,
        speed_ratio: f64,
        auto_reverse: bool,
        handoff: bool,
    ) -> Self {
        let count = match repeat {
            RepeatBehavior::Count { count } => Some(count.round() as u32),
            RepeatBehavior::Duration { seconds } => {
                Some((seconds / natural_seconds).round() as u32)
            }
            RepeatBehavior::Forever => None,
        };
        let (iterations, direction) = match (count, auto_reverse) {
            (Some(count), true) => (
                MirrorIterations::Count {
                    count: count.saturating_mul(2),
                },
                PlaybackDirection::Alternate,
            ),
            (Some(count), false) => (MirrorIterations::Count { count }, PlaybackDirection::Normal),
            (None, true) => (MirrorIterations::Forever, PlaybackDirection::Alternate),
            (None, false) => (MirrorIterations::Forever, PlaybackDirection::Normal),
        };

        Self {
            property,
            targets: Vec::new(),
            key_frames,
            duration: natural_seconds / speed_ratio,
            delay: begin_time,
            iterations,
            direction,
            handoff,
        }
    }
}

/// Handle of a running mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MirrorId(pub u64);

impl MirrorId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MirrorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Compositor end of a completion channel. Consumed by [`complete`](Self::complete).
#[derive(Debug)]
pub struct CompletionSender(SyncSender<()>);

impl CompletionSender {
    /// Report that the mirror finished playing.
    pub fn complete(self) {
        // The engine may already have stopped the mirror and dropped its end.
        let _ = self.0.try_send(());
    }
}

/// Engine end of a completion channel.
#[derive(Debug)]
pub struct CompletionReceiver(Receiver<()>);

impl CompletionReceiver {
    /// Returns true once the compositor has reported completion.
    ///
    /// A compositor that drops its sender without reporting counts as
    /// complete, so the clock is never held forever.
    pub fn poll(&self) -> bool {
        match self.0.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => true,
        }
    }
}

/// Create a one-shot completion channel.
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (CompletionSender(tx), CompletionReceiver(rx))
}

/// Host-side compositor.
pub trait Compositor {
    /// Start playing `animation`. The compositor reports completion on `completion`.
    fn begin_mirror(
        &mut self,
        animation: MirrorAnimation,
        completion: CompletionSender,
    ) -> MirrorId;

    /// Stop a mirror. Unknown or finished ids are ignored.
    fn stop_mirror(&mut self, id: MirrorId);
}

/// Compositor that records mirrors and completes them on request.
#[derive(Debug, Default)]
pub struct RecordingCompositor {
    running: BTreeMap<MirrorId, (MirrorAnimation, Option<CompletionSender>)>,
    stopped: Vec<MirrorId>,
    complete_on_begin: bool,
}

impl RecordingCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A compositor whose mirrors report completion as soon as they begin.
    pub fn completing() -> Self {
        Self {
            complete_on_begin: true,
            ..Self::default()
        }
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn mirrors(&self) -> impl Iterator<Item = (MirrorId, &MirrorAnimation)> {
        self.running.iter().map(|(id, (anim, _))| (*id, anim))
    }

    pub fn mirror(&self, id: MirrorId) -> Option<&MirrorAnimation> {
        self.running.get(&id).map(|(anim, _)| anim)
    }

    /// Ids stopped by the engine, in order.
    pub fn stopped(&self) -> &[MirrorId] {
        &self.stopped
    }

    /// Report completion of one mirror. Returns false if it is not running
    /// or already completed.
    pub fn complete(&mut self, id: MirrorId) -> bool {
        match self.running.get_mut(&id).and_then(|(_, sender)| sender.take()) {
            Some(sender) => {
                sender.complete();
                true
            }
            None => false,
        }
    }

    /// Report completion of every running mirror.
    pub fn complete_all(&mut self) -> usize {
        let ids: Vec<_> = self.running.keys().copied().collect();
        ids.into_iter().filter(|id| self.complete(*id)).count()
    }
}

impl Compositor for RecordingCompositor {
    fn begin_mirror(
        &mut self,
        animation: MirrorAnimation,
        completion: CompletionSender,
    ) -> MirrorId {
        let id = MirrorId::new();
        if self.complete_on_begin {
            completion.complete();
            self.running.insert(id, (animation, None));
        } else {
            self.running.insert(id, (animation, Some(completion)));
        }
        id
    }

    fn stop_mirror(&mut self, id: MirrorId) {
        if self.running.remove(&id).is_some() {
            self.stopped.push(id);
        }
    }
}
