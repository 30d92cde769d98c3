//! Animation leaves: value production and property ownership.
//!
//! A leaf is either a from/to/by interpolation or a key-frame sequence. At
//! begin it resolves its target, takes the target property over from
//! whatever animated it before, and converts itself for the compositor. On
//! each tick it decides whether it runs on the UI thread, writes its value,
//! and keeps the compositor mirror in step with its classification.

use tracing::{debug, warn};

use super::classifier::{IndependentTarget, find_independent_targets};
use super::clock::{self, ClockParams, ClockTiming};
use super::compositor::{
    CompletionReceiver, ConversionResult, MirrorAnimation, MirrorEasing, MirrorId, MirrorKeyFrame,
    check_timing, completion_channel,
};
use super::easing::EasingFunction;
use super::events::TimelineEvent;
use super::interpolate::Interpolate;
use super::keyframes::{KeyFrame, KeyFrameCollection, KeyFrameKind};
use super::manager::{HostContext, PropertyRecord, TimeManager};
use super::scheduler::RequestFrameReason;
use super::types::{
    AnimatableValue, AnimatableValueType, ClockState, Duration, ResolvedDuration, TimelineId,
};
use crate::error::{ErrorCode, Result, TimingError};
use crate::scene::{NodeId, PropertyId, SceneGraph, WeakNode};

/// Value production shared by every kind of leaf.
pub trait AnimationValues {
    /// Value type produced, `None` if nothing constrains it yet.
    fn value_type(&self) -> Option<AnimatableValueType>;

    /// Iteration length used when the duration is `Automatic`.
    fn automatic_duration(&self) -> f64;

    /// Fill in the operands left unset from the base values read at begin.
    fn compute_to_from_by(
        &mut self,
        base: &AnimatableValue,
        non_animated_base: &AnimatableValue,
    ) -> Result<()>;

    /// Value at `progress` through the iteration.
    fn interpolate_current_value(&self, progress: f64, base: &AnimatableValue) -> AnimatableValue;

    /// Key frames for a compositor mirror.
    fn mirror_key_frames(&self, base: &AnimatableValue) -> Vec<MirrorKeyFrame>;
}

/// Interpolation between two operands, either of which may come from the target.
#[derive(Debug, Clone, PartialEq)]
pub struct FromToByAnimation {
    from: Option<AnimatableValue>,
    to: Option<AnimatableValue>,
    by: Option<AnimatableValue>,
    easing: Option<EasingFunction>,
    resolved: Option<(AnimatableValue, AnimatableValue)>,
}

impl FromToByAnimation {
    /// Build an animation. Discrete values and mixed operand types are rejected.
    pub fn new(
        from: Option<AnimatableValue>,
        to: Option<AnimatableValue>,
        by: Option<AnimatableValue>,
    ) -> Result<Self> {
        let operands: Vec<_> = [&from, &to, &by].into_iter().flatten().collect();
        if operands
            .iter()
            .any(|v| v.value_type() == AnimatableValueType::Object)
        {
            return Err(TimingError::InvalidArgument(
                "from/to/by animations cannot interpolate discrete values; use key frames".into(),
            ));
        }
        if let Some(first) = operands.first() {
            if operands.iter().any(|v| v.value_type() != first.value_type()) {
                return Err(TimingError::InvalidArgument(
                    "from/to/by operands must share a value type".into(),
                ));
            }
        }
        Ok(Self {
            from,
            to,
            by,
            easing: None,
            resolved: None,
        })
    }

    pub fn from_to(from: AnimatableValue, to: AnimatableValue) -> Result<Self> {
        Self::new(Some(from), Some(to), None)
    }

    /// Animate from the current value to `to`.
    pub fn to(to: AnimatableValue) -> Result<Self> {
        Self::new(None, Some(to), None)
    }

    /// Animate from the current value by `by`.
    pub fn by(by: AnimatableValue) -> Result<Self> {
        Self::new(None, None, Some(by))
    }

    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn from_value(&self) -> Option<&AnimatableValue> {
        self.from.as_ref()
    }

    pub fn to_value(&self) -> Option<&AnimatableValue> {
        self.to.as_ref()
    }

    pub fn by_value(&self) -> Option<&AnimatableValue> {
        self.by.as_ref()
    }

    pub fn easing(&self) -> Option<EasingFunction> {
        self.easing
    }

    /// Operands after begin, as `(from, to)`.
    pub fn resolved(&self) -> Option<(&AnimatableValue, &AnimatableValue)> {
        self.resolved.as_ref().map(|(from, to)| (from, to))
    }
}

impl AnimationValues for FromToByAnimation {
    fn value_type(&self) -> Option<AnimatableValueType> {
        [&self.from, &self.to, &self.by]
            .into_iter()
            .flatten()
            .next()
            .map(AnimatableValue::value_type)
    }

    fn automatic_duration(&self) -> f64 {
        1.0
    }

    fn compute_to_from_by(
        &mut self,
        base: &AnimatableValue,
        non_animated_base: &AnimatableValue,
    ) -> Result<()> {
        let from = self.from.clone().unwrap_or_else(|| base.clone());
        let to = match (&self.to, &self.by) {
            (Some(to), _) => to.clone(),
            (None, Some(by)) => from.add(by).ok_or_else(|| {
                TimingError::InvalidArgument(format!(
                    "cannot add {:?} to {:?}",
                    by.value_type(),
                    from.value_type()
                ))
            })?,
            (None, None) => non_animated_base.clone(),
        };
        self.resolved = Some((from, to));
        Ok(())
    }

    fn interpolate_current_value(&self, progress: f64, base: &AnimatableValue) -> AnimatableValue {
        let Some((from, to)) = &self.resolved else {
            return base.clone();
        };
        let eased = self.easing.map_or(progress, |e| e.evaluate(progress));
        from.interpolate(to, eased)
    }

    fn mirror_key_frames(&self, base: &AnimatableValue) -> Vec<MirrorKeyFrame> {
        let (from, to) = self
            .resolved
            .clone()
            .unwrap_or_else(|| (base.clone(), base.clone()));
        let easing = match self.easing {
            Some(easing) => MirrorEasing::Function { easing },
            None => MirrorEasing::Linear,
        };
        vec![
            MirrorKeyFrame {
                progress: 0.0,
                value: from,
                easing: None,
            },
            MirrorKeyFrame {
                progress: 1.0,
                value: to,
                easing: Some(easing),
            },
        ]
    }
}

/// A sequence of key frames.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrameAnimation {
    frames: KeyFrameCollection,
}

impl KeyFrameAnimation {
    pub fn new(frames: Vec<KeyFrame>) -> Result<Self> {
        Ok(Self {
            frames: KeyFrameCollection::new(frames)?,
        })
    }

    pub fn frames(&self) -> &KeyFrameCollection {
        &self.frames
    }

    /// Discrete object frames, which never run on the compositor.
    pub fn is_object(&self) -> bool {
        self.frames.value_type() == Some(AnimatableValueType::Object)
    }
}

impl AnimationValues for KeyFrameAnimation {
    fn value_type(&self) -> Option<AnimatableValueType> {
        self.frames.value_type()
    }

    fn automatic_duration(&self) -> f64 {
        self.frames.max_key_time()
    }

    fn compute_to_from_by(&mut self, _: &AnimatableValue, _: &AnimatableValue) -> Result<()> {
        Ok(())
    }

    fn interpolate_current_value(&self, progress: f64, base: &AnimatableValue) -> AnimatableValue {
        self.frames.segment_at(progress, base).value()
    }

    fn mirror_key_frames(&self, base: &AnimatableValue) -> Vec<MirrorKeyFrame> {
        let mut out = Vec::with_capacity(self.frames.len() + 1);
        if !self.frames.is_empty() && self.frames.percent(0) > 0.0 {
            out.push(MirrorKeyFrame {
                progress: 0.0,
                value: base.clone(),
                easing: None,
            });
        }
        for (index, frame) in self.frames.frames().iter().enumerate() {
            let easing = match frame.kind {
                KeyFrameKind::Discrete => MirrorEasing::Step,
                KeyFrameKind::Linear => MirrorEasing::Linear,
                KeyFrameKind::Spline { spline } => MirrorEasing::CubicBezier { spline },
                KeyFrameKind::Easing { easing } => MirrorEasing::Function { easing },
            };
            out.push(MirrorKeyFrame {
                progress: self.frames.percent(index),
                value: frame.value.clone(),
                easing: (!out.is_empty()).then_some(easing),
            });
        }
        out
    }
}

/// What drives a leaf's value.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafSource {
    FromToBy(FromToByAnimation),
    KeyFrames(KeyFrameAnimation),
}

impl LeafSource {
    pub fn key_frames(&self) -> Option<&KeyFrameCollection> {
        match self {
            Self::KeyFrames(animation) => Some(animation.frames()),
            Self::FromToBy(_) => None,
        }
    }

    fn is_object_key_frames(&self) -> bool {
        matches!(self, Self::KeyFrames(animation) if animation.is_object())
    }

    fn values(&self) -> &dyn AnimationValues {
        match self {
            Self::FromToBy(animation) => animation,
            Self::KeyFrames(animation) => animation,
        }
    }

    fn values_mut(&mut self) -> &mut dyn AnimationValues {
        match self {
            Self::FromToBy(animation) => animation,
            Self::KeyFrames(animation) => animation,
        }
    }
}

impl AnimationValues for LeafSource {
    fn value_type(&self) -> Option<AnimatableValueType> {
        self.values().value_type()
    }

    fn automatic_duration(&self) -> f64 {
        self.values().automatic_duration()
    }

    fn compute_to_from_by(
        &mut self,
        base: &AnimatableValue,
        non_animated_base: &AnimatableValue,
    ) -> Result<()> {
        self.values_mut().compute_to_from_by(base, non_animated_base)
    }

    fn interpolate_current_value(&self, progress: f64, base: &AnimatableValue) -> AnimatableValue {
        self.values().interpolate_current_value(progress, base)
    }

    fn mirror_key_frames(&self, base: &AnimatableValue) -> Vec<MirrorKeyFrame> {
        self.values().mirror_key_frames(base)
    }
}

#[derive(Debug)]
pub(crate) struct MirrorHandle {
    pub(crate) id: MirrorId,
    pub(crate) receiver: CompletionReceiver,
    pub(crate) completed: bool,
}

/// Leaf payload of a timeline node.
#[derive(Debug)]
pub struct Leaf {
    pub(crate) source: LeafSource,
    pub(crate) enable_dependent_animation: bool,

    pub(crate) resolved: Option<(WeakNode, PropertyId)>,
    pub(crate) has_control: bool,
    pub(crate) base_value: Option<AnimatableValue>,
    pub(crate) non_animated_base: Option<AnimatableValue>,
    /// The base must be re-read from the target before the next iteration.
    pub(crate) base_stale: bool,
    pub(crate) current_value: Option<AnimatableValue>,
    pub(crate) is_zero_duration: bool,
    pub(crate) has_handoff: bool,

    pub(crate) conversion: Option<ConversionResult>,
    pub(crate) mirror_template: Option<MirrorAnimation>,
    pub(crate) mirror: Option<MirrorHandle>,
    pub(crate) warned_dependent: bool,
}

impl Leaf {
    pub fn new(source: LeafSource) -> Self {
        Self {
            source,
            enable_dependent_animation: false,
            resolved: None,
            has_control: false,
            base_value: None,
            non_animated_base: None,
            base_stale: false,
            current_value: None,
            is_zero_duration: false,
            has_handoff: false,
            conversion: None,
            mirror_template: None,
            mirror: None,
            warned_dependent: false,
        }
    }

    pub fn source(&self) -> &LeafSource {
        &self.source
    }

    pub fn automatic_duration(&self) -> f64 {
        self.source.automatic_duration()
    }

    pub fn value_type(&self) -> Option<AnimatableValueType> {
        self.source.value_type()
    }

    pub fn enable_dependent_animation(&self) -> bool {
        self.enable_dependent_animation
    }

    /// Node and property this leaf resolved to at begin.
    pub fn resolved_target(&self) -> Option<(WeakNode, PropertyId)> {
        self.resolved
    }

    pub fn has_control(&self) -> bool {
        self.has_control
    }

    pub fn current_value(&self) -> Option<&AnimatableValue> {
        self.current_value.as_ref()
    }

    pub fn non_animated_base(&self) -> Option<&AnimatableValue> {
        self.non_animated_base.as_ref()
    }

    pub fn is_zero_duration(&self) -> bool {
        self.is_zero_duration
    }

    pub fn has_handoff(&self) -> bool {
        self.has_handoff
    }

    pub fn conversion(&self) -> Option<ConversionResult> {
        self.conversion
    }

    pub fn mirror_id(&self) -> Option<MirrorId> {
        self.mirror.as_ref().map(|m| m.id)
    }
}

/// Per-tick decision for a leaf with control of its property.
struct TickDecision {
    tick: bool,
    independent: bool,
    targets: Vec<IndependentTarget>,
}

impl TimeManager {
    /// Resolve the target, take the property over and prepare values.
    pub(crate) fn on_begin(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.stop_mirror(id, host)?;

        let resolved = match self.resolve_target(id, &*host.scene) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.release_registration(id)?;
                return Err(err);
            }
        };
        let Some((target, property)) = resolved else {
            self.release_registration(id)?;
            return self.policy.errors.report(TimingError::invalid_operation(
                ErrorCode::SbBeginNoTarget,
                format!("timeline {} has no target object or property", id.0),
            ));
        };

        if let Some((weak, previous)) = self.leaf(id)?.resolved {
            if (weak.id(), previous) != (target, property) {
                self.release_registration(id)?;
            }
        }

        if let Some(value_type) = self.leaf(id)?.value_type() {
            if !value_type.can_animate(property.value_type()) {
                self.release_target(id)?;
                return self.policy.errors.report(TimingError::invalid_operation(
                    ErrorCode::SbBeginIncompatibleType,
                    format!(
                        "{value_type:?} animation cannot drive {} on {}",
                        property.name(),
                        host.scene.debug_label(target)
                    ),
                ));
            }
        }

        let Some(live) = host.scene.value(target, property) else {
            self.release_target(id)?;
            return self.policy.errors.report(TimingError::invalid_operation(
                ErrorCode::SbBeginNoTarget,
                format!(
                    "{} has no property {}",
                    host.scene.debug_label(target),
                    property.name()
                ),
            ));
        };

        let root = self.root_of(id)?;
        let (non_animated_base, handoff) = match self.properties.get(&(target, property)).cloned() {
            Some(record)
                if record.controller != id && self.nodes.contains_key(&record.controller) =>
            {
                if self.root_of(record.controller)? == root {
                    self.release_target(id)?;
                    return self.policy.errors.report(TimingError::invalid_operation(
                        ErrorCode::SbBeginAnimComposition,
                        format!(
                            "{} on {} is already animated in this storyboard",
                            property.name(),
                            host.scene.debug_label(target)
                        ),
                    ));
                }
                let prior = self.node(record.controller)?;
                let handoff = prior.state != ClockState::Filling
                    && !prior.leaf().is_some_and(Leaf::is_zero_duration);
                self.take_control_from(record.controller, host)?;
                (record.non_animated_base, handoff)
            }
            Some(record) => (record.non_animated_base, false),
            None => (live.clone(), false),
        };

        if let Err(err) = self.prepare_values(id, &live, &non_animated_base, handoff, property) {
            self.release_target(id)?;
            return Err(err);
        }

        self.properties.insert(
            (target, property),
            PropertyRecord {
                controller: id,
                non_animated_base,
            },
        );

        let weak = host.scene.downgrade(target);
        let converted = self
            .leaf(id)?
            .conversion
            .is_some_and(ConversionResult::is_success);
        let node = self.node_mut(id)?;
        node.completed_fired = false;
        node.cannot_convert = !converted;
        let leaf = self.leaf_mut(id)?;
        leaf.resolved = Some((weak, property));
        leaf.has_control = true;

        debug!(
            timeline = id.0,
            node = %host.scene.debug_label(target),
            property = property.name(),
            handoff,
            "animation begun"
        );
        Ok(())
    }

    /// Base values, operands, key-frame percents and compositor conversion.
    fn prepare_values(
        &mut self,
        id: TimelineId,
        live: &AnimatableValue,
        non_animated_base: &AnimatableValue,
        handoff: bool,
        property: PropertyId,
    ) -> Result<()> {
        let natural = self.natural_duration(id)?;
        let is_zero_duration = self.is_zero_duration_at(id, natural)?;
        let speed_ratio = self.accumulated_speed_ratio(id)?;
        let timing = self.node(id)?.timing.clone();
        let conversion =
            check_timing(timing.begin_time, natural, timing.repeat, &self.policy.limits);
        let natural_seconds = natural.seconds().unwrap_or(0.0);

        let leaf = self.leaf_mut(id)?;
        if let LeafSource::KeyFrames(animation) = &mut leaf.source {
            if let Duration::TimeSpan { seconds } = timing.duration {
                animation.frames.validate_against(seconds)?;
            }
            animation.frames.initialize(natural_seconds);
        }
        leaf.source.compute_to_from_by(live, non_animated_base)?;

        leaf.base_value = Some(live.clone());
        leaf.non_animated_base = Some(non_animated_base.clone());
        leaf.base_stale = false;
        leaf.is_zero_duration = is_zero_duration;
        leaf.has_handoff = handoff;
        leaf.conversion = Some(conversion);
        leaf.mirror_template = conversion.is_success().then(|| {
            MirrorAnimation::new(
                property,
                leaf.source.mirror_key_frames(live),
                natural_seconds,
                timing.begin_time,
                timing.repeat,
                speed_ratio,
                timing.auto_reverse,
                handoff,
            )
        });
        Ok(())
    }

    fn is_zero_duration_at(&self, id: TimelineId, natural: ResolvedDuration) -> Result<bool> {
        if natural == (ResolvedDuration::TimeSpan { seconds: 0.0 }) {
            return Ok(true);
        }
        for node in self.ancestry(id)? {
            let timing = &self.node(node)?.timing;
            if timing.duration.is_zero_length() || timing.repeat.is_zero_length() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Product of the speed ratios of the node and its ancestors.
    pub(crate) fn accumulated_speed_ratio(&self, id: TimelineId) -> Result<f64> {
        let mut ratio = 1.0;
        for node in self.ancestry(id)? {
            ratio *= self.node(node)?.timing.speed_ratio;
        }
        Ok(ratio)
    }

    pub(crate) fn update_leaf(
        &mut self,
        id: TimelineId,
        params: &ClockParams,
        mine: &ClockParams,
        timing: &ClockTiming,
        expiration: Option<f64>,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let leaf = self.leaf(id)?;
        let (resolved, has_control) = (leaf.resolved, leaf.has_control);
        let Some((weak, property)) = resolved else {
            return Ok(());
        };
        let Some(target) = host.scene.upgrade(weak) else {
            debug!(timeline = id.0, "target dropped");
            self.clear_property_record(weak.id(), property, id);
            self.stop_mirror(id, host)?;
            return self.release_target(id);
        };

        let mut independent = false;
        let mut targets = Vec::new();
        let mut result = Ok(());
        if has_control {
            let decision = self.classify_tick(
                id,
                target,
                property,
                mine.is_paused,
                mine.cannot_convert,
                &*host.scene,
            )?;
            independent = decision.independent;
            targets = decision.targets;
            self.note_skipped(id, decision.tick, target, property, &*host.scene)?;
            result = self.tick_leaf(
                id,
                decision.tick,
                target,
                property,
                params,
                mine,
                timing,
                expiration,
                host,
            );
        }

        self.set_independent(id, independent)?;
        self.sync_mirror(id, independent, targets, host)?;
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn tick_leaf(
        &mut self,
        id: TimelineId,
        tick: bool,
        target: NodeId,
        property: PropertyId,
        params: &ClockParams,
        mine: &ClockParams,
        timing: &ClockTiming,
        expiration: Option<f64>,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let node = self.node(id)?;
        let (state, initialized, completed) = (node.state, node.initialized, node.completed_fired);

        match state {
            ClockState::NotStarted => {
                if tick {
                    if let Some(ms) =
                        clock::begin_tick_delay_ms(params, timing.begin_time, params.speed_ratio)
                    {
                        host.scheduler
                            .request_additional_frame(ms, RequestFrameReason::AnimationTick);
                    }
                }
            }
            ClockState::Stopped => {
                if initialized
                    && !completed
                    && self.ticks_unpaused(id, target, property, &*host.scene)?
                {
                    self.fire_completed(id)?;
                }
                self.finalize_iteration(id, host)?;
                self.request_end_tick(params, expiration, host);
            }
            ClockState::Active => {
                if !tick {
                    return Ok(());
                }
                if !initialized {
                    self.initialize_leaf(id, host)?;
                }
                let value = self.leaf_value(id)?;
                if !mine.is_paused {
                    let node = self.node(id)?;
                    let ms = match (self.leaf(id)?.source.key_frames(), timing.natural_duration) {
                        (Some(frames), ResolvedDuration::TimeSpan { seconds }) => frames
                            .next_tick_delay_ms(
                                node.progress,
                                node.current_time,
                                seconds,
                                mine.is_reversed,
                                mine.speed_ratio,
                            ),
                        _ => 0,
                    };
                    host.scheduler
                        .request_additional_frame(ms, RequestFrameReason::AnimationTick);
                }
                self.write_value(id, target, property, value, host)?;
            }
            ClockState::Filling => {
                if initialized {
                    if !completed && self.ticks_unpaused(id, target, property, &*host.scene)? {
                        self.fire_completed(id)?;
                    }
                    if tick {
                        let value = self.leaf_value(id)?;
                        self.write_value(id, target, property, value, host)?;
                    }
                }
                self.request_end_tick(params, expiration, host);
            }
        }
        Ok(())
    }

    fn request_end_tick(
        &self,
        params: &ClockParams,
        expiration: Option<f64>,
        host: &mut HostContext<'_>,
    ) {
        if let Some(ms) = clock::end_tick_delay_ms(params, expiration, params.speed_ratio) {
            host.scheduler
                .request_additional_frame(ms, RequestFrameReason::AnimationTick);
        }
    }

    /// Decide whether the leaf ticks on the UI thread and whether it is independent.
    fn classify_tick(
        &self,
        id: TimelineId,
        target: NodeId,
        property: PropertyId,
        paused: bool,
        cannot_convert: bool,
        scene: &dyn SceneGraph,
    ) -> Result<TickDecision> {
        let leaf = self.leaf(id)?;
        if leaf.is_zero_duration || leaf.source.is_object_key_frames() {
            return Ok(TickDecision {
                tick: true,
                independent: false,
                targets: Vec::new(),
            });
        }

        let classification = find_independent_targets(scene, target, property);
        let mut tick = false;
        let mut independent = classification.independent;
        if independent {
            tick = true;
            let converted = leaf.conversion.is_some_and(ConversionResult::is_success);
            if !self.policy.compositor_enabled || !converted || cannot_convert {
                independent = false;
            } else if !paused && self.node(self.root_of(id)?)?.state != ClockState::Active {
                independent = false;
            }
        }
        if !tick && leaf.enable_dependent_animation && self.policy.allow_dependent_animations {
            tick = true;
        }

        Ok(TickDecision {
            tick,
            independent,
            targets: classification.targets,
        })
    }

    /// Whether the leaf would tick if nothing were paused or unconvertible.
    fn ticks_unpaused(
        &self,
        id: TimelineId,
        target: NodeId,
        property: PropertyId,
        scene: &dyn SceneGraph,
    ) -> Result<bool> {
        Ok(self.classify_tick(id, target, property, false, false, scene)?.tick)
    }

    fn note_skipped(
        &mut self,
        id: TimelineId,
        tick: bool,
        target: NodeId,
        property: PropertyId,
        scene: &dyn SceneGraph,
    ) -> Result<()> {
        let has_parent = scene.parent(target).is_some();
        let leaf = self.leaf_mut(id)?;
        if tick {
            leaf.warned_dependent = false;
        } else if !leaf.warned_dependent && has_parent {
            leaf.warned_dependent = true;
            warn!(
                "Animation of \"{}\" on \"{}\" is not independent and will be skipped",
                property.name(),
                scene.debug_label(target)
            );
        }
        Ok(())
    }

    fn set_independent(&mut self, id: TimelineId, independent: bool) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.is_independent != independent {
            node.is_independent = independent;
            self.events.push(TimelineEvent::IndependentAnimationChanged {
                timeline: id,
                independent,
            });
        }
        Ok(())
    }

    fn sync_mirror(
        &mut self,
        id: TimelineId,
        independent: bool,
        targets: Vec<IndependentTarget>,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        if !independent {
            return self.stop_mirror(id, host);
        }

        let node = self.node(id)?;
        let leaf = self.leaf(id)?;
        let wants_mirror = matches!(node.state, ClockState::NotStarted | ClockState::Active)
            && leaf.mirror.is_none()
            && !node.completed_fired
            && self.policy.compositor_enabled;
        let Some(mut animation) = leaf.mirror_template.clone().filter(|_| wants_mirror) else {
            return Ok(());
        };

        animation.targets = targets;
        let (sender, receiver) = completion_channel();
        let mirror = host.compositor.begin_mirror(animation, sender);
        debug!(timeline = id.0, mirror = mirror.0, "mirror started");

        let node = self.node_mut(id)?;
        node.waiting_for_compositor = true;
        if let Some(leaf) = node.leaf_mut() {
            leaf.mirror = Some(MirrorHandle {
                id: mirror,
                receiver,
                completed: false,
            });
        }
        Ok(())
    }

    /// Stop the leaf's mirror, if it has one.
    pub(crate) fn stop_mirror(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        let node = self.node_mut(id)?;
        node.waiting_for_compositor = false;
        if let Some(handle) = node.leaf_mut().and_then(|leaf| leaf.mirror.take()) {
            host.compositor.stop_mirror(handle.id);
            debug!(timeline = id.0, mirror = handle.id.0, "mirror stopped");
        }
        Ok(())
    }

    fn take_control_from(&mut self, prior: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        self.stop_mirror(prior, host)?;
        if let Some(leaf) = self.node_mut(prior)?.leaf_mut() {
            leaf.has_control = false;
        }
        debug!(timeline = prior.0, "lost control of its property");
        Ok(())
    }

    fn leaf_value(&self, id: TimelineId) -> Result<AnimatableValue> {
        let node = self.node(id)?;
        let leaf = self.leaf(id)?;
        let base = leaf
            .base_value
            .clone()
            .or_else(|| leaf.non_animated_base.clone())
            .ok_or_else(|| {
                TimingError::invalid_operation(
                    ErrorCode::SbBeginNoTarget,
                    format!("timeline {} has no base value", id.0),
                )
            })?;
        Ok(leaf.source.interpolate_current_value(node.progress, &base))
    }

    fn write_value(
        &mut self,
        id: TimelineId,
        target: NodeId,
        property: PropertyId,
        value: AnimatableValue,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        host.scene.set_value(target, property, value.clone())?;
        self.leaf_mut(id)?.current_value = Some(value);
        Ok(())
    }

    /// Give the property back and restore its non-animated value.
    pub(crate) fn finalize_leaf(
        &mut self,
        id: TimelineId,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        node.state = ClockState::Stopped;
        let initialized = node.initialized;
        node.initialized = false;
        node.current_time = 0.0;

        let leaf = self.leaf_mut(id)?;
        leaf.has_control = false;
        leaf.base_stale = true;
        let resolved = leaf.resolved;
        let base = leaf.non_animated_base.clone();
        self.stop_mirror(id, host)?;

        let Some((weak, property)) = resolved else {
            return Ok(());
        };
        let owned = self.clear_property_record(weak.id(), property, id).is_some();
        if let (true, true, Some(target), Some(base)) =
            (owned, initialized, host.scene.upgrade(weak), base)
        {
            host.scene.set_value(target, property, base)?;
        }
        Ok(())
    }

    /// Mark the leaf ready, re-reading its base value if a stop invalidated it.
    pub(crate) fn initialize_leaf(
        &mut self,
        id: TimelineId,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        self.node_mut(id)?.initialized = true;
        let leaf = self.leaf_mut(id)?;
        if !leaf.base_stale {
            return Ok(());
        }
        leaf.base_stale = false;

        let Some((weak, property)) = leaf.resolved else {
            return Ok(());
        };
        let Some(live) = host.scene.upgrade(weak).and_then(|t| host.scene.value(t, property)) else {
            return Ok(());
        };
        let non_animated = leaf.non_animated_base.clone().unwrap_or_else(|| live.clone());
        leaf.source.compute_to_from_by(&live, &non_animated)?;
        leaf.base_value = Some(live);
        Ok(())
    }

    /// Drop the resolved target and control of the property.
    pub(crate) fn release_target(&mut self, id: TimelineId) -> Result<()> {
        let leaf = self.leaf_mut(id)?;
        leaf.resolved = None;
        leaf.has_control = false;
        Ok(())
    }

    /// Drop this leaf's property registration, if it holds one.
    fn release_registration(&mut self, id: TimelineId) -> Result<()> {
        if let Some((weak, property)) = self.leaf(id)?.resolved {
            self.clear_property_record(weak.id(), property, id);
        }
        self.release_target(id)
    }

    pub(crate) fn clear_property_record(
        &mut self,
        target: NodeId,
        property: PropertyId,
        controller: TimelineId,
    ) -> Option<PropertyRecord> {
        match self.properties.get(&(target, property)) {
            Some(record) if record.controller == controller => {
                self.properties.remove(&(target, property))
            }
            _ => None,
        }
    }
}
