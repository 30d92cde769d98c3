//! Timeline tree nodes and per-tick clock composition.
//!
//! A timing tree is a set of [`TimelineNode`]s owned by the
//! [`TimeManager`](super::manager::TimeManager) and linked by id. Containers
//! (storyboards, parallel groups, template proxies) hand their local time to
//! their children; leaves turn local progress into property values.
//!
//! ```text
//! Storyboard (root, time = global time + delta)
//!   ├── Leaf  Opacity 0 → 1
//!   └── Parallel (begin 0.5s, speed 2)
//!         └── Leaf  (Canvas.Left) key frames
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::clock::{self, ClockParams, ClockTiming, CompletionWait};
use super::events::{ListenerToken, TimelineEvent};
use super::leaf::Leaf;
use super::manager::{HostContext, TimeManager};
use super::scheduler::RequestFrameReason;
use super::types::{
    ClockState, Duration, FillBehavior, RepeatBehavior, ResolvedDuration, TimelineId,
};
use crate::error::Result;
use crate::scene::{PropertyId, WeakNode};

/// Declared timing attributes of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingProperties {
    /// Offset in the parent's time frame, in seconds.
    pub begin_time: f64,
    pub duration: Duration,
    pub speed_ratio: f64,
    pub repeat: RepeatBehavior,
    pub auto_reverse: bool,
    pub fill: FillBehavior,
}

impl Default for TimingProperties {
    fn default() -> Self {
        Self {
            begin_time: 0.0,
            duration: Duration::Automatic,
            speed_ratio: 1.0,
            repeat: RepeatBehavior::default(),
            auto_reverse: false,
            fill: FillBehavior::HoldEnd,
        }
    }
}

impl TimingProperties {
    pub fn with_duration(seconds: f64) -> Self {
        Self {
            duration: Duration::seconds(seconds),
            ..Self::default()
        }
    }
}

/// What a node animates, before resolution.
///
/// Unset fields are inherited from the nearest ancestor that sets them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSpec {
    pub target_name: Option<String>,
    /// Property path text, parsed at begin.
    pub target_property: Option<String>,
    /// Explicit target; wins over `target_name`.
    pub manual_target: Option<WeakNode>,
    /// Explicit property; wins over `target_property`.
    pub manual_property: Option<PropertyId>,
}

/// Control state of a storyboard.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryboardState {
    pub(crate) is_stopped: bool,
    pub(crate) is_paused: bool,
    pub(crate) is_resuming: bool,
    pub(crate) is_seeking: bool,
    pub(crate) is_beginning: bool,
    pub(crate) pending_seek: f64,
    /// Offset added to the parent time to get this storyboard's parent time.
    pub(crate) time_delta: f64,
    pub(crate) last_parent_time: Option<f64>,
}

impl Default for StoryboardState {
    fn default() -> Self {
        Self {
            is_stopped: true,
            is_paused: false,
            is_resuming: false,
            is_seeking: false,
            is_beginning: false,
            pending_seek: 0.0,
            time_delta: 0.0,
            last_parent_time: None,
        }
    }
}

impl StoryboardState {
    pub fn is_stopped(&self) -> bool {
        self.is_stopped
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub(crate) fn clear_flags(&mut self) {
        self.is_paused = false;
        self.is_resuming = false;
        self.is_seeking = false;
        self.is_beginning = false;
    }
}

/// Flavour of a container node.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerKind {
    Storyboard(StoryboardState),
    Parallel,
    /// Resolve proxy for names inside a template instantiation.
    Dynamic { template_owner: Option<WeakNode> },
}

#[derive(Debug)]
pub enum NodeBody {
    Container {
        kind: ContainerKind,
        children: Vec<TimelineId>,
    },
    Leaf(Box<Leaf>),
}

/// One node of a timing tree.
#[derive(Debug)]
pub struct TimelineNode {
    pub(crate) id: TimelineId,
    pub(crate) parent: Option<TimelineId>,
    pub(crate) timing: TimingProperties,
    pub(crate) target: TargetSpec,
    pub(crate) body: NodeBody,

    pub(crate) state: ClockState,
    pub(crate) current_time: f64,
    pub(crate) progress: f64,
    pub(crate) iteration: i64,
    /// Direction this node plays in, after its parent's and its own reversal.
    pub(crate) is_reversed: bool,
    pub(crate) initialized: bool,
    pub(crate) completed_fired: bool,

    /// Played by the compositor on the last tick (any child, for containers).
    pub(crate) is_independent: bool,
    /// A mirror below this node has not reported completion.
    pub(crate) waiting_for_compositor: bool,
    pub(crate) expired_while_waiting: bool,
    pub(crate) cannot_convert: bool,

    pub(crate) host_refs: usize,
    pub(crate) listeners: Vec<ListenerToken>,
}

impl TimelineNode {
    pub(crate) fn new(timing: TimingProperties, body: NodeBody) -> Self {
        Self {
            id: TimelineId::new(),
            parent: None,
            timing,
            target: TargetSpec::default(),
            body,
            state: ClockState::NotStarted,
            current_time: 0.0,
            progress: 0.0,
            iteration: 0,
            is_reversed: false,
            initialized: false,
            completed_fired: false,
            is_independent: false,
            waiting_for_compositor: false,
            expired_while_waiting: false,
            cannot_convert: false,
            host_refs: 0,
            listeners: Vec::new(),
        }
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    pub fn parent(&self) -> Option<TimelineId> {
        self.parent
    }

    pub fn timing(&self) -> &TimingProperties {
        &self.timing
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    /// Clock state with `NotStarted` reported as `Active`.
    pub fn current_state(&self) -> ClockState {
        self.state.public()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn current_progress(&self) -> f64 {
        self.progress
    }

    pub fn current_iteration(&self) -> i64 {
        self.iteration
    }

    pub fn is_independent(&self) -> bool {
        self.is_independent
    }

    pub fn children(&self) -> &[TimelineId] {
        match &self.body {
            NodeBody::Container { children, .. } => children,
            NodeBody::Leaf(_) => &[],
        }
    }

    pub fn leaf(&self) -> Option<&Leaf> {
        match &self.body {
            NodeBody::Leaf(leaf) => Some(leaf),
            NodeBody::Container { .. } => None,
        }
    }

    pub(crate) fn leaf_mut(&mut self) -> Option<&mut Leaf> {
        match &mut self.body {
            NodeBody::Leaf(leaf) => Some(leaf),
            NodeBody::Container { .. } => None,
        }
    }

    pub fn container_kind(&self) -> Option<&ContainerKind> {
        match &self.body {
            NodeBody::Container { kind, .. } => Some(kind),
            NodeBody::Leaf(_) => None,
        }
    }

    pub fn storyboard(&self) -> Option<&StoryboardState> {
        match &self.body {
            NodeBody::Container {
                kind: ContainerKind::Storyboard(state),
                ..
            } => Some(state),
            _ => None,
        }
    }

    pub(crate) fn storyboard_mut(&mut self) -> Option<&mut StoryboardState> {
        match &mut self.body {
            NodeBody::Container {
                kind: ContainerKind::Storyboard(state),
                ..
            } => Some(state),
            _ => None,
        }
    }
}

impl TimeManager {
    /// Per-iteration duration of a node with `Automatic` resolved.
    pub fn natural_duration(&self, id: TimelineId) -> Result<ResolvedDuration> {
        let node = self.node(id)?;
        let resolved = match node.timing.duration {
            Duration::TimeSpan { seconds } => ResolvedDuration::TimeSpan { seconds },
            Duration::Forever => ResolvedDuration::Forever,
            Duration::Automatic => match &node.body {
                NodeBody::Leaf(leaf) => ResolvedDuration::TimeSpan {
                    seconds: leaf.automatic_duration(),
                },
                NodeBody::Container { children, .. } => {
                    let mut end: f64 = 0.0;
                    for child in children {
                        let child_node = self.node(*child)?;
                        let natural = self.natural_duration(*child)?;
                        let timing = &child_node.timing;
                        match clock::effective_duration(
                            natural,
                            timing.repeat,
                            timing.speed_ratio,
                            timing.auto_reverse,
                        ) {
                            Some(duration) => end = end.max(timing.begin_time + duration),
                            None => return Ok(ResolvedDuration::Forever),
                        }
                    }
                    ResolvedDuration::TimeSpan { seconds: end }
                }
            },
        };
        Ok(resolved)
    }

    pub(crate) fn clock_timing(&self, id: TimelineId) -> Result<ClockTiming> {
        let natural_duration = self.natural_duration(id)?;
        let timing = &self.node(id)?.timing;
        Ok(ClockTiming {
            begin_time: timing.begin_time,
            natural_duration,
            repeat: timing.repeat,
            speed_ratio: timing.speed_ratio,
            auto_reverse: timing.auto_reverse,
            fill: timing.fill,
        })
    }

    /// Parent-frame time at which the node's active period ends.
    pub fn expiration_time(&self, id: TimelineId) -> Result<Option<f64>> {
        Ok(clock::expiration_time(&self.clock_timing(id)?))
    }

    /// Compute state for `id` and its subtree from the parent's parameters.
    pub(crate) fn compute_state(
        &mut self,
        id: TimelineId,
        params: ClockParams,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        if self.node(id)?.storyboard().is_some() {
            return self.compute_storyboard(id, params, host);
        }
        self.compute_state_impl(id, params, host)
    }

    pub(crate) fn compute_state_impl(
        &mut self,
        id: TimelineId,
        params: ClockParams,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let timing = self.clock_timing(id)?;
        let expiration = clock::expiration_time(&timing);
        let tolerance = self.policy.time_tolerance;
        let snap = self.policy.boundary_snap;

        let node = self.node_mut(id)?;
        let previous = node.state;
        let wait = CompletionWait {
            had_independent: node.is_independent,
            waiting: node.waiting_for_compositor,
        };
        let decision = clock::decide_state(&timing, &params, expiration, wait, tolerance);
        node.state = decision.state;
        node.expired_while_waiting = decision.expired_while_waiting;

        if matches!(previous, ClockState::Filling | ClockState::Stopped)
            && matches!(decision.state, ClockState::Active | ClockState::NotStarted)
        {
            node.completed_fired = false;
        }

        if decision.compute_progress
            && matches!(decision.state, ClockState::Active | ClockState::Filling)
        {
            let local = clock::local_progress(
                &timing,
                timing.natural_duration,
                decision.clamped_parent_time,
                expiration,
                wait.had_independent,
                tolerance,
                snap,
            );
            node.current_time = local.current_time;
            node.progress = local.progress;
            node.iteration = local.iteration;
            node.is_reversed = params.is_reversed != local.locally_reversed;
        }

        let mine = ClockParams {
            has_time: matches!(node.state, ClockState::Active | ClockState::Filling),
            time: node.current_time,
            is_reversed: node.is_reversed,
            speed_ratio: params.speed_ratio * timing.speed_ratio,
            is_paused: params.is_paused,
            ancestor_waiting: params.ancestor_waiting && node.waiting_for_compositor,
            cannot_convert: params.cannot_convert || node.cannot_convert,
        };

        trace!(
            timeline = id.0,
            state = ?node.state,
            time = node.current_time,
            progress = node.progress,
            "computed state"
        );

        if node.leaf().is_some() {
            self.update_leaf(id, &params, &mine, &timing, expiration, host)
        } else {
            self.update_container(id, &params, &mine, &timing, expiration, host)
        }
    }

    fn update_container(
        &mut self,
        id: TimelineId,
        params: &ClockParams,
        mine: &ClockParams,
        timing: &ClockTiming,
        expiration: Option<f64>,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let children = self.node(id)?.children().to_vec();

        // A failing child must not keep its siblings from ticking.
        let mut first_error = None;
        let mut independent = false;
        let mut waiting = false;
        for child in children {
            if let Err(err) = self.compute_state(child, *mine, host) {
                first_error.get_or_insert(err);
            }
            if let Ok(node) = self.node(child) {
                independent |= node.is_independent;
                waiting |= node.waiting_for_compositor;
            }
        }

        let node = self.node_mut(id)?;
        node.is_independent = independent;
        node.waiting_for_compositor = waiting;
        let state = node.state;
        let current_time = node.current_time;

        match state {
            ClockState::NotStarted => {
                if let Some(ms) =
                    clock::begin_tick_delay_ms(params, timing.begin_time, params.speed_ratio)
                {
                    host.scheduler
                        .request_additional_frame(ms, RequestFrameReason::AnimationTick);
                }
            }
            ClockState::Active => {
                if let (false, Some(duration)) =
                    (mine.is_paused, timing.natural_duration.seconds())
                {
                    let remaining = if mine.is_reversed {
                        current_time
                    } else {
                        duration - current_time
                    };
                    let ms = clock::ms_ceil(remaining * 1000.0 / mine.speed_ratio);
                    host.scheduler
                        .request_additional_frame(ms, RequestFrameReason::AnimationTick);
                }
            }
            ClockState::Filling | ClockState::Stopped => {
                let node = self.node(id)?;
                if node.initialized && !node.completed_fired {
                    self.fire_completed(id)?;
                }
                if state == ClockState::Stopped {
                    self.finalize_iteration(id, host)?;
                }
                if let Some(ms) = clock::end_tick_delay_ms(params, expiration, params.speed_ratio) {
                    host.scheduler
                        .request_additional_frame(ms, RequestFrameReason::AnimationTick);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn fire_completed(&mut self, id: TimelineId) -> Result<()> {
        let node = self.node_mut(id)?;
        node.completed_fired = true;
        debug!(timeline = id.0, "completed");
        self.events.push(TimelineEvent::Completed { timeline: id });
        Ok(())
    }

    /// Stop `id` and its subtree, releasing animated properties.
    pub(crate) fn finalize_iteration(
        &mut self,
        id: TimelineId,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        node.state = ClockState::Stopped;
        if node.leaf().is_some() {
            return self.finalize_leaf(id, host);
        }

        node.initialized = false;
        let children = node.children().to_vec();
        let mut first_error = None;
        for child in children {
            if let Err(err) = self.finalize_iteration(child, host) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Prepare `id` and its subtree for a new active period.
    pub(crate) fn initialize_iteration(
        &mut self,
        id: TimelineId,
        host: &mut HostContext<'_>,
    ) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.leaf().is_some() {
            return self.initialize_leaf(id, host);
        }

        node.initialized = true;
        for child in node.children().to_vec() {
            self.initialize_iteration(child, host)?;
        }
        Ok(())
    }

    /// Every leaf at or below `id`, in tree order.
    pub(crate) fn descendant_leaves(&self, id: TimelineId) -> Result<Vec<TimelineId>> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            match &node.body {
                NodeBody::Leaf(_) => leaves.push(current),
                NodeBody::Container { children, .. } => stack.extend(children.iter().rev()),
            }
        }
        Ok(leaves)
    }

    /// Every node strictly below `id`.
    pub(crate) fn descendants(&self, id: TimelineId) -> Result<Vec<TimelineId>> {
        let mut all = Vec::new();
        let mut stack = self.node(id)?.children().to_vec();
        while let Some(current) = stack.pop() {
            all.push(current);
            stack.extend(self.node(current)?.children().iter().copied());
        }
        Ok(all)
    }

    /// Topmost ancestor of `id` (itself if it has no parent).
    pub fn root_of(&self, id: TimelineId) -> Result<TimelineId> {
        Ok(self.ancestry(id)?.last().copied().unwrap_or(id))
    }

    /// Node and its ancestors, nearest first.
    pub(crate) fn ancestry(&self, id: TimelineId) -> Result<Vec<TimelineId>> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Returns false if the node or any ancestor lasts forever.
    pub fn is_finite(&self, id: TimelineId) -> Result<bool> {
        for node in self.ancestry(id)? {
            let timing = &self.node(node)?.timing;
            if timing.duration == Duration::Forever || timing.repeat == RepeatBehavior::Forever {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::keyframes::KeyFrame;
    use crate::animation::leaf::{FromToByAnimation, KeyFrameAnimation, LeafSource};
    use crate::animation::manager::TimingPolicy;
    use crate::animation::test_support::Fixture;
    use crate::scene::NodeKind;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn simple(manager: &mut TimeManager, timing: TimingProperties) -> TimelineId {
        let source =
            LeafSource::FromToBy(FromToByAnimation::from_to(0.0.into(), 1.0.into()).unwrap());
        manager.create_animation(timing, source).unwrap()
    }

    #[test]
    fn test_container_natural_duration() {
        let mut manager = TimeManager::default();
        let group = manager.create_parallel(TimingProperties::default());
        assert_eq!(
            manager.natural_duration(group).unwrap(),
            ResolvedDuration::TimeSpan { seconds: 0.0 }
        );

        let a = simple(&mut manager, TimingProperties::with_duration(2.0));
        let b = simple(
            &mut manager,
            TimingProperties {
                begin_time: 1.0,
                auto_reverse: true,
                ..TimingProperties::with_duration(1.5)
            },
        );
        manager.add_child(group, a).unwrap();
        manager.add_child(group, b).unwrap();
        assert_eq!(
            manager.natural_duration(group).unwrap(),
            ResolvedDuration::TimeSpan { seconds: 4.0 }
        );

        let forever = simple(
            &mut manager,
            TimingProperties {
                repeat: RepeatBehavior::Forever,
                ..TimingProperties::with_duration(1.0)
            },
        );
        manager.add_child(group, forever).unwrap();
        assert_eq!(manager.natural_duration(group).unwrap(), ResolvedDuration::Forever);
    }

    #[test]
    fn test_leaf_automatic_duration() {
        let mut manager = TimeManager::default();
        let leaf = simple(&mut manager, TimingProperties::default());
        assert_eq!(
            manager.natural_duration(leaf).unwrap(),
            ResolvedDuration::TimeSpan { seconds: 1.0 }
        );

        let frames = KeyFrameAnimation::new(vec![
            KeyFrame::linear(0.5, 1.0.into()),
            KeyFrame::linear(2.5, 2.0.into()),
        ])
        .unwrap();
        let leaf = manager
            .create_animation(TimingProperties::default(), LeafSource::KeyFrames(frames))
            .unwrap();
        assert_eq!(
            manager.natural_duration(leaf).unwrap(),
            ResolvedDuration::TimeSpan { seconds: 2.5 }
        );
    }

    #[test]
    fn test_is_finite_walks_ancestors() {
        let mut manager = TimeManager::default();
        let outer = manager.create_parallel(TimingProperties {
            repeat: RepeatBehavior::Forever,
            ..TimingProperties::default()
        });
        let leaf = simple(&mut manager, TimingProperties::with_duration(1.0));
        assert!(manager.is_finite(leaf).unwrap());
        manager.add_child(outer, leaf).unwrap();
        assert!(!manager.is_finite(leaf).unwrap());
    }

    #[test]
    fn test_nested_begin_time_and_speed() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        let mut manager = TimeManager::new(TimingPolicy::default().without_compositor());

        let storyboard = manager.create_storyboard(TimingProperties::default());
        let group = manager.create_parallel(TimingProperties {
            begin_time: 1.0,
            speed_ratio: 2.0,
            ..TimingProperties::default()
        });
        let leaf = simple(&mut manager, TimingProperties::with_duration(1.0));
        manager.set_manual_target(leaf, element, PropertyId::Opacity).unwrap();
        manager.add_child(group, leaf).unwrap();
        manager.add_child(storyboard, group).unwrap();

        fx.begin(&mut manager, storyboard).unwrap();
        fx.tick(&mut manager, 10.0);
        assert_eq!(manager.node(leaf).unwrap().state, ClockState::NotStarted);
        // The group starts one second in.
        assert!(fx.scheduler.has_request(1000, RequestFrameReason::AnimationTick));

        fx.tick(&mut manager, 11.25);
        let node = manager.node(leaf).unwrap();
        assert_eq!(node.state, ClockState::Active);
        assert!(approx_eq(node.current_progress(), 0.5));
        assert_eq!(fx.value(element, PropertyId::Opacity), Some(0.5));

        fx.tick(&mut manager, 11.5);
        assert_eq!(manager.node(leaf).unwrap().state, ClockState::Filling);
        assert_eq!(fx.value(element, PropertyId::Opacity), Some(1.0));
    }

    #[test]
    fn test_autoreverse_container_reverses_children() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        let mut manager = TimeManager::new(TimingPolicy::default().without_compositor());

        let storyboard = manager.create_storyboard(TimingProperties {
            auto_reverse: true,
            ..TimingProperties::default()
        });
        let leaf = simple(&mut manager, TimingProperties::with_duration(1.0));
        manager.set_manual_target(leaf, element, PropertyId::Opacity).unwrap();
        manager.add_child(storyboard, leaf).unwrap();

        fx.begin(&mut manager, storyboard).unwrap();
        fx.tick(&mut manager, 0.0);
        fx.tick(&mut manager, 1.25);
        assert!(manager.node(storyboard).unwrap().is_reversed);
        assert_eq!(fx.value(element, PropertyId::Opacity), Some(0.75));

        fx.tick(&mut manager, 2.0);
        assert_eq!(manager.node(storyboard).unwrap().state, ClockState::Filling);
        assert_eq!(fx.value(element, PropertyId::Opacity), Some(0.0));
    }

    #[test]
    fn test_stop_fill_restores_base_value() {
        let mut fx = Fixture::new();
        let element = fx.scene.create(NodeKind::Element);
        fx.set(element, PropertyId::Width, 40.0);
        let mut manager = TimeManager::new(TimingPolicy::default().without_compositor());

        let storyboard = manager.create_storyboard(TimingProperties::default());
        let source = LeafSource::FromToBy(FromToByAnimation::to(100.0.into()).unwrap());
        let leaf = manager
            .create_animation(
                TimingProperties {
                    fill: FillBehavior::Stop,
                    ..TimingProperties::with_duration(1.0)
                },
                source,
            )
            .unwrap();
        manager.set_manual_target(leaf, element, PropertyId::Width).unwrap();
        manager.set_enable_dependent_animation(leaf, true).unwrap();
        manager.add_child(storyboard, leaf).unwrap();

        fx.begin(&mut manager, storyboard).unwrap();
        fx.tick(&mut manager, 0.0);
        fx.tick(&mut manager, 0.5);
        assert_eq!(fx.value(element, PropertyId::Width), Some(70.0));

        fx.tick(&mut manager, 1.5);
        assert_eq!(manager.node(leaf).unwrap().state, ClockState::Stopped);
        assert_eq!(fx.value(element, PropertyId::Width), Some(40.0));
        let completed: Vec<_> = manager.drain_events().filter(|e| e.is_completed()).collect();
        assert!(completed.contains(&TimelineEvent::Completed { timeline: leaf }));
    }
}
