//! Time manager: owner of every timing tree.
//!
//! The `TimeManager` is the central coordinator for animation timing. It
//! handles:
//! - Creating timeline nodes and linking them into trees
//! - Validating mutations against running storyboards
//! - Ticking every registered root once per frame
//! - Tracking which animation controls each (node, property) pair
//! - Polling compositor mirrors for completion
//! - Queueing events and counting external references
//!
//! # Usage
//!
//! ```ignore
//! use cadence_scene::animation::manager::{HostContext, TimeManager};
//! use cadence_scene::animation::leaf::{FromToByAnimation, LeafSource};
//! use cadence_scene::animation::timeline::TimingProperties;
//!
//! let mut manager = TimeManager::default();
//! let storyboard = manager.create_storyboard(TimingProperties::default());
//! let fade = manager.create_animation(
//!     TimingProperties::with_duration(0.3),
//!     LeafSource::FromToBy(FromToByAnimation::to(0.0.into())?),
//! )?;
//! manager.set_manual_target(fade, element, PropertyId::Opacity)?;
//! manager.add_child(storyboard, fade)?;
//!
//! let mut host = HostContext::new(&mut scene, &mut scheduler, &mut compositor);
//! manager.begin(storyboard, &mut host)?;
//!
//! // Each frame
//! manager.tick(now_seconds, &mut host);
//! for event in manager.drain_events() {
//!     // React to completions
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use cadence_config::EngineConfig;
use tracing::{debug, trace, warn};

use super::clock::ClockParams;
use super::compositor::{Compositor, CompositorLimits};
use super::events::{EventQueue, ListenerToken, TimelineEvent};
use super::keyframes::KeyFrameCollection;
use super::leaf::{Leaf, LeafSource};
use super::scheduler::{FrameScheduler, RequestFrameReason};
use super::timeline::{ContainerKind, NodeBody, TimelineNode, TimingProperties};
use super::types::{AnimatableValue, ClockState, Duration, FillBehavior, RepeatBehavior, TimelineId};
use crate::error::{ErrorCode, ErrorPolicy, Result, TimingError};
use crate::scene::{NodeId, PropertyId, SceneGraph, WeakNode};

/// Host collaborators borrowed for one engine call.
pub struct HostContext<'a> {
    pub scene: &'a mut dyn SceneGraph,
    pub scheduler: &'a mut dyn FrameScheduler,
    pub compositor: &'a mut dyn Compositor,
}

impl<'a> HostContext<'a> {
    pub fn new(
        scene: &'a mut dyn SceneGraph,
        scheduler: &'a mut dyn FrameScheduler,
        compositor: &'a mut dyn Compositor,
    ) -> Self {
        Self {
            scene,
            scheduler,
            compositor,
        }
    }
}

/// Engine-wide knobs, usually derived from [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingPolicy {
    pub errors: ErrorPolicy,
    /// Whether dependent animations that opted in may tick on the UI thread.
    pub allow_dependent_animations: bool,
    /// Seconds within which a node counts as expired.
    pub time_tolerance: f64,
    /// Progress distance from an iteration boundary snapped to it on expiry.
    pub boundary_snap: f64,
    pub compositor_enabled: bool,
    pub limits: CompositorLimits,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for TimingPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            errors: ErrorPolicy::new(config.timing.fail_fast),
            allow_dependent_animations: config.timing.allow_dependent_animations,
            time_tolerance: config.timing.time_tolerance_secs,
            boundary_snap: config.timing.boundary_snap,
            compositor_enabled: config.compositor.enabled,
            limits: CompositorLimits {
                minimum_duration: config.compositor.minimum_duration_secs,
                maximum_time: config.compositor.maximum_time_secs,
            },
        }
    }
}

impl TimingPolicy {
    /// Policy from a `cadence.toml` file. Unlike [`EngineConfig::load`], a
    /// missing or malformed file is an error rather than a silent default.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = EngineConfig::load_from_file(path).map_err(TimingError::Config)?;
        Ok(Self::from(&config))
    }

    /// Same policy with mirroring switched off.
    pub fn without_compositor(self) -> Self {
        Self {
            compositor_enabled: false,
            ..self
        }
    }

    /// Same policy with recoverable conditions turned into panics.
    pub fn fail_fast(self) -> Self {
        Self {
            errors: ErrorPolicy::new(true),
            ..self
        }
    }
}

/// Which animation drives a property, and the value underneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub controller: TimelineId,
    pub non_animated_base: AnimatableValue,
}

/// Owner of every timeline node.
///
/// Thread safety: the manager is `Send` so hosts can move it to their UI
/// thread; it is never shared.
#[derive(Debug, Default)]
pub struct TimeManager {
    pub(crate) nodes: HashMap<TimelineId, TimelineNode>,

    /// Roots ticked on every frame, in registration order.
    pub(crate) roots: Vec<TimelineId>,

    /// Property ownership, keyed by (target node, property).
    pub(crate) properties: HashMap<(NodeId, PropertyId), PropertyRecord>,

    pub(crate) events: EventQueue,
    pub(crate) policy: TimingPolicy,
    pub(crate) last_tick_time: Option<f64>,
}

static_assertions::assert_impl_all!(TimeManager: Send);

impl TimeManager {
    pub fn new(policy: TimingPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(TimingPolicy::from(config))
    }

    pub fn policy(&self) -> &TimingPolicy {
        &self.policy
    }

    // ---------------------------------------------------------------------
    // Node access
    // ---------------------------------------------------------------------

    pub fn contains(&self, id: TimelineId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: TimelineId) -> Result<&TimelineNode> {
        self.nodes.get(&id).ok_or(TimingError::MissingTimeline(id))
    }

    pub(crate) fn node_mut(&mut self, id: TimelineId) -> Result<&mut TimelineNode> {
        self.nodes.get_mut(&id).ok_or(TimingError::MissingTimeline(id))
    }

    pub(crate) fn leaf(&self, id: TimelineId) -> Result<&Leaf> {
        self.node(id)?
            .leaf()
            .ok_or_else(|| {
                TimingError::InvalidArgument(format!("timeline {} is not an animation", id.0))
            })
    }

    pub(crate) fn leaf_mut(&mut self, id: TimelineId) -> Result<&mut Leaf> {
        self.node_mut(id)?
            .leaf_mut()
            .ok_or_else(|| {
                TimingError::InvalidArgument(format!("timeline {} is not an animation", id.0))
            })
    }

    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    fn insert(&mut self, mut timing: TimingProperties, body: NodeBody) -> TimelineId {
        if timing.speed_ratio.is_nan() || timing.speed_ratio <= 0.0 {
            warn!(speed_ratio = timing.speed_ratio, "speed ratio must be positive; using 1");
            timing.speed_ratio = 1.0;
        }
        let node = TimelineNode::new(timing, body);
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    fn insert_container(&mut self, timing: TimingProperties, kind: ContainerKind) -> TimelineId {
        self.insert(
            timing,
            NodeBody::Container {
                kind,
                children: Vec::new(),
            },
        )
    }

    /// Create a storyboard. Only root storyboards can be controlled.
    pub fn create_storyboard(&mut self, timing: TimingProperties) -> TimelineId {
        self.insert_container(timing, ContainerKind::Storyboard(Default::default()))
    }

    pub fn create_parallel(&mut self, timing: TimingProperties) -> TimelineId {
        self.insert_container(timing, ContainerKind::Parallel)
    }

    /// Create a resolve proxy. Names below it resolve in `template_owner`'s template scope.
    pub fn create_dynamic(
        &mut self,
        timing: TimingProperties,
        template_owner: Option<NodeId>,
    ) -> TimelineId {
        self.insert_container(
            timing,
            ContainerKind::Dynamic {
                template_owner: template_owner.map(WeakNode::new),
            },
        )
    }

    pub fn create_animation(
        &mut self,
        timing: TimingProperties,
        source: LeafSource,
    ) -> Result<TimelineId> {
        if let (Some(frames), Duration::TimeSpan { seconds }) =
            (source.key_frames(), timing.duration)
        {
            frames.validate_against(seconds)?;
        }
        Ok(self.insert(timing, NodeBody::Leaf(Box::new(Leaf::new(source)))))
    }

    /// Append `child` to the container `parent`.
    pub fn add_child(&mut self, parent: TimelineId, child: TimelineId) -> Result<()> {
        self.ensure_modifiable(parent)?;
        if self.node(child)?.parent.is_some() {
            return Err(TimingError::InvalidArgument(format!(
                "timeline {} already has a parent",
                child.0
            )));
        }
        if self.ancestry(parent)?.contains(&child) {
            return Err(TimingError::InvalidArgument(format!(
                "adding timeline {} under {} would form a cycle",
                child.0, parent.0
            )));
        }
        match &mut self.node_mut(parent)?.body {
            NodeBody::Container { children, .. } => children.push(child),
            NodeBody::Leaf(_) => {
                return Err(TimingError::InvalidArgument(format!(
                    "timeline {} cannot have children",
                    parent.0
                )));
            }
        }
        self.node_mut(child)?.parent = Some(parent);
        self.roots.retain(|root| *root != child);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: TimelineId, child: TimelineId) -> Result<()> {
        self.ensure_modifiable(parent)?;
        if let NodeBody::Container { children, .. } = &mut self.node_mut(parent)?.body {
            children.retain(|c| *c != child);
        }
        let node = self.node_mut(child)?;
        if node.parent == Some(parent) {
            node.parent = None;
        }
        Ok(())
    }

    /// Destroy `id` and its subtree, stopping mirrors and dropping property ownership.
    pub fn remove(&mut self, id: TimelineId, host: &mut HostContext<'_>) -> Result<()> {
        if let Some(parent) = self.node(id)?.parent {
            if let NodeBody::Container { children, .. } = &mut self.node_mut(parent)?.body {
                children.retain(|c| *c != id);
            }
        }

        let mut doomed = self.descendants(id)?;
        doomed.push(id);
        for node in doomed {
            if self.node(node)?.leaf().is_some() {
                self.stop_mirror(node, host)?;
                if let Some((weak, property)) = self.leaf(node)?.resolved {
                    self.clear_property_record(weak.id(), property, node);
                }
            }
            self.nodes.remove(&node);
            self.roots.retain(|root| *root != node);
        }
        debug!(timeline = id.0, "removed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// True when the tree holding `id` is not running.
    pub fn can_be_modified(&self, id: TimelineId) -> Result<bool> {
        let root = self.root_of(id)?;
        Ok(match self.node(root)?.storyboard() {
            Some(storyboard) => storyboard.is_stopped(),
            None => !self.roots.contains(&root),
        })
    }

    fn ensure_modifiable(&self, id: TimelineId) -> Result<()> {
        if self.can_be_modified(id)? {
            return Ok(());
        }
        self.policy.errors.report(TimingError::invalid_operation(
            ErrorCode::SbModifyActiveAnimation,
            format!("timeline {} belongs to a running storyboard", id.0),
        ))
    }

    fn modify_timing(
        &mut self,
        id: TimelineId,
        f: impl FnOnce(&mut TimingProperties),
    ) -> Result<()> {
        self.ensure_modifiable(id)?;
        f(&mut self.node_mut(id)?.timing);
        Ok(())
    }

    pub fn set_begin_time(&mut self, id: TimelineId, seconds: f64) -> Result<()> {
        self.modify_timing(id, |t| t.begin_time = seconds)
    }

    pub fn set_duration(&mut self, id: TimelineId, duration: Duration) -> Result<()> {
        self.ensure_modifiable(id)?;
        if let (Some(frames), Duration::TimeSpan { seconds }) =
            (self.key_frames_of(id)?, duration)
        {
            frames.validate_against(seconds)?;
        }
        self.node_mut(id)?.timing.duration = duration;
        Ok(())
    }

    /// Set the speed ratio. A non-positive ratio is replaced by 1 and reported.
    pub fn set_speed_ratio(&mut self, id: TimelineId, ratio: f64) -> Result<()> {
        self.ensure_modifiable(id)?;
        let timing = &mut self.node_mut(id)?.timing;
        if ratio > 0.0 {
            timing.speed_ratio = ratio;
            return Ok(());
        }
        timing.speed_ratio = 1.0;
        Err(TimingError::InvalidArgument(format!(
            "speed ratio must be positive, got {ratio}"
        )))
    }

    pub fn set_repeat(&mut self, id: TimelineId, repeat: RepeatBehavior) -> Result<()> {
        self.modify_timing(id, |t| t.repeat = repeat)
    }

    pub fn set_auto_reverse(&mut self, id: TimelineId, auto_reverse: bool) -> Result<()> {
        self.modify_timing(id, |t| t.auto_reverse = auto_reverse)
    }

    pub fn set_fill(&mut self, id: TimelineId, fill: FillBehavior) -> Result<()> {
        self.modify_timing(id, |t| t.fill = fill)
    }

    pub fn set_target_name(&mut self, id: TimelineId, name: impl Into<String>) -> Result<()> {
        self.ensure_modifiable(id)?;
        self.node_mut(id)?.target.target_name = Some(name.into());
        Ok(())
    }

    /// Set the property path, e.g. `"(UIElement.RenderTransform).(TranslateTransform.X)"`.
    pub fn set_target_property(&mut self, id: TimelineId, path: impl Into<String>) -> Result<()> {
        self.ensure_modifiable(id)?;
        self.node_mut(id)?.target.target_property = Some(path.into());
        Ok(())
    }

    /// Target a node and property directly, bypassing name and path resolution.
    pub fn set_manual_target(
        &mut self,
        id: TimelineId,
        node: NodeId,
        property: PropertyId,
    ) -> Result<()> {
        self.ensure_modifiable(id)?;
        let target = &mut self.node_mut(id)?.target;
        target.manual_target = Some(WeakNode::new(node));
        target.manual_property = Some(property);
        Ok(())
    }

    pub fn set_enable_dependent_animation(&mut self, id: TimelineId, enabled: bool) -> Result<()> {
        self.leaf_mut(id)?.enable_dependent_animation = enabled;
        Ok(())
    }

    fn key_frames_of(&self, id: TimelineId) -> Result<Option<&KeyFrameCollection>> {
        Ok(self.node(id)?.leaf().and_then(|leaf| leaf.source().key_frames()))
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Public clock state; a node waiting for its begin time reports `Active`.
    pub fn current_state(&self, id: TimelineId) -> Result<ClockState> {
        Ok(self.node(id)?.current_state())
    }

    pub fn current_time(&self, id: TimelineId) -> Result<f64> {
        Ok(self.node(id)?.current_time())
    }

    pub fn current_progress(&self, id: TimelineId) -> Result<f64> {
        Ok(self.node(id)?.current_progress())
    }

    /// Value the leaf last wrote.
    pub fn current_value(&self, id: TimelineId) -> Result<Option<AnimatableValue>> {
        Ok(self.leaf(id)?.current_value().cloned())
    }

    pub fn is_independent(&self, id: TimelineId) -> Result<bool> {
        Ok(self.node(id)?.is_independent())
    }

    /// Animation currently in control of `property` on `node`.
    pub fn animation_on_property(&self, node: NodeId, property: PropertyId) -> Option<TimelineId> {
        self.properties.get(&(node, property)).map(|r| r.controller)
    }

    pub fn roots(&self) -> &[TimelineId] {
        &self.roots
    }

    pub fn last_tick_time(&self) -> Option<f64> {
        self.last_tick_time
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------------------------------------------------------------
    // Events and lifetime
    // ---------------------------------------------------------------------

    pub fn drain_events(&mut self) -> impl Iterator<Item = TimelineEvent> + '_ {
        self.events.drain()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    pub fn peek_event(&self) -> Option<&TimelineEvent> {
        self.events.peek()
    }

    pub fn pop_event(&mut self) -> Option<TimelineEvent> {
        self.events.pop()
    }

    pub fn events_for_timeline(&self, id: TimelineId) -> Vec<&TimelineEvent> {
        self.events.events_for_timeline(id)
    }

    /// Register interest in `id`'s Completed event.
    pub fn add_completed_listener(&mut self, id: TimelineId) -> Result<ListenerToken> {
        let token = ListenerToken::new();
        self.node_mut(id)?.listeners.push(token);
        Ok(token)
    }

    /// Returns false if the token was not registered on `id`.
    pub fn remove_completed_listener(
        &mut self,
        id: TimelineId,
        token: ListenerToken,
    ) -> Result<bool> {
        let listeners = &mut self.node_mut(id)?.listeners;
        let before = listeners.len();
        listeners.retain(|t| *t != token);
        Ok(listeners.len() != before)
    }

    /// Count a host reference. Returns the new count.
    pub fn retain(&mut self, id: TimelineId) -> Result<usize> {
        let node = self.node_mut(id)?;
        node.host_refs += 1;
        Ok(node.host_refs)
    }

    pub fn release(&mut self, id: TimelineId) -> Result<usize> {
        let node = self.node_mut(id)?;
        node.host_refs = node.host_refs.saturating_sub(1);
        Ok(node.host_refs)
    }

    /// True when nothing outside the engine keeps `id` alive.
    ///
    /// Listeners on a node that never finishes would never hear from it,
    /// so they do not count.
    pub fn has_no_external_references(&self, id: TimelineId) -> Result<bool> {
        let node = self.node(id)?;
        let listeners = node.listeners.len();
        let ignored = if self.is_finite(id)? { 0 } else { listeners };
        Ok(node.host_refs + listeners - ignored == 0)
    }

    // ---------------------------------------------------------------------
    // Ticking
    // ---------------------------------------------------------------------

    /// Advance every registered root to `time` seconds.
    ///
    /// Errors inside a tree are logged; one failing tree does not stop the
    /// others from ticking.
    pub fn tick(&mut self, time: f64, host: &mut HostContext<'_>) {
        self.last_tick_time = Some(time);
        self.poll_compositor_completions(host);

        for root in self.roots.clone() {
            if let Err(err) = self.compute_state(root, ClockParams::root(time), host) {
                warn!(timeline = root.0, error = %err, "tick failed");
            }

            let finished = match self.node(root) {
                Ok(node) => {
                    matches!(node.state, ClockState::Filling | ClockState::Stopped)
                        && self.has_no_external_references(root).unwrap_or(false)
                }
                Err(_) => true,
            };
            if finished {
                trace!(timeline = root.0, "root unregistered");
                self.roots.retain(|r| *r != root);
            }
        }
    }

    fn poll_compositor_completions(&mut self, host: &mut HostContext<'_>) {
        for (id, node) in self.nodes.iter_mut() {
            let expired = node.expired_while_waiting;
            let Some(handle) = node.leaf_mut().and_then(|leaf| leaf.mirror.as_mut()) else {
                continue;
            };
            if handle.completed || !handle.receiver.poll() {
                continue;
            }
            handle.completed = true;
            let mirror = handle.id;
            node.waiting_for_compositor = false;
            debug!(timeline = id.0, mirror = mirror.0, "mirror completed");
            if expired {
                host.scheduler
                    .request_additional_frame(0, RequestFrameReason::CompositorCompleted);
            }
        }
    }
}
