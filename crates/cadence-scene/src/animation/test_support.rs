//! Host doubles wired together for engine tests.

use super::compositor::RecordingCompositor;
use super::manager::{HostContext, TimeManager};
use super::scheduler::RecordingScheduler;
use super::types::{AnimatableValue, TimelineId};
use crate::error::Result;
use crate::scene::{NodeId, PropertyId, SceneGraph, SceneTree};

pub(crate) struct Fixture {
    pub scene: SceneTree,
    pub scheduler: RecordingScheduler,
    pub compositor: RecordingCompositor,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_compositor(RecordingCompositor::new())
    }

    pub fn with_compositor(compositor: RecordingCompositor) -> Self {
        Self {
            scene: SceneTree::new(),
            scheduler: RecordingScheduler::new(),
            compositor,
        }
    }

    pub fn host(&mut self) -> HostContext<'_> {
        HostContext::new(&mut self.scene, &mut self.scheduler, &mut self.compositor)
    }

    pub fn begin(&mut self, manager: &mut TimeManager, storyboard: TimelineId) -> Result<()> {
        manager.begin(storyboard, &mut self.host())
    }

    pub fn tick(&mut self, manager: &mut TimeManager, time: f64) {
        manager.tick(time, &mut self.host());
    }

    /// Numeric value of a property.
    pub fn value(&self, node: NodeId, property: PropertyId) -> Option<f64> {
        self.scene.value(node, property).and_then(|v| v.as_f64())
    }

    pub fn set(&mut self, node: NodeId, property: PropertyId, value: f64) {
        self.scene
            .set_value(node, property, AnimatableValue::from(value))
            .expect("property accepts numbers");
    }
}
