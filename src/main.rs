use anyhow::{Context, Result};
use cadence_config::EngineConfig;
use cadence_scene::animation::{
    HostContext, RecordingCompositor, RecordingScheduler, TimeManager, TimelineSpec,
};
use cadence_scene::animation::types::ClockState;
use cadence_scene::scene::{NodeKind, PropertyId, SceneGraph, SceneTree};

const DEMO_STORYBOARD: &str = r#"{
    "kind": "storyboard",
    "target_name": "box",
    "children": [
        {
            "kind": "animation",
            "target_property": "Opacity",
            "timing": {
                "duration": { "type": "time_span", "seconds": 0.5 },
                "auto_reverse": true
            },
            "from": { "type": "f64", "value": 1.0 },
            "to": { "type": "f64", "value": 0.2 },
            "easing": { "type": "ease_in_out" },
            "enable_dependent_animation": true
        },
        {
            "kind": "key_frames",
            "target_property": "(UIElement.RenderTransform).(TranslateTransform.X)",
            "frames": [
                { "key_time": 0.0, "value": { "type": "f64", "value": 0.0 } },
                { "key_time": 0.75, "value": { "type": "f64", "value": 160.0 } },
                { "key_time": 1.5, "value": { "type": "f64", "value": 200.0 },
                  "kind": { "type": "discrete" } }
            ]
        }
    ]
}"#;

fn main() -> Result<()> {
    env_logger::init();

    let config = EngineConfig::load();
    log::info!(
        "cadence demo: fps={} seconds={} compositor={}",
        config.demo.frames_per_second,
        config.demo.run_seconds,
        config.compositor.enabled
    );

    let mut scene = SceneTree::new();
    let page = scene.create(NodeKind::Element);
    let element = scene.create_child(page, NodeKind::Element);
    scene.set_name(element, "box");
    let translate = scene.create(NodeKind::TranslateTransform);
    scene
        .set_value(element, PropertyId::RenderTransform, translate.into())
        .context("attach render transform")?;

    let mut scheduler = RecordingScheduler::new();
    let mut compositor = RecordingCompositor::new();
    let mut manager = TimeManager::from_config(&config);

    let storyboard = TimelineSpec::from_json(DEMO_STORYBOARD)?
        .build(&mut manager)
        .context("build demo storyboard")?;
    manager.retain(storyboard)?;
    manager.begin(
        storyboard,
        &mut HostContext::new(&mut scene, &mut scheduler, &mut compositor),
    )?;

    let fps = config.demo.frames_per_second.max(1);
    let frames = (config.demo.run_seconds * f64::from(fps)).ceil() as u64;
    for frame in 0..=frames {
        let time = frame as f64 / f64::from(fps);
        manager.tick(
            time,
            &mut HostContext::new(&mut scene, &mut scheduler, &mut compositor),
        );

        let opacity = scene.value(element, PropertyId::Opacity).and_then(|v| v.as_f64());
        let x = scene.value(translate, PropertyId::TranslateX).and_then(|v| v.as_f64());
        log::info!(
            "t={time:.3} state={:?} opacity={opacity:?} x={x:?} mirrors={}",
            manager.current_state(storyboard)?,
            compositor.running_count()
        );
        for request in scheduler.take() {
            log::debug!("frame requested: {request:?}");
        }
        for event in manager.drain_events() {
            log::info!("event: {event:?}");
        }
    }

    // The recording compositor never finishes on its own.
    let completed = compositor.complete_all();
    let end = manager.last_tick_time().unwrap_or_default() + 1.0 / f64::from(fps);
    manager.tick(
        end,
        &mut HostContext::new(&mut scene, &mut scheduler, &mut compositor),
    );
    for event in manager.drain_events() {
        log::info!("event: {event:?}");
    }
    log::info!(
        "completed {completed} mirror(s); storyboard is {:?}",
        manager.current_state(storyboard)?
    );

    if manager.current_state(storyboard)? == ClockState::Filling {
        manager.stop(
            storyboard,
            &mut HostContext::new(&mut scene, &mut scheduler, &mut compositor),
        )?;
        log::info!(
            "stopped; opacity restored to {:?}",
            scene.value(element, PropertyId::Opacity)
        );
    }
    Ok(())
}
