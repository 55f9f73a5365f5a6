//! Per-tick frame protocol: wait/begin/end pairing, swapchain image
//! handling, locomotion, the desktop mirror and live preference reloads.

mod common;

use std::time::Duration;

use approx::assert_abs_diff_eq;
use nalgebra::{UnitQuaternion, Vector3};

use common::{position, started, Rig};
use xr_viewer::config::{
    MemoryPreferences, KEY_AMBIENT_LIGHT, KEY_MIRROR, KEY_MOVEMENT, KEY_MSAA,
};
use xr_viewer::error::RuntimeCall;
use xr_viewer::input::{Hand, TriggerEdge};
use xr_viewer::locomotion::MovementMode;
use xr_viewer::pose::{EyeView, Fov, Pose};
use xr_viewer::render::Rect;
use xr_viewer::xr::{FrameOutcome, SkipReason};

// ── Frame submission ────────────────────────────────────────

#[test]
fn test_zero_layers_when_runtime_says_not_to_render() {
    let mut rig = Rig::new();
    rig.runtime.set_should_render_every(0);
    let (mut viewer, log, _) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    log.clear();

    assert_eq!(viewer.tick(), FrameOutcome::Submitted { rendered: false });
    let frames = viewer.runtime().ended_frames();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_none());
    assert_eq!(log.count("xrAcquireSwapchainImage"), 0);
    assert_eq!(log.count("scene: render"), 0);
    assert_eq!(log.count("xrEndFrame layers=0"), 1);
    assert!(viewer.cameras().is_none());
}

#[test]
fn test_every_begun_frame_is_ended() {
    let mut rig = Rig::new();
    rig.runtime.set_should_render_every(2);
    let (mut viewer, log, _) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    for _ in 0..10 {
        viewer.tick();
    }
    assert_eq!(log.count("xrWaitFrame"), 10);
    assert_eq!(log.count("xrBeginFrame"), 10);
    assert_eq!(log.count("xrEndFrame"), 10);
    assert_eq!(log.count("xrEndFrame layers=1"), 5);

    assert_eq!(log.count("xrAcquireSwapchainImage"), 5);
    assert_eq!(log.count("xrWaitSwapchainImage"), 5);
    assert_eq!(log.count("xrReleaseSwapchainImage"), 5);
    assert_eq!(viewer.stats().map(|s| s.total_frames), Some(5));
}

#[test]
fn test_images_rotate_through_swapchain() {
    let (mut viewer, log, _) = started();
    for _ in 0..4 {
        viewer.tick();
    }
    let targets = log.matching("worker: FramebufferTexture Draw Color0 ");
    assert_eq!(
        targets,
        vec![
            "worker: FramebufferTexture Draw Color0 100",
            "worker: FramebufferTexture Draw Color0 101",
            "worker: FramebufferTexture Draw Color0 102",
            "worker: FramebufferTexture Draw Color0 100",
        ]
    );
}

#[test]
fn test_two_image_swapchain_wraps() {
    let mut rig = Rig::new();
    rig.runtime.set_image_count(2);
    let (mut viewer, log, _) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    for _ in 0..3 {
        viewer.tick();
    }
    assert_eq!(
        log.matching("worker: FramebufferTexture Draw Color0 "),
        vec![
            "worker: FramebufferTexture Draw Color0 100",
            "worker: FramebufferTexture Draw Color0 101",
            "worker: FramebufferTexture Draw Color0 100",
        ]
    );
}

#[test]
fn test_layer_splits_target_side_by_side() {
    let (mut viewer, _log, _) = started();
    viewer.tick();
    let Some(Some(layer)) = viewer.runtime().ended_frames().first() else {
        panic!("no projection layer submitted");
    };
    assert_eq!(layer.views[0].image_rect, Rect::new(0, 0, 640, 480));
    assert_eq!(layer.views[1].image_rect, Rect::new(640, 0, 640, 480));
    assert_abs_diff_eq!(layer.views[0].pose.position.x, -0.032);
    assert_abs_diff_eq!(layer.views[1].pose.position.x, 0.032);
}

#[test]
fn test_each_eye_rendered_into_its_half() {
    let (mut viewer, log, _) = started();
    log.clear();
    viewer.tick();
    assert_eq!(
        log.matching("scene: render"),
        vec![
            "scene: render scene=1 viewport=0,0 640x480",
            "scene: render scene=1 viewport=640,0 640x480",
        ]
    );
    assert!(position(&log, "worker: make_current") < position(&log, "xrWaitFrame"));
    assert!(position(&log, "xrEndFrame layers=1") < position(&log, "worker: done_current"));
}

#[test]
fn test_wait_frame_failure_skips_tick() {
    let (mut viewer, log, _) = started();
    viewer.tick();
    viewer
        .runtime_mut()
        .fail_once(RuntimeCall::WaitFrame, "XR_ERROR_SESSION_NOT_RUNNING");
    log.clear();

    assert_eq!(
        viewer.tick(),
        FrameOutcome::Skipped(SkipReason::FrameUnavailable)
    );
    assert_eq!(log.count("xrBeginFrame"), 0);
    assert_eq!(log.count("xrEndFrame"), 0);
    assert!(!viewer.is_terminated());

    assert_eq!(viewer.tick(), FrameOutcome::Submitted { rendered: true });
}

#[test]
fn test_persistent_wait_failure_skips_until_cleared() {
    let (mut viewer, _log, _) = started();
    viewer.tick();
    viewer
        .runtime_mut()
        .fail_on(RuntimeCall::WaitFrame, "XR_TIMEOUT_EXPIRED");
    for _ in 0..3 {
        assert_eq!(
            viewer.tick(),
            FrameOutcome::Skipped(SkipReason::FrameUnavailable)
        );
    }
    viewer.runtime_mut().clear_failures();
    assert_eq!(viewer.tick(), FrameOutcome::Submitted { rendered: true });
    assert_eq!(viewer.stats().map(|s| s.skipped_ticks), Some(3));
}

#[test]
fn test_begin_frame_failure_skips_tick() {
    let (mut viewer, log, _) = started();
    viewer.tick();
    viewer
        .runtime_mut()
        .fail_once(RuntimeCall::BeginFrame, "XR_ERROR_CALL_ORDER_INVALID");
    log.clear();

    assert_eq!(
        viewer.tick(),
        FrameOutcome::Skipped(SkipReason::FrameUnavailable)
    );
    assert_eq!(log.count("xrEndFrame"), 0);
    assert_eq!(viewer.stats().map(|s| s.skipped_ticks), Some(1));
}

#[test]
fn test_render_failure_still_ends_frame_then_tears_down() {
    let (mut viewer, log, _) = started();
    viewer.tick();
    viewer
        .runtime_mut()
        .fail_once(RuntimeCall::AcquireImage, "XR_ERROR_CALL_ORDER_INVALID");
    log.clear();

    assert_eq!(viewer.tick(), FrameOutcome::Terminated);
    assert!(viewer.is_terminated());
    assert_eq!(log.count("xrReleaseSwapchainImage"), 0);
    assert!(position(&log, "xrEndFrame layers=0") < position(&log, "xrDestroy* action spaces"));
}

#[test]
fn test_end_frame_failure_is_fatal() {
    let (mut viewer, log, _) = started();
    viewer.tick();
    viewer
        .runtime_mut()
        .fail_once(RuntimeCall::EndFrame, "XR_ERROR_SESSION_LOST");
    assert_eq!(viewer.tick(), FrameOutcome::Terminated);
    assert!(viewer.is_terminated());
    assert_eq!(log.count("xrDestroy* instance"), 1);
}

// ── Input and locomotion ────────────────────────────────────

#[test]
fn test_left_stick_moves_world_in_arch_mode() {
    let mut rig = Rig::new();
    rig.runtime
        .set_hand(Hand::Left, Vector3::new(0.2, 1.0, -0.3), 0.0, 1.0, 0.0);
    let (mut viewer, _log, clock) = rig.start().unwrap_or_else(|e| panic!("{}", e));

    // 10ms at the default linear speed of 0.5: 0.01 * 0.5 * 2.
    clock.advance(Duration::from_millis(10));
    viewer.tick();
    let world = viewer.world().map(|w| w.isometry().translation.vector);
    let Some(t) = world else { panic!("viewer terminated") };
    assert_abs_diff_eq!(t, Vector3::new(0.0, 0.01, 0.0), epsilon = 1e-5);

    let Some(controllers) = viewer.controllers() else { panic!("viewer terminated") };
    assert!(controllers[0].visible);
    assert!(!controllers[1].visible);
    assert_abs_diff_eq!(
        controllers[0].world_pose.position,
        Vector3::new(0.2, 1.01, -0.3),
        epsilon = 1e-5
    );

    // No time passed, no motion.
    viewer.tick();
    let Some(t) = viewer.world().map(|w| w.isometry().translation.vector) else {
        panic!("viewer terminated")
    };
    assert_abs_diff_eq!(t.y, 0.01, epsilon = 1e-5);

    // Long stalls are clamped to 100ms.
    clock.advance(Duration::from_secs(2));
    viewer.tick();
    let Some(t) = viewer.world().map(|w| w.isometry().translation.vector) else {
        panic!("viewer terminated")
    };
    assert_abs_diff_eq!(t.y, 0.11, epsilon = 1e-5);
}

#[test]
fn test_arch_strafe_follows_head_yaw() {
    let mut rig = Rig::new();
    let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2);
    let fov = Fov {
        angle_left: -0.8,
        angle_right: 0.8,
        angle_up: 0.8,
        angle_down: -0.8,
    };
    let eye = |z: f32| EyeView {
        pose: Pose {
            position: Vector3::new(0.0, 1.6, z),
            orientation: yaw,
        },
        fov,
    };
    rig.runtime.set_eyes([eye(0.032), eye(-0.032)]);
    rig.runtime
        .set_hand(Hand::Left, Vector3::zeros(), 1.0, 0.0, 0.0);
    let (mut viewer, _log, clock) = rig.start().unwrap_or_else(|e| panic!("{}", e));

    // Head turned a quarter left: stick right strafes along -Z.
    clock.advance(Duration::from_millis(10));
    viewer.tick();
    let Some(t) = viewer.world().map(|w| w.isometry().translation.vector) else {
        panic!("viewer terminated")
    };
    assert_abs_diff_eq!(t, Vector3::new(0.0, 0.0, -0.01), epsilon = 1e-5);
}

#[test]
fn test_cameras_follow_world_transform() {
    let mut rig = Rig::new();
    rig.runtime
        .set_hand(Hand::Left, Vector3::zeros(), 0.0, 1.0, 0.0);
    let (mut viewer, _log, clock) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    clock.advance(Duration::from_millis(10));
    viewer.tick();

    let Some(cameras) = viewer.cameras() else { panic!("no cameras after a rendered frame") };
    assert_abs_diff_eq!(
        cameras[0].position(),
        Vector3::new(-0.032, 1.61, 0.0),
        epsilon = 1e-5
    );
    assert_abs_diff_eq!(
        cameras[1].position(),
        Vector3::new(0.032, 1.61, 0.0),
        epsilon = 1e-5
    );
}

#[test]
fn test_unfocused_session_hides_controllers() {
    let mut rig = Rig::new();
    rig.runtime
        .set_hand(Hand::Left, Vector3::new(0.0, 1.0, 0.0), 1.0, 1.0, 1.0);
    rig.runtime.set_focused(false);
    let (mut viewer, log, clock) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    clock.advance(Duration::from_millis(10));
    log.clear();

    assert_eq!(viewer.tick(), FrameOutcome::Submitted { rendered: true });
    assert_eq!(log.count("xrLocateSpace"), 0);
    let Some(controllers) = viewer.controllers() else { panic!("viewer terminated") };
    assert!(controllers.iter().all(|c| !c.visible));
    let Some(t) = viewer.world().map(|w| w.isometry().translation.vector) else {
        panic!("viewer terminated")
    };
    assert_abs_diff_eq!(t, Vector3::zeros(), epsilon = 1e-6);
}

#[test]
fn test_trigger_edges_last_one_tick() {
    let mut rig = Rig::new();
    rig.runtime
        .set_hand(Hand::Right, Vector3::zeros(), 0.0, 0.0, 0.9);
    let (mut viewer, _log, _) = rig.start().unwrap_or_else(|e| panic!("{}", e));

    viewer.tick();
    let edge = viewer.controllers().map(|c| c[1].trigger_edge);
    assert_eq!(edge, Some(TriggerEdge::JustPressed));

    viewer.tick();
    let edge = viewer.controllers().map(|c| c[1].trigger_edge);
    assert_eq!(edge, Some(TriggerEdge::Pressed));

    viewer
        .runtime_mut()
        .set_hand(Hand::Right, Vector3::zeros(), 0.0, 0.0, 0.1);
    viewer.tick();
    let edge = viewer.controllers().map(|c| c[1].trigger_edge);
    assert_eq!(edge, Some(TriggerEdge::JustReleased));
}

// ── Mirror ──────────────────────────────────────────────────

#[test]
fn test_mirror_blits_on_display_context_after_submit() {
    let mut rig = Rig::new();
    rig.prefs.set_bool(KEY_MIRROR, true);
    let (mut viewer, log, _) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    assert!(viewer.mirror_enabled());
    log.clear();

    viewer.tick();
    let end = position(&log, "xrEndFrame layers=1");
    let worker_done = position(&log, "worker: done_current");
    let display = position(&log, "display: make_current");
    let blit = position(&log, "display: BlitColor 0,0 1280x480 -> 0,0 1280x720 Nearest");
    let swap = position(&log, "display: swap_buffers");
    assert!(end < worker_done);
    assert!(worker_done < display);
    assert!(display < blit);
    assert!(blit < swap);

    viewer.tick();
    assert_eq!(log.count("display: CreateFramebuffer"), 1);
    assert_eq!(log.count("display: swap_buffers"), 2);
}

#[test]
fn test_mirror_idle_when_nothing_rendered() {
    let mut rig = Rig::new();
    rig.prefs.set_bool(KEY_MIRROR, true);
    rig.runtime.set_should_render_every(0);
    let (mut viewer, log, _) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    log.clear();
    viewer.tick();
    assert_eq!(log.count("display:"), 0);
}

#[test]
fn test_mirror_teardown_runs_on_display_context() {
    let mut rig = Rig::new();
    rig.prefs.set_bool(KEY_MIRROR, true);
    let (mut viewer, log, _) = rig.start().unwrap_or_else(|e| panic!("{}", e));
    viewer.tick();
    log.clear();

    viewer.terminate().unwrap();
    let names = log.names();
    assert_eq!(
        &names[..3],
        &[
            "display: make_current",
            "display: DeleteFramebuffer 1",
            "display: done_current"
        ]
    );
    assert_eq!(log.count("worker: DeleteTexture"), 1);
}

// ── Live reloads ────────────────────────────────────────────

#[test]
fn test_reload_preferences_toggles_mirror_and_lighting() {
    let (mut viewer, log, _) = started();
    viewer.tick();
    log.clear();

    let mut prefs = MemoryPreferences::new();
    prefs.set_bool(KEY_MIRROR, true).set_int(KEY_AMBIENT_LIGHT, 100);
    viewer.reload_preferences(&prefs).unwrap();
    assert!(viewer.mirror_enabled());
    assert_eq!(log.count("scene: lights ambient=1.00 directional=0.80"), 1);
    assert_eq!(log.count("worker: CreateTexture"), 1);

    viewer.tick();
    assert_eq!(log.count("display: swap_buffers"), 1);

    viewer.reload_preferences(&MemoryPreferences::new()).unwrap();
    assert!(!viewer.mirror_enabled());
    assert_eq!(log.count("worker: DeleteTexture"), 1);
    log.clear();
    viewer.tick();
    assert_eq!(log.count("display:"), 0);
}

#[test]
fn test_reload_preferences_switches_movement_but_not_msaa() {
    let (mut viewer, _log, _) = started();
    let mut prefs = MemoryPreferences::new();
    prefs.set_string(KEY_MOVEMENT, "FREE").set_int(KEY_MSAA, 8);
    viewer.reload_preferences(&prefs).unwrap();

    let Some(current) = viewer.preferences() else { panic!("viewer terminated") };
    assert_eq!(current.movement, MovementMode::Free);
    assert_eq!(current.msaa_samples, 4);
}

#[test]
fn test_reload_scene_graph_switches_render_root() {
    let (mut viewer, log, _) = started();
    viewer.tick();
    viewer.reload_scene_graph();
    log.clear();
    viewer.tick();
    assert_eq!(log.count("scene: render scene=2"), 2);
    assert_eq!(log.count("scene: render scene=1"), 0);
}
