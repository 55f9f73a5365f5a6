//! Stick-driven locomotion.
//!
//! Real head and hand motion arrives in stage space. Artificial movement
//! accumulates in a `WorldTransform` that is composed on the left of every
//! tracked pose. Each rendering tick computes a small delta from the two
//! thumbsticks and appends it on the right.

use std::sync::Arc;
use std::time::Instant;

use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

use crate::clock::Clock;
use crate::input::ControllerState;
use crate::pose::{EyeView, Pose};

/// Extra gain applied on top of the user speed preferences.
pub const AUX_MUL: f32 = 2.0;
/// Longest frame interval fed into the integration, seconds.
pub const MAX_FRAME_DURATION: f32 = 0.1;

/// How thumbstick input maps to motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementMode {
    /// Head-relative: left stick strafes and lifts, right stick walks and
    /// turns about the head.
    #[default]
    Arch,
    /// Controller-relative: left stick flies along the controller, right
    /// stick rolls and pitches the world about the right controller.
    Free,
}

impl MovementMode {
    pub fn from_pref(value: &str) -> Option<Self> {
        match value {
            "ARCH" => Some(Self::Arch),
            "FREE" => Some(Self::Free),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arch => "ARCH",
            Self::Free => "FREE",
        }
    }
}

/// Stick deflection plus the local pose of the controller that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickInput {
    pub x: f32,
    pub y: f32,
    pub pose: Pose,
}

impl StickInput {
    /// Hidden controllers contribute no deflection.
    pub fn from_controller(state: &ControllerState) -> Self {
        let (x, y) = if state.visible {
            (state.stick_x, state.stick_y)
        } else {
            (0.0, 0.0)
        };
        Self {
            x,
            y,
            pose: state.local_pose,
        }
    }
}

/// Per-tick linear and angular gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSpeeds {
    pub mov: f32,
    pub rot: f32,
}

impl FrameSpeeds {
    pub fn new(frame_duration: f32, linear_speed: f32, rotational_speed: f32) -> Self {
        Self {
            mov: frame_duration * linear_speed * AUX_MUL,
            rot: frame_duration * rotational_speed * AUX_MUL,
        }
    }
}

/// Translation `t` plus rotation `r` applied about `center`.
fn pivoted(translation: Vector3<f32>, rotation: UnitQuaternion<f32>, center: Vector3<f32>) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::from(translation + center - rotation * center),
        rotation,
    )
}

/// Head-relative delta. `head` is the stage-space head pose.
pub fn arch_delta(
    head: &Pose,
    primary: &StickInput,
    secondary: &StickInput,
    speeds: FrameSpeeds,
) -> Isometry3<f32> {
    let q = head.orientation.quaternion();
    let (qx, qy, qz, qw) = (q.i, q.j, q.k, q.w);
    let z0 = 2.0 * qx * qz + 2.0 * qy * qw;
    let z2 = 1.0 - 2.0 * qx * qx - 2.0 * qy * qy;
    let s = speeds.mov;

    let primary_step = Vector3::new(primary.x * z2 * s, primary.y * s, -primary.x * z0 * s);
    let turn = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -secondary.x * speeds.rot);
    let primary_tf = pivoted(primary_step, turn, head.position);

    let secondary_step = Vector3::new(-secondary.y * z0 * s, 0.0, -secondary.y * z2 * s);
    let secondary_tf = pivoted(secondary_step, UnitQuaternion::identity(), head.position);

    secondary_tf * primary_tf
}

/// Controller-relative delta.
pub fn free_delta(primary: &StickInput, secondary: &StickInput, speeds: FrameSpeeds) -> Isometry3<f32> {
    let forward = primary.pose.orientation * Vector3::z();
    let primary_tf = Isometry3::from_parts(
        Translation3::from(forward * (-primary.y * speeds.mov)),
        UnitQuaternion::identity(),
    );

    let rot = secondary.pose.orientation;
    let x_axis = Unit::new_normalize(rot * Vector3::x());
    let z_axis = Unit::new_normalize(rot * Vector3::z());
    let pitch = UnitQuaternion::from_axis_angle(&x_axis, -secondary.y);
    let roll = UnitQuaternion::from_axis_angle(&z_axis, -secondary.x);
    let pad = (roll * pitch).powf(speeds.rot);
    let secondary_tf = pivoted(Vector3::zeros(), pad, secondary.pose.position);

    secondary_tf * primary_tf
}

/// Midpoint of the eyes, oriented like the left eye.
pub fn head_pose(eyes: &[EyeView; 2]) -> Pose {
    Pose {
        position: (eyes[0].pose.position + eyes[1].pose.position) * 0.5,
        orientation: eyes[0].pose.orientation,
    }
}

/// Accumulated artificial motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldTransform {
    iso: Isometry3<f32>,
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }
}

impl WorldTransform {
    pub fn isometry(&self) -> &Isometry3<f32> {
        &self.iso
    }

    pub fn apply_delta(&mut self, delta: &Isometry3<f32>) {
        self.iso *= delta;
    }

    /// World placement of a stage-space pose.
    pub fn place(&self, local: &Pose) -> Pose {
        Pose::from_isometry(&(self.iso * local.to_isometry()))
    }

    pub fn reset(&mut self) {
        self.iso = Isometry3::identity();
    }
}

/// Integrates stick input into the world transform once per rendering tick.
pub struct Locomotion {
    clock: Arc<dyn Clock>,
    last_tick: Instant,
    mode: MovementMode,
    world: WorldTransform,
}

impl Locomotion {
    pub fn new(clock: Arc<dyn Clock>, mode: MovementMode) -> Self {
        let last_tick = clock.now();
        Self {
            clock,
            last_tick,
            mode,
            world: WorldTransform::default(),
        }
    }

    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MovementMode) {
        self.mode = mode;
    }

    pub fn world(&self) -> &WorldTransform {
        &self.world
    }

    /// Seconds since the previous call, clamped.
    fn frame_duration(&mut self) -> f32 {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        elapsed.min(MAX_FRAME_DURATION)
    }

    /// Advance by one rendering tick. Left hand is primary.
    pub fn step(
        &mut self,
        eyes: &[EyeView; 2],
        controllers: &[ControllerState; 2],
        linear_speed: f32,
        rotational_speed: f32,
    ) -> Isometry3<f32> {
        let speeds = FrameSpeeds::new(self.frame_duration(), linear_speed, rotational_speed);
        let primary = StickInput::from_controller(&controllers[0]);
        let secondary = StickInput::from_controller(&controllers[1]);
        let delta = match self.mode {
            MovementMode::Arch => arch_delta(&head_pose(eyes), &primary, &secondary, speeds),
            MovementMode::Free => free_delta(&primary, &secondary, speeds),
        };
        self.world.apply_delta(&delta);
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;
    use std::time::Duration;

    fn stick(x: f32, y: f32) -> StickInput {
        StickInput {
            x,
            y,
            pose: Pose::identity(),
        }
    }

    fn speeds() -> FrameSpeeds {
        FrameSpeeds::new(0.01, 0.5, 0.5)
    }

    #[test]
    fn test_movement_mode_from_pref() {
        assert_eq!(MovementMode::from_pref("ARCH"), Some(MovementMode::Arch));
        assert_eq!(MovementMode::from_pref("FREE"), Some(MovementMode::Free));
        assert_eq!(MovementMode::from_pref("free"), None);
        assert_eq!(MovementMode::Free.as_str(), "FREE");
    }

    #[test]
    fn test_frame_speeds_scale() {
        let s = FrameSpeeds::new(0.02, 0.5, 0.25);
        assert_abs_diff_eq!(s.mov, 0.02);
        assert_abs_diff_eq!(s.rot, 0.01);
    }

    #[test]
    fn test_arch_primary_strafes_along_head_x() {
        let head = Pose::identity();
        let delta = arch_delta(&head, &stick(1.0, 0.0), &stick(0.0, 0.0), speeds());
        assert_abs_diff_eq!(
            delta.translation.vector,
            Vector3::new(speeds().mov, 0.0, 0.0),
            epsilon = 1e-7
        );
        assert_abs_diff_eq!(delta.rotation.angle(), 0.0);
    }

    #[test]
    fn test_arch_secondary_walks_forward() {
        let head = Pose::identity();
        let delta = arch_delta(&head, &stick(0.0, 0.0), &stick(0.0, 1.0), speeds());
        assert_abs_diff_eq!(
            delta.translation.vector,
            Vector3::new(0.0, 0.0, -speeds().mov),
            epsilon = 1e-7
        );
    }

    #[test]
    fn test_arch_turn_pivots_on_head() {
        let head = Pose {
            position: Vector3::new(1.0, 1.7, 2.0),
            orientation: UnitQuaternion::identity(),
        };
        let s = FrameSpeeds { mov: 0.0, rot: 0.3 };
        let delta = arch_delta(&head, &stick(0.0, 0.0), &stick(1.0, 0.0), s);
        assert_abs_diff_eq!(delta.rotation.angle(), 0.3, epsilon = 1e-6);
        let moved = delta * nalgebra::Point3::from(head.position);
        assert_abs_diff_eq!(moved.coords, head.position, epsilon = 1e-6);
    }

    #[test]
    fn test_arch_uses_head_yaw() {
        let head = Pose {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2),
        };
        let delta = arch_delta(&head, &stick(0.0, 0.0), &stick(0.0, 1.0), speeds());
        // Facing -X after a quarter turn left.
        assert_abs_diff_eq!(
            delta.translation.vector,
            Vector3::new(-speeds().mov, 0.0, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_free_primary_moves_along_controller_z() {
        let primary = StickInput {
            x: 0.0,
            y: 1.0,
            pose: Pose {
                position: Vector3::new(0.3, 1.0, 0.0),
                orientation: UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
            },
        };
        let delta = free_delta(&primary, &stick(0.0, 0.0), speeds());
        assert_abs_diff_eq!(
            delta.translation.vector,
            Vector3::new(0.0, speeds().mov, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_free_secondary_rotates_about_controller() {
        let center = Vector3::new(0.2, 1.2, -0.4);
        let secondary = StickInput {
            x: 1.0,
            y: 0.0,
            pose: Pose {
                position: center,
                orientation: UnitQuaternion::identity(),
            },
        };
        let s = FrameSpeeds { mov: 0.0, rot: 0.5 };
        let delta = free_delta(&stick(0.0, 0.0), &secondary, s);
        assert_abs_diff_eq!(delta.rotation.angle(), 0.5, epsilon = 1e-6);
        let axis = delta.rotation.axis().expect("non-trivial rotation");
        assert_abs_diff_eq!(axis.into_inner(), Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
        let moved = delta * nalgebra::Point3::from(center);
        assert_abs_diff_eq!(moved.coords, center, epsilon = 1e-6);
    }

    #[test]
    fn test_head_pose_is_eye_midpoint() {
        let mut eyes = [EyeView::default(); 2];
        eyes[0].pose.position = Vector3::new(-0.032, 1.6, 0.0);
        eyes[1].pose.position = Vector3::new(0.032, 1.6, 0.0);
        eyes[1].pose.orientation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.1);
        let head = head_pose(&eyes);
        assert_abs_diff_eq!(head.position, Vector3::new(0.0, 1.6, 0.0), epsilon = 1e-7);
        assert_eq!(head.orientation, UnitQuaternion::identity());
    }

    #[test]
    fn test_hidden_controller_contributes_nothing() {
        let mut state = ControllerState::default();
        state.stick_x = 1.0;
        state.stick_y = -1.0;
        state.visible = false;
        let input = StickInput::from_controller(&state);
        assert_eq!((input.x, input.y), (0.0, 0.0));
    }

    #[test]
    fn test_locomotion_integrates_frame_duration() {
        let clock = Arc::new(TestClock::new());
        let mut loco = Locomotion::new(clock.clone(), MovementMode::Arch);
        let eyes = [EyeView::default(); 2];
        let mut left = ControllerState::default();
        left.visible = true;
        left.stick_y = 1.0;
        let controllers = [left, ControllerState::default()];

        for _ in 0..2 {
            clock.advance(Duration::from_millis(20));
            loco.step(&eyes, &controllers, 0.5, 0.5);
        }
        let expected = 2.0 * 0.02 * 0.5 * AUX_MUL;
        assert_abs_diff_eq!(
            loco.world().isometry().translation.vector,
            Vector3::new(0.0, expected, 0.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_frame_duration_is_clamped() {
        let clock = Arc::new(TestClock::new());
        let mut loco = Locomotion::new(clock.clone(), MovementMode::Arch);
        clock.advance(Duration::from_secs(3));
        assert_abs_diff_eq!(loco.frame_duration(), MAX_FRAME_DURATION);
        assert_abs_diff_eq!(loco.frame_duration(), 0.0);
    }

    #[test]
    fn test_world_transform_places_local_pose() {
        let mut world = WorldTransform::default();
        world.apply_delta(&Isometry3::translation(1.0, 0.0, 0.0));
        world.apply_delta(&Isometry3::rotation(Vector3::y() * FRAC_PI_2));
        let placed = world.place(&Pose {
            position: Vector3::new(0.0, 0.0, -1.0),
            orientation: UnitQuaternion::identity(),
        });
        assert_abs_diff_eq!(placed.position, Vector3::new(0.0, 0.0, 0.0), epsilon = 1e-6);
        world.reset();
        assert_eq!(*world.isometry(), Isometry3::identity());
    }
}
