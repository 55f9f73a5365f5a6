//! Pose and projection math.
//!
//! Converts runtime view poses and field-of-view angles into camera
//! placements and asymmetric frusta. Tangents are evaluated in double
//! precision and narrowed once, so the frustum planes match what a
//! double-precision host camera would store.

use nalgebra::{Isometry3, Matrix4, Quaternion, Translation3, UnitQuaternion, Vector3};

/// Near clip distance in meters.
pub const NEAR_PLANE: f32 = 0.01;
/// Far clip distance in meters.
pub const FAR_PLANE: f32 = 10000.0;

/// Position plus orientation as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Build from runtime components, quaternion in (x, y, z, w) order.
    pub fn from_raw(position: [f32; 3], orientation: [f32; 4]) -> Self {
        let [x, y, z, w] = orientation;
        Self {
            position: Vector3::from(position),
            orientation: UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
        }
    }

    pub fn to_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.orientation)
    }

    pub fn from_isometry(iso: &Isometry3<f32>) -> Self {
        Self {
            position: iso.translation.vector,
            orientation: iso.rotation,
        }
    }
}

/// Half-angles of an eye's view volume, radians. Left and down are
/// normally negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

/// One located eye.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EyeView {
    pub pose: Pose,
    pub fov: Fov,
}

/// Off-axis frustum for one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrustum {
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Derive the frustum planes from field-of-view angles.
pub fn frustum_from_fov(fov: &Fov, near: f32, far: f32) -> CameraFrustum {
    let tan_left = (fov.angle_left as f64).tan();
    let tan_right = (fov.angle_right as f64).tan();
    let tan_up = (fov.angle_up as f64).tan();
    let tan_down = (fov.angle_down as f64).tan();
    let n = near as f64;

    CameraFrustum {
        aspect_ratio: ((tan_up - tan_down) / (tan_right - tan_left)) as f32,
        near,
        far,
        left: (n * tan_left) as f32,
        right: (n * tan_right) as f32,
        top: (n * tan_up) as f32,
        bottom: (n * tan_down) as f32,
    }
}

impl CameraFrustum {
    /// OpenGL-style projection matrix for these planes.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let (l, r, b, t, n, f) = (
            self.left, self.right, self.bottom, self.top, self.near, self.far,
        );
        #[rustfmt::skip]
        let m = Matrix4::new(
            2.0 * n / (r - l), 0.0, (r + l) / (r - l), 0.0,
            0.0, 2.0 * n / (t - b), (t + b) / (t - b), 0.0,
            0.0, 0.0, -(f + n) / (f - n), -2.0 * f * n / (f - n),
            0.0, 0.0, -1.0, 0.0,
        );
        m
    }
}

/// A camera ready to hand to the scene renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeCamera {
    /// Camera-to-world placement.
    pub placement: Isometry3<f32>,
    pub frustum: CameraFrustum,
}

impl EyeCamera {
    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.placement.inverse().to_homogeneous()
    }

    pub fn position(&self) -> Vector3<f32> {
        self.placement.translation.vector
    }
}

/// Tracked head motion is local; locomotion is global, so it goes on
/// the left.
pub fn camera_placement(world: &Isometry3<f32>, eye: &EyeView) -> Isometry3<f32> {
    world * eye.pose.to_isometry()
}

/// Camera for one eye with the default clip planes.
pub fn eye_camera(world: &Isometry3<f32>, eye: &EyeView) -> EyeCamera {
    EyeCamera {
        placement: camera_placement(world, eye),
        frustum: frustum_from_fov(&eye.fov, NEAR_PLANE, FAR_PLANE),
    }
}
