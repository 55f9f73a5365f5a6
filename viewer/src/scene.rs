//! Host scene collaborators.
//!
//! The host's scene graph is opaque to the viewer. The provider hands out
//! a handle to the current document subtree; the renderer draws whatever
//! the handle refers to into the bound framebuffer.

use std::f32::consts::FRAC_PI_2;

use nalgebra::{Matrix4, Vector3};

use crate::config::ViewerPreferences;
use crate::pose::{EyeCamera, Pose};
use crate::render::gl::Rect;

/// CAD documents are in millimeters, the stage is in meters.
pub const MODEL_SCALE: f32 = 0.001;

/// Clear color behind the model.
pub const BACKGROUND: [f32; 3] = [0.0, 0.0, 0.8];

/// Opaque reference to a host scene subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub u64);

/// Light intensities, 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSettings {
    pub ambient: f32,
    pub directional: f32,
}

impl LightSettings {
    pub fn from_prefs(prefs: &ViewerPreferences) -> Self {
        Self {
            ambient: prefs.ambient_light,
            directional: prefs.directional_light,
        }
    }
}

/// Everything drawn for one eye: the document subtree plus the
/// controllers currently in view.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRoot {
    pub scene: SceneHandle,
    /// Document to stage: millimeters to meters, Z-up to Y-up.
    pub model: Matrix4<f32>,
    /// World-space grip poses of visible controllers.
    pub controllers: [Option<Pose>; 2],
}

impl SceneRoot {
    pub fn new(scene: SceneHandle) -> Self {
        Self {
            scene,
            model: model_transform(),
            controllers: [None, None],
        }
    }
}

pub fn model_transform() -> Matrix4<f32> {
    Matrix4::new_rotation(Vector3::x() * -FRAC_PI_2) * Matrix4::new_scaling(MODEL_SCALE)
}

/// Draws a scene into the currently bound framebuffer.
pub trait SceneRenderer {
    fn render(&mut self, root: &SceneRoot, viewport: Rect, camera: &EyeCamera);

    fn configure_lighting(&mut self, _lights: &LightSettings) {}
}

/// Supplies the current document subtree.
pub trait SceneGraphProvider {
    fn current_scene_graph(&mut self) -> SceneHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector4;

    #[test]
    fn test_model_transform_maps_z_up_mm_to_y_up_m() {
        let up_mm = Vector4::new(0.0, 0.0, 1000.0, 1.0);
        let out = model_transform() * up_mm;
        assert_abs_diff_eq!(out, Vector4::new(0.0, 1.0, 0.0, 1.0), epsilon = 1e-6);

        let forward_mm = Vector4::new(0.0, 1000.0, 0.0, 1.0);
        let out = model_transform() * forward_mm;
        assert_abs_diff_eq!(out, Vector4::new(0.0, 0.0, -1.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_lights_follow_prefs() {
        let prefs = ViewerPreferences::default();
        let lights = LightSettings::from_prefs(&prefs);
        assert_eq!(lights.ambient, 0.4);
        assert_eq!(lights.directional, 0.8);
    }
}
