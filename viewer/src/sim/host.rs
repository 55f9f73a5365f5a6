use super::CallLog;
use crate::error::XrError;
use crate::pose::EyeCamera;
use crate::render::context::GraphicsContext;
use crate::render::gl::Rect;
use crate::scene::{LightSettings, SceneGraphProvider, SceneHandle, SceneRenderer, SceneRoot};
use crate::xr::runtime::GraphicsBinding;

/// Graphics context on a fixed-size surface.
pub struct SimContext {
    label: &'static str,
    size: (u32, u32),
    log: CallLog,
    fail: bool,
}

impl SimContext {
    pub fn new(label: &'static str, size: (u32, u32), log: CallLog) -> Self {
        Self {
            label,
            size,
            log,
            fail: false,
        }
    }

    /// Make every make-current call fail.
    pub fn set_fail(&mut self, fail: bool) {
        self.fail = fail;
    }
}

impl GraphicsContext for SimContext {
    fn make_current(&mut self) -> Result<(), XrError> {
        self.log.push(format!("{}: make_current", self.label));
        if self.fail {
            return Err(XrError::Context(self.label));
        }
        Ok(())
    }

    fn done_current(&mut self) {
        self.log.push(format!("{}: done_current", self.label));
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn graphics_binding(&self) -> GraphicsBinding {
        GraphicsBinding::Headless
    }

    fn swap_buffers(&mut self) {
        self.log.push(format!("{}: swap_buffers", self.label));
    }
}

/// Scene renderer that records what it was asked to draw.
pub struct RecordingRenderer {
    log: CallLog,
}

impl RecordingRenderer {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl SceneRenderer for RecordingRenderer {
    fn render(&mut self, root: &SceneRoot, viewport: Rect, _camera: &EyeCamera) {
        self.log.push(format!(
            "scene: render scene={} viewport={},{} {}x{}",
            root.scene.0, viewport.x, viewport.y, viewport.width, viewport.height
        ));
    }

    fn configure_lighting(&mut self, lights: &LightSettings) {
        self.log.push(format!(
            "scene: lights ambient={:.2} directional={:.2}",
            lights.ambient, lights.directional
        ));
    }
}

/// Hands out a new scene handle on every request, as if the document
/// changed in between.
#[derive(Debug, Default)]
pub struct SimSceneProvider {
    next: u64,
    log: Option<CallLog>,
}

impl SimSceneProvider {
    pub fn new(log: CallLog) -> Self {
        Self {
            next: 0,
            log: Some(log),
        }
    }
}

impl SceneGraphProvider for SimSceneProvider {
    fn current_scene_graph(&mut self) -> SceneHandle {
        self.next += 1;
        if let Some(log) = &self.log {
            log.push(format!("scene: current_scene_graph -> {}", self.next));
        }
        SceneHandle(self.next)
    }
}
