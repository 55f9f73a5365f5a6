//! Ownership of the two GL contexts.
//!
//! The worker context sits on a hidden surface and carries every OpenXR
//! and off-screen GL call. The display context sits on the host's visible
//! surface and is only used for the mirror. They share object namespaces.
//! Exactly one of them is current at a time, and make-current calls never
//! nest.

use tracing::trace;

use crate::error::XrError;
use crate::xr::runtime::GraphicsBinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    Worker,
    Display,
}

impl ContextRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextRole::Worker => "worker",
            ContextRole::Display => "display",
        }
    }
}

/// A GL context bound to one surface, supplied by the host windowing layer.
pub trait GraphicsContext {
    fn make_current(&mut self) -> Result<(), XrError>;
    fn done_current(&mut self);
    /// Current size of the surface in pixels.
    fn surface_size(&self) -> (u32, u32);
    /// Native handles for session creation.
    fn graphics_binding(&self) -> GraphicsBinding;
    fn swap_buffers(&mut self) {}
}

pub struct ContextScheduler {
    worker: Box<dyn GraphicsContext>,
    display: Box<dyn GraphicsContext>,
    current: Option<ContextRole>,
}

impl ContextScheduler {
    pub fn new(worker: Box<dyn GraphicsContext>, display: Box<dyn GraphicsContext>) -> Self {
        Self {
            worker,
            display,
            current: None,
        }
    }

    pub fn current(&self) -> Option<ContextRole> {
        self.current
    }

    pub fn display_surface_size(&self) -> (u32, u32) {
        self.display.surface_size()
    }

    pub fn worker_binding(&self) -> GraphicsBinding {
        self.worker.graphics_binding()
    }

    /// Run `f` with `role` current, releasing it afterwards. `f` cannot
    /// reach the scheduler, so passes cannot nest.
    pub fn with_current<T>(&mut self, role: ContextRole, f: impl FnOnce() -> T) -> Result<T, XrError> {
        debug_assert!(self.current.is_none(), "GL: nested make-current");
        let ctx = match role {
            ContextRole::Worker => &mut self.worker,
            ContextRole::Display => &mut self.display,
        };
        ctx.make_current()?;
        self.current = Some(role);
        trace!("GL: {} context current", role.as_str());

        let out = f();

        ctx.done_current();
        self.current = None;
        trace!("GL: {} context released", role.as_str());
        Ok(out)
    }

    /// Present the display surface. Call after a display-context pass.
    pub fn swap_display(&mut self) {
        self.display.swap_buffers();
    }
}
