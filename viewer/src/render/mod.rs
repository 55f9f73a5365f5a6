//! GL side of the viewer: the device seam, the stereo render targets and
//! the two-context scheduler.

pub mod context;
pub mod gl;
pub mod pipeline;

#[cfg(feature = "vr")]
pub mod glow_device;

pub use context::{ContextRole, ContextScheduler, GraphicsContext};
pub use gl::{GlDevice, Rect, TextureId};
pub use pipeline::{MirrorPresenter, RenderTargetPipeline};
