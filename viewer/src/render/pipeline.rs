//! Off-screen stereo composition.
//!
//! Both eyes are drawn side by side into one MSAA framebuffer, resolved
//! into the acquired swapchain image, and optionally copied into a shared
//! mirror texture that the display context scales into its window.

use tracing::{debug, info};

use crate::error::XrError;
use crate::pose::EyeCamera;
use crate::render::gl::{
    Attachment, BlitFilter, Capability, FramebufferId, FramebufferTarget, GlDevice, Rect,
    RenderbufferId, StorageFormat, TextureId,
};
use crate::scene::{SceneRenderer, SceneRoot};

/// Capabilities enabled only while an eye is being drawn.
const DRAW_CAPS: [Capability; 3] = [
    Capability::ScissorTest,
    Capability::CullFace,
    Capability::DepthTest,
];

#[derive(Debug)]
struct MirrorTarget {
    texture: TextureId,
    /// Worker-side framebuffer used to copy into `texture`.
    copy_fbo: FramebufferId,
}

/// GL objects owned by the worker context.
#[derive(Debug)]
pub struct RenderTargetPipeline {
    width: u32,
    height: u32,
    samples: u32,
    msaa_fbo: FramebufferId,
    msaa_color: RenderbufferId,
    msaa_depth: RenderbufferId,
    resolve_fbo: FramebufferId,
    mirror: Option<MirrorTarget>,
}

impl RenderTargetPipeline {
    /// Create the MSAA and resolve framebuffers for a `width` x `height`
    /// stereo target. Objects created before a failure are deleted.
    pub fn create<G: GlDevice + ?Sized>(
        gl: &mut G,
        width: u32,
        height: u32,
        samples: u32,
    ) -> Result<Self, XrError> {
        let msaa_fbo = gl.create_framebuffer()?;
        let msaa_color = match gl.create_renderbuffer() {
            Ok(rb) => rb,
            Err(e) => {
                gl.delete_framebuffer(msaa_fbo);
                return Err(e);
            }
        };
        let msaa_depth = match gl.create_renderbuffer() {
            Ok(rb) => rb,
            Err(e) => {
                gl.delete_renderbuffer(msaa_color);
                gl.delete_framebuffer(msaa_fbo);
                return Err(e);
            }
        };

        gl.renderbuffer_storage(msaa_color, samples, StorageFormat::Rgba8, width, height);
        gl.renderbuffer_storage(msaa_depth, samples, StorageFormat::Depth24Stencil8, width, height);
        gl.bind_framebuffer(FramebufferTarget::Framebuffer, Some(msaa_fbo));
        gl.framebuffer_renderbuffer(FramebufferTarget::Framebuffer, Attachment::Color0, msaa_color);
        gl.framebuffer_renderbuffer(
            FramebufferTarget::Framebuffer,
            Attachment::DepthStencil,
            msaa_depth,
        );
        let status = gl.check_framebuffer_complete(FramebufferTarget::Framebuffer);
        gl.bind_framebuffer(FramebufferTarget::Framebuffer, None);

        let resolve_fbo = match status.and_then(|_| gl.create_framebuffer()) {
            Ok(fb) => fb,
            Err(e) => {
                gl.delete_renderbuffer(msaa_depth);
                gl.delete_renderbuffer(msaa_color);
                gl.delete_framebuffer(msaa_fbo);
                return Err(e);
            }
        };

        info!(
            "GL: stereo target {}x{} with {} samples",
            width, height, samples
        );
        Ok(Self {
            width,
            height,
            samples,
            msaa_fbo,
            msaa_color,
            msaa_depth,
            resolve_fbo,
            mirror: None,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn full_rect(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn mirror_texture(&self) -> Option<TextureId> {
        self.mirror.as_ref().map(|m| m.texture)
    }

    /// Allocate the shared mirror texture. No-op when already enabled.
    pub fn enable_mirror<G: GlDevice + ?Sized>(&mut self, gl: &mut G) -> Result<(), XrError> {
        if self.mirror.is_some() {
            return Ok(());
        }
        let texture = gl.create_texture()?;
        gl.texture_storage(texture, StorageFormat::Srgb8Alpha8, self.width, self.height);
        let copy_fbo = match gl.create_framebuffer() {
            Ok(fb) => fb,
            Err(e) => {
                gl.delete_texture(texture);
                return Err(e);
            }
        };
        gl.bind_framebuffer(FramebufferTarget::Framebuffer, Some(copy_fbo));
        gl.framebuffer_texture(
            FramebufferTarget::Framebuffer,
            Attachment::Color0,
            Some(texture),
        );
        gl.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        debug!("GL: mirror texture {:?} allocated", texture);
        self.mirror = Some(MirrorTarget { texture, copy_fbo });
        Ok(())
    }

    pub fn disable_mirror<G: GlDevice + ?Sized>(&mut self, gl: &mut G) {
        if let Some(mirror) = self.mirror.take() {
            gl.delete_framebuffer(mirror.copy_fbo);
            gl.delete_texture(mirror.texture);
            debug!("GL: mirror texture released");
        }
    }

    /// Draw both eyes, resolve into `swapchain_texture`, and refresh the
    /// mirror texture if there is one.
    pub fn render<G: GlDevice + ?Sized>(
        &mut self,
        gl: &mut G,
        swapchain_texture: TextureId,
        cameras: &[EyeCamera; 2],
        root: &SceneRoot,
        renderer: &mut dyn SceneRenderer,
    ) {
        let full = self.full_rect();

        gl.bind_framebuffer(FramebufferTarget::Framebuffer, Some(self.msaa_fbo));
        for (eye, camera) in cameras.iter().enumerate() {
            let rect = full.eye_half(eye);
            gl.scissor(rect);
            gl.viewport(rect);
            for cap in DRAW_CAPS {
                gl.set_capability(cap, true);
            }
            renderer.render(root, rect, camera);
            for cap in DRAW_CAPS {
                gl.set_capability(cap, false);
            }
        }

        gl.bind_framebuffer(FramebufferTarget::Read, Some(self.msaa_fbo));
        gl.bind_framebuffer(FramebufferTarget::Draw, Some(self.resolve_fbo));
        gl.framebuffer_texture(
            FramebufferTarget::Draw,
            Attachment::Color0,
            Some(swapchain_texture),
        );
        gl.blit_color(full, full, BlitFilter::Nearest);

        if let Some(mirror) = &self.mirror {
            gl.bind_framebuffer(FramebufferTarget::Read, Some(self.resolve_fbo));
            gl.bind_framebuffer(FramebufferTarget::Draw, Some(mirror.copy_fbo));
            gl.blit_color(full, full, BlitFilter::Nearest);
        }

        gl.bind_framebuffer(FramebufferTarget::Framebuffer, Some(self.resolve_fbo));
        gl.framebuffer_texture(FramebufferTarget::Framebuffer, Attachment::Color0, None);
        gl.bind_framebuffer(FramebufferTarget::Framebuffer, None);
    }

    /// Delete every worker-side object.
    pub fn destroy<G: GlDevice + ?Sized>(mut self, gl: &mut G) {
        self.disable_mirror(gl);
        gl.delete_framebuffer(self.resolve_fbo);
        gl.delete_framebuffer(self.msaa_fbo);
        gl.delete_renderbuffer(self.msaa_depth);
        gl.delete_renderbuffer(self.msaa_color);
    }
}

/// Display-context side of the mirror. Framebuffers are per context, so
/// the display owns its own wrapper around the shared texture.
#[derive(Debug, Default)]
pub struct MirrorPresenter {
    fbo: Option<(FramebufferId, TextureId)>,
}

impl MirrorPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale `texture` (`source` extents) into the display's default
    /// framebuffer of size `surface`.
    pub fn present<G: GlDevice + ?Sized>(
        &mut self,
        gl: &mut G,
        texture: TextureId,
        source: Rect,
        surface: (u32, u32),
    ) -> Result<(), XrError> {
        let fbo = match self.fbo {
            Some((fbo, tex)) if tex == texture => fbo,
            stale => {
                if let Some((old, _)) = stale {
                    gl.delete_framebuffer(old);
                    self.fbo = None;
                }
                let fbo = gl.create_framebuffer()?;
                gl.bind_framebuffer(FramebufferTarget::Framebuffer, Some(fbo));
                gl.framebuffer_texture(
                    FramebufferTarget::Framebuffer,
                    Attachment::Color0,
                    Some(texture),
                );
                self.fbo = Some((fbo, texture));
                fbo
            }
        };

        gl.bind_framebuffer(FramebufferTarget::Read, Some(fbo));
        gl.bind_framebuffer(FramebufferTarget::Draw, None);
        gl.blit_color(source, Rect::from_size(surface.0, surface.1), BlitFilter::Nearest);
        gl.bind_framebuffer(FramebufferTarget::Framebuffer, None);
        Ok(())
    }

    pub fn destroy<G: GlDevice + ?Sized>(&mut self, gl: &mut G) {
        if let Some((fbo, _)) = self.fbo.take() {
            gl.delete_framebuffer(fbo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{eye_camera, EyeView};
    use crate::scene::SceneHandle;
    use crate::sim::{CallLog, RecordingRenderer, SimGl};
    use nalgebra::Isometry3;

    fn cameras() -> [EyeCamera; 2] {
        let eye = EyeView::default();
        [
            eye_camera(&Isometry3::identity(), &eye),
            eye_camera(&Isometry3::identity(), &eye),
        ]
    }

    #[test]
    fn test_create_allocates_stereo_targets() {
        let log = CallLog::new();
        let mut gl = SimGl::new("worker", log.clone());
        let pipeline = RenderTargetPipeline::create(&mut gl, 200, 100, 4).unwrap();
        assert_eq!(pipeline.size(), (200, 100));
        assert_eq!(
            log.matching("RenderbufferStorage"),
            vec![
                "worker: RenderbufferStorage samples=4 Rgba8 200x100",
                "worker: RenderbufferStorage samples=4 Depth24Stencil8 200x100",
            ]
        );
        assert_eq!(gl.live_objects(), 4);
    }

    #[test]
    fn test_create_cleans_up_on_incomplete_framebuffer() {
        let log = CallLog::new();
        let mut gl = SimGl::new("worker", log.clone());
        gl.set_incomplete(true);
        assert!(RenderTargetPipeline::create(&mut gl, 200, 100, 4).is_err());
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn test_render_sequence() {
        let log = CallLog::new();
        let mut gl = SimGl::new("worker", log.clone());
        let mut renderer = RecordingRenderer::new(log.clone());
        let mut pipeline = RenderTargetPipeline::create(&mut gl, 200, 100, 4).unwrap();
        log.clear();

        let root = SceneRoot::new(SceneHandle(1));
        pipeline.render(&mut gl, TextureId(77), &cameras(), &root, &mut renderer);

        let draws = log.matching("scene: render");
        assert_eq!(
            draws,
            vec![
                "scene: render scene=1 viewport=0,0 100x100",
                "scene: render scene=1 viewport=100,0 100x100",
            ]
        );
        let blits = log.matching("BlitColor");
        assert_eq!(blits, vec!["worker: BlitColor 0,0 200x100 -> 0,0 200x100 Nearest"]);

        // Draw state never leaks into the resolve blit.
        let names = log.names();
        let blit_at = names.iter().position(|n| n.contains("BlitColor")).unwrap();
        assert!(gl.enabled_caps().is_empty());
        let last_disable = names
            .iter()
            .rposition(|n| n.contains("Disable"))
            .unwrap();
        assert!(last_disable < blit_at);

        // Swapchain texture is detached afterwards.
        assert!(names
            .last()
            .map(|n| n.ends_with("BindFramebuffer Framebuffer default"))
            .unwrap_or(false));
    }

    #[test]
    fn test_each_eye_draw_is_bracketed_by_caps() {
        let log = CallLog::new();
        let mut gl = SimGl::new("worker", log.clone());
        let mut renderer = RecordingRenderer::new(log.clone());
        let mut pipeline = RenderTargetPipeline::create(&mut gl, 64, 32, 0).unwrap();
        log.clear();
        pipeline.render(
            &mut gl,
            TextureId(5),
            &cameras(),
            &SceneRoot::new(SceneHandle(9)),
            &mut renderer,
        );
        let names = log.names();
        let draws: Vec<usize> = names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.starts_with("scene: render"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(draws.len(), 2);
        for at in draws {
            assert_eq!(
                &names[at - 3..at],
                &[
                    "worker: Enable ScissorTest",
                    "worker: Enable CullFace",
                    "worker: Enable DepthTest",
                ]
            );
            assert_eq!(
                &names[at + 1..at + 4],
                &[
                    "worker: Disable ScissorTest",
                    "worker: Disable CullFace",
                    "worker: Disable DepthTest",
                ]
            );
        }
    }

    #[test]
    fn test_mirror_copy_and_present() {
        let log = CallLog::new();
        let mut worker = SimGl::new("worker", log.clone());
        let mut display = SimGl::new("display", log.clone());
        let mut renderer = RecordingRenderer::new(log.clone());
        let mut pipeline = RenderTargetPipeline::create(&mut worker, 200, 100, 2).unwrap();
        pipeline.enable_mirror(&mut worker).unwrap();
        log.clear();

        pipeline.render(
            &mut worker,
            TextureId(3),
            &cameras(),
            &SceneRoot::new(SceneHandle(1)),
            &mut renderer,
        );
        assert_eq!(log.matching("worker: BlitColor").len(), 2);

        let mut presenter = MirrorPresenter::new();
        let tex = pipeline.mirror_texture().unwrap();
        presenter
            .present(&mut display, tex, pipeline.full_rect(), (640, 480))
            .unwrap();
        presenter
            .present(&mut display, tex, pipeline.full_rect(), (320, 240))
            .unwrap();
        assert_eq!(
            log.matching("display: BlitColor"),
            vec![
                "display: BlitColor 0,0 200x100 -> 0,0 640x480 Nearest",
                "display: BlitColor 0,0 200x100 -> 0,0 320x240 Nearest",
            ]
        );
        assert_eq!(log.count("display: CreateFramebuffer"), 1);

        presenter.destroy(&mut display);
        pipeline.destroy(&mut worker);
        assert_eq!(display.live_objects(), 0);
        assert_eq!(worker.live_objects(), 0);
    }
}
