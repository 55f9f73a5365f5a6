//! `GlDevice` on a `glow` context.

use std::num::NonZeroU32;
use std::sync::Arc;

use glow::HasContext;
use tracing::debug;

use crate::error::XrError;
use crate::render::gl::{
    Attachment, BlitFilter, Capability, FramebufferId, FramebufferTarget, GlDevice, Rect,
    RenderbufferId, StorageFormat, TextureId,
};
use crate::xr::debug::{DebugSink, Severity};

fn target(t: FramebufferTarget) -> u32 {
    match t {
        FramebufferTarget::Framebuffer => glow::FRAMEBUFFER,
        FramebufferTarget::Read => glow::READ_FRAMEBUFFER,
        FramebufferTarget::Draw => glow::DRAW_FRAMEBUFFER,
    }
}

fn attachment(a: Attachment) -> u32 {
    match a {
        Attachment::Color0 => glow::COLOR_ATTACHMENT0,
        Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

fn internal_format(f: StorageFormat) -> u32 {
    match f {
        StorageFormat::Rgba8 => glow::RGBA8,
        StorageFormat::Srgb8Alpha8 => glow::SRGB8_ALPHA8,
        StorageFormat::Depth24Stencil8 => glow::DEPTH24_STENCIL8,
    }
}

fn capability(c: Capability) -> u32 {
    match c {
        Capability::CullFace => glow::CULL_FACE,
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::ScissorTest => glow::SCISSOR_TEST,
    }
}

fn status_name(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_UNDEFINED => "undefined",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "incomplete attachment",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "missing attachment",
        glow::FRAMEBUFFER_UNSUPPORTED => "unsupported",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "incomplete multisample",
        _ => "incomplete",
    }
}

fn name(id: u32) -> Option<NonZeroU32> {
    NonZeroU32::new(id)
}

/// One GL context's function table.
pub struct GlowDevice {
    gl: glow::Context,
}

impl GlowDevice {
    pub fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// Route `KHR_debug` output to `sink`. Needs a debug context.
    pub fn attach_debug_output(&mut self, sink: Arc<dyn DebugSink>) {
        if !self.gl.supported_extensions().contains("GL_KHR_debug") {
            debug!("GL: KHR_debug not available");
            return;
        }
        unsafe {
            self.gl.enable(glow::DEBUG_OUTPUT);
            self.gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
            self.gl
                .debug_message_callback(move |_source, _kind, id, severity, message: &str| {
                    sink.on_message(Severity::from_gl(severity), &format!("GL {}", id), message);
                });
        }
    }

    fn framebuffer(fb: Option<FramebufferId>) -> Option<glow::Framebuffer> {
        fb.and_then(|f| name(f.0)).map(glow::NativeFramebuffer)
    }

    fn renderbuffer(rb: RenderbufferId) -> Option<glow::Renderbuffer> {
        name(rb.0).map(glow::NativeRenderbuffer)
    }

    fn texture(tex: TextureId) -> Option<glow::Texture> {
        name(tex.0).map(glow::NativeTexture)
    }
}

impl GlDevice for GlowDevice {
    fn create_framebuffer(&mut self) -> Result<FramebufferId, XrError> {
        let fb = unsafe { self.gl.create_framebuffer() }.map_err(XrError::Graphics)?;
        Ok(FramebufferId(fb.0.get()))
    }

    fn delete_framebuffer(&mut self, fb: FramebufferId) {
        if let Some(fb) = Self::framebuffer(Some(fb)) {
            unsafe { self.gl.delete_framebuffer(fb) };
        }
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId, XrError> {
        let rb = unsafe { self.gl.create_renderbuffer() }.map_err(XrError::Graphics)?;
        Ok(RenderbufferId(rb.0.get()))
    }

    fn delete_renderbuffer(&mut self, rb: RenderbufferId) {
        if let Some(rb) = Self::renderbuffer(rb) {
            unsafe { self.gl.delete_renderbuffer(rb) };
        }
    }

    fn renderbuffer_storage(
        &mut self,
        rb: RenderbufferId,
        samples: u32,
        format: StorageFormat,
        width: u32,
        height: u32,
    ) {
        let format = internal_format(format);
        unsafe {
            self.gl
                .bind_renderbuffer(glow::RENDERBUFFER, Self::renderbuffer(rb));
            if samples >= 2 {
                self.gl.renderbuffer_storage_multisample(
                    glow::RENDERBUFFER,
                    samples as i32,
                    format,
                    width as i32,
                    height as i32,
                );
            } else {
                self.gl
                    .renderbuffer_storage(glow::RENDERBUFFER, format, width as i32, height as i32);
            }
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn create_texture(&mut self) -> Result<TextureId, XrError> {
        let tex = unsafe { self.gl.create_texture() }.map_err(XrError::Graphics)?;
        Ok(TextureId(tex.0.get()))
    }

    fn delete_texture(&mut self, tex: TextureId) {
        if let Some(tex) = Self::texture(tex) {
            unsafe { self.gl.delete_texture(tex) };
        }
    }

    fn texture_storage(&mut self, tex: TextureId, format: StorageFormat, width: u32, height: u32) {
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, Self::texture(tex));
            self.gl.tex_storage_2d(
                glow::TEXTURE_2D,
                1,
                internal_format(format),
                width as i32,
                height as i32,
            );
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn bind_framebuffer(&mut self, t: FramebufferTarget, fb: Option<FramebufferId>) {
        unsafe { self.gl.bind_framebuffer(target(t), Self::framebuffer(fb)) };
    }

    fn framebuffer_renderbuffer(
        &mut self,
        t: FramebufferTarget,
        a: Attachment,
        rb: RenderbufferId,
    ) {
        unsafe {
            self.gl.framebuffer_renderbuffer(
                target(t),
                attachment(a),
                glow::RENDERBUFFER,
                Self::renderbuffer(rb),
            )
        };
    }

    fn framebuffer_texture(&mut self, t: FramebufferTarget, a: Attachment, tex: Option<TextureId>) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                target(t),
                attachment(a),
                glow::TEXTURE_2D,
                tex.and_then(Self::texture),
                0,
            )
        };
    }

    fn check_framebuffer_complete(&mut self, t: FramebufferTarget) -> Result<(), XrError> {
        let status = unsafe { self.gl.check_framebuffer_status(target(t)) };
        if status == glow::FRAMEBUFFER_COMPLETE {
            Ok(())
        } else {
            Err(XrError::Graphics(format!(
                "framebuffer {} (0x{:04x})",
                status_name(status),
                status
            )))
        }
    }

    fn viewport(&mut self, r: Rect) {
        unsafe { self.gl.viewport(r.x, r.y, r.width, r.height) };
    }

    fn scissor(&mut self, r: Rect) {
        unsafe { self.gl.scissor(r.x, r.y, r.width, r.height) };
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(capability(cap));
            } else {
                self.gl.disable(capability(cap));
            }
        }
    }

    fn blit_color(&mut self, src: Rect, dst: Rect, filter: BlitFilter) {
        let filter = match filter {
            BlitFilter::Nearest => glow::NEAREST,
            BlitFilter::Linear => glow::LINEAR,
        };
        unsafe {
            self.gl.blit_framebuffer(
                src.x,
                src.y,
                src.x1(),
                src.y1(),
                dst.x,
                dst.y,
                dst.x1(),
                dst.y1(),
                glow::COLOR_BUFFER_BIT,
                filter,
            )
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_formats() {
        assert_eq!(internal_format(StorageFormat::Rgba8), glow::RGBA8);
        assert_eq!(internal_format(StorageFormat::Srgb8Alpha8), glow::SRGB8_ALPHA8);
        assert_eq!(
            internal_format(StorageFormat::Depth24Stencil8),
            glow::DEPTH24_STENCIL8
        );
    }

    #[test]
    fn test_incomplete_status_names() {
        assert_eq!(
            status_name(glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE),
            "incomplete multisample"
        );
        assert_eq!(status_name(0), "incomplete");
    }

    #[test]
    fn test_zero_names_are_not_objects() {
        assert!(GlowDevice::texture(TextureId(0)).is_none());
        assert!(GlowDevice::framebuffer(None).is_none());
        assert!(GlowDevice::renderbuffer(RenderbufferId(7)).is_some());
    }
}
