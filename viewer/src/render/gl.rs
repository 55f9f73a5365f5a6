//! The slice of OpenGL the composition pipeline uses.
//!
//! `GlDevice` is implemented once per GL context. Object names are plain
//! integers so swapchain textures handed out by the runtime can be
//! wrapped without conversion.

use crate::error::XrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderbufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Integer rectangle in window coordinates, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn x1(&self) -> i32 {
        self.x + self.width
    }

    pub fn y1(&self) -> i32 {
        self.y + self.height
    }

    /// Left or right half of `self`; `eye` 0 is left.
    pub fn eye_half(&self, eye: usize) -> Rect {
        let half = self.width / 2;
        Rect::new(self.x + half * eye as i32, self.y, half, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferTarget {
    Framebuffer,
    Read,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Color0,
    DepthStencil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    Rgba8,
    Srgb8Alpha8,
    Depth24Stencil8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CullFace,
    DepthTest,
    ScissorTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitFilter {
    Nearest,
    Linear,
}

/// GL calls made by the pipeline, on whichever context is current.
pub trait GlDevice {
    fn create_framebuffer(&mut self) -> Result<FramebufferId, XrError>;
    fn delete_framebuffer(&mut self, fb: FramebufferId);
    fn create_renderbuffer(&mut self) -> Result<RenderbufferId, XrError>;
    fn delete_renderbuffer(&mut self, rb: RenderbufferId);
    /// `samples` below 2 allocates single-sample storage.
    fn renderbuffer_storage(
        &mut self,
        rb: RenderbufferId,
        samples: u32,
        format: StorageFormat,
        width: u32,
        height: u32,
    );
    fn create_texture(&mut self) -> Result<TextureId, XrError>;
    fn delete_texture(&mut self, tex: TextureId);
    fn texture_storage(&mut self, tex: TextureId, format: StorageFormat, width: u32, height: u32);

    /// `None` binds the default framebuffer of the current surface.
    fn bind_framebuffer(&mut self, target: FramebufferTarget, fb: Option<FramebufferId>);
    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        rb: RenderbufferId,
    );
    /// `None` detaches.
    fn framebuffer_texture(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        tex: Option<TextureId>,
    );
    fn check_framebuffer_complete(&mut self, target: FramebufferTarget) -> Result<(), XrError>;

    fn viewport(&mut self, rect: Rect);
    fn scissor(&mut self, rect: Rect);
    fn set_capability(&mut self, cap: Capability, enabled: bool);
    /// Color-buffer blit from the bound read framebuffer to the bound
    /// draw framebuffer.
    fn blit_color(&mut self, src: Rect, dst: Rect, filter: BlitFilter);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eye_halves() {
        let full = Rect::from_size(4000, 2000);
        assert_eq!(full.eye_half(0), Rect::new(0, 0, 2000, 2000));
        assert_eq!(full.eye_half(1), Rect::new(2000, 0, 2000, 2000));
        assert_eq!(full.eye_half(1).x1(), 4000);
        assert_eq!(full.y1(), 2000);
    }
}
