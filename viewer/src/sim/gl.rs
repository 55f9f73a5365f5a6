use std::collections::HashSet;

use super::CallLog;
use crate::error::XrError;
use crate::render::gl::{
    Attachment, BlitFilter, Capability, FramebufferId, FramebufferTarget, GlDevice, Rect,
    RenderbufferId, StorageFormat, TextureId,
};

/// GL device that records calls instead of issuing them. Object names
/// come from one counter so leaks show up in `live_objects`.
pub struct SimGl {
    label: &'static str,
    log: CallLog,
    next_name: u32,
    live: HashSet<u32>,
    enabled: Vec<Capability>,
    incomplete: bool,
}

fn fmt_rect(r: Rect) -> String {
    format!("{},{} {}x{}", r.x, r.y, r.width, r.height)
}

fn fmt_fb(fb: Option<FramebufferId>) -> String {
    match fb {
        Some(FramebufferId(id)) => id.to_string(),
        None => "default".to_string(),
    }
}

impl SimGl {
    pub fn new(label: &'static str, log: CallLog) -> Self {
        Self {
            label,
            log,
            next_name: 1,
            live: HashSet::new(),
            enabled: Vec::new(),
            incomplete: false,
        }
    }

    /// Objects created and not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    /// Capabilities currently enabled.
    pub fn enabled_caps(&self) -> &[Capability] {
        &self.enabled
    }

    /// Make every completeness check fail.
    pub fn set_incomplete(&mut self, incomplete: bool) {
        self.incomplete = incomplete;
    }

    fn record(&self, entry: String) {
        self.log.push(format!("{}: {}", self.label, entry));
    }

    fn alloc(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        self.live.insert(name);
        name
    }

    fn free(&mut self, name: u32) {
        self.live.remove(&name);
    }
}

impl GlDevice for SimGl {
    fn create_framebuffer(&mut self) -> Result<FramebufferId, XrError> {
        let id = self.alloc();
        self.record(format!("CreateFramebuffer {}", id));
        Ok(FramebufferId(id))
    }

    fn delete_framebuffer(&mut self, fb: FramebufferId) {
        self.record(format!("DeleteFramebuffer {}", fb.0));
        self.free(fb.0);
    }

    fn create_renderbuffer(&mut self) -> Result<RenderbufferId, XrError> {
        let id = self.alloc();
        self.record(format!("CreateRenderbuffer {}", id));
        Ok(RenderbufferId(id))
    }

    fn delete_renderbuffer(&mut self, rb: RenderbufferId) {
        self.record(format!("DeleteRenderbuffer {}", rb.0));
        self.free(rb.0);
    }

    fn renderbuffer_storage(
        &mut self,
        _rb: RenderbufferId,
        samples: u32,
        format: StorageFormat,
        width: u32,
        height: u32,
    ) {
        self.record(format!(
            "RenderbufferStorage samples={} {:?} {}x{}",
            samples, format, width, height
        ));
    }

    fn create_texture(&mut self) -> Result<TextureId, XrError> {
        let id = self.alloc();
        self.record(format!("CreateTexture {}", id));
        Ok(TextureId(id))
    }

    fn delete_texture(&mut self, tex: TextureId) {
        self.record(format!("DeleteTexture {}", tex.0));
        self.free(tex.0);
    }

    fn texture_storage(&mut self, tex: TextureId, format: StorageFormat, width: u32, height: u32) {
        self.record(format!(
            "TexStorage {} {:?} {}x{}",
            tex.0, format, width, height
        ));
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, fb: Option<FramebufferId>) {
        self.record(format!("BindFramebuffer {:?} {}", target, fmt_fb(fb)));
    }

    fn framebuffer_renderbuffer(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        rb: RenderbufferId,
    ) {
        self.record(format!(
            "FramebufferRenderbuffer {:?} {:?} {}",
            target, attachment, rb.0
        ));
    }

    fn framebuffer_texture(
        &mut self,
        target: FramebufferTarget,
        attachment: Attachment,
        tex: Option<TextureId>,
    ) {
        let name = tex.map_or_else(|| "none".to_string(), |t| t.0.to_string());
        self.record(format!(
            "FramebufferTexture {:?} {:?} {}",
            target, attachment, name
        ));
    }

    fn check_framebuffer_complete(&mut self, target: FramebufferTarget) -> Result<(), XrError> {
        self.record(format!("CheckFramebufferStatus {:?}", target));
        if self.incomplete {
            return Err(XrError::Graphics(
                "framebuffer incomplete: GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT".into(),
            ));
        }
        Ok(())
    }

    fn viewport(&mut self, rect: Rect) {
        self.record(format!("Viewport {}", fmt_rect(rect)));
    }

    fn scissor(&mut self, rect: Rect) {
        self.record(format!("Scissor {}", fmt_rect(rect)));
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        if enabled {
            if !self.enabled.contains(&cap) {
                self.enabled.push(cap);
            }
            self.record(format!("Enable {:?}", cap));
        } else {
            self.enabled.retain(|c| *c != cap);
            self.record(format!("Disable {:?}", cap));
        }
    }

    fn blit_color(&mut self, src: Rect, dst: Rect, filter: BlitFilter) {
        self.record(format!(
            "BlitColor {} -> {} {:?}",
            fmt_rect(src),
            fmt_rect(dst),
            filter
        ));
    }
}
