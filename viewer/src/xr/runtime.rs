//! The seam between the viewer and an OpenXR runtime.
//!
//! `XrRuntime` is a flat, handle-free view of the OpenXR calls the viewer
//! makes. The runtime implementation owns every handle it creates; the
//! viewer refers to them only through `HandleKind` at teardown. The real
//! implementation lives in `openxr_backend` (feature `vr`), the scripted
//! one in `crate::sim`.

use std::sync::Arc;

use crate::error::XrError;
use crate::input::Hand;
use crate::pose::{EyeView, Fov, Pose};
use crate::render::gl::Rect;
use crate::xr::bindings::ProfileBinding;
use crate::xr::debug::DebugSink;

pub const KHR_OPENGL_ENABLE: &str = "XR_KHR_opengl_enable";
pub const EXT_DEBUG_UTILS: &str = "XR_EXT_debug_utils";

pub const APPLICATION_NAME: &str = "xr_viewer";

/// `GL_SRGB8_ALPHA8`
pub const SWAPCHAIN_FORMAT: u32 = 0x8C43;

/// Wait forever on a swapchain image.
pub const INFINITE_DURATION: i64 = i64::MAX;

/// Session lifecycle phase reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Synchronized => "synchronized",
            Self::Visible => "visible",
            Self::Focused => "focused",
            Self::Stopping => "stopping",
            Self::LossPending => "loss-pending",
            Self::Exiting => "exiting",
        }
    }
}

/// Events the viewer reacts to. Anything else is reported as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEvent {
    SessionStateChanged(SessionState),
    InstanceLossPending,
    Other,
}

/// Result of a wait-frame call. Consumed within the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    /// Nanoseconds in runtime time.
    pub predicted_display_time: i64,
    pub predicted_display_period: i64,
    pub should_render: bool,
}

/// Outcome of syncing the action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSync {
    Synced,
    /// The session is not focused; action states are all inactive.
    NotFocused,
}

/// The three float-valued actions per hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatAction {
    StickX,
    StickY,
    Trigger,
}

impl FloatAction {
    pub const ALL: [FloatAction; 3] = [FloatAction::StickX, FloatAction::StickY, FloatAction::Trigger];

    /// Action name registered with the runtime.
    pub fn name(self) -> &'static str {
        match self {
            FloatAction::StickX => "stick_x",
            FloatAction::StickY => "stick_y",
            FloatAction::Trigger => "trigger",
        }
    }

    pub fn localized_name(self) -> &'static str {
        match self {
            FloatAction::StickX => "Thumbstick X",
            FloatAction::StickY => "Thumbstick Y",
            FloatAction::Trigger => "Trigger",
        }
    }
}

/// A located space with its validity flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceLocation {
    pub pose: Pose,
    pub position_valid: bool,
    pub orientation_valid: bool,
}

/// Runtime identity, read after instance creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub runtime_name: String,
    /// Packed `XrVersion` as the runtime reports it.
    pub runtime_version: u64,
}

/// Recommended and maximum extents for one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewConfigView {
    pub recommended_width: u32,
    pub recommended_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub recommended_samples: u32,
}

/// Supported OpenGL API range, packed `XrVersion`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsRequirements {
    pub min_api_version: u64,
    pub max_api_version: u64,
}

/// Native handles the session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsBinding {
    /// GLX on Xlib; pointers are owned by the host windowing layer.
    Xlib {
        x_display: *mut std::ffi::c_void,
        visualid: u32,
        glx_fb_config: *mut std::ffi::c_void,
        glx_drawable: u64,
        glx_context: *mut std::ffi::c_void,
    },
    /// No native binding; only accepted by simulated runtimes.
    Headless,
}

/// Swapchain shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub sample_count: u32,
}

impl SwapchainDesc {
    /// Full stereo target: both eyes packed side by side.
    pub fn stereo(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: SWAPCHAIN_FORMAT,
            sample_count: 1,
        }
    }
}

/// One eye of the projection layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionView {
    pub pose: Pose,
    pub fov: Fov,
    pub image_rect: Rect,
}

/// Stereo projection layer over the single shared swapchain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionLayer {
    pub views: [ProjectionView; 2],
}

impl ProjectionLayer {
    /// Layer for a `width` x `height` target split down the middle.
    pub fn side_by_side(eyes: &[EyeView; 2], width: u32, height: u32) -> Self {
        let half = (width / 2) as i32;
        let h = height as i32;
        let view = |i: usize| ProjectionView {
            pose: eyes[i].pose,
            fov: eyes[i].fov,
            image_rect: Rect::new(half * i as i32, 0, half, h),
        };
        Self {
            views: [view(0), view(1)],
        }
    }
}

/// Handle groups, for ordered teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    ActionSpaces,
    ReferenceSpace,
    ActionSet,
    Swapchain,
    Session,
    DebugMessenger,
    Instance,
}

impl HandleKind {
    /// Destruction order: dependents first.
    pub const TEARDOWN_ORDER: [HandleKind; 7] = [
        HandleKind::ActionSpaces,
        HandleKind::ReferenceSpace,
        HandleKind::ActionSet,
        HandleKind::Swapchain,
        HandleKind::Session,
        HandleKind::DebugMessenger,
        HandleKind::Instance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionSpaces => "action spaces",
            Self::ReferenceSpace => "reference space",
            Self::ActionSet => "action set",
            Self::Swapchain => "swapchain",
            Self::Session => "session",
            Self::DebugMessenger => "debug messenger",
            Self::Instance => "instance",
        }
    }
}

/// Extensions to request at instance creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPlan {
    pub extensions: Vec<&'static str>,
    pub enable_debug: bool,
}

impl ExtensionPlan {
    /// Pick extensions from what the runtime offers. The GL binding is
    /// mandatory; debug-utils is requested only when wanted and offered.
    pub fn negotiate(available: &[String], want_debug: bool) -> Result<Self, XrError> {
        let has = |name: &str| available.iter().any(|e| e == name);
        if !has(KHR_OPENGL_ENABLE) {
            return Err(XrError::MissingExtension(KHR_OPENGL_ENABLE));
        }
        let enable_debug = want_debug && has(EXT_DEBUG_UTILS);
        let mut extensions = vec![KHR_OPENGL_ENABLE];
        if enable_debug {
            extensions.push(EXT_DEBUG_UTILS);
        }
        Ok(Self {
            extensions,
            enable_debug,
        })
    }
}

/// Runtime calls, in the order the viewer makes them.
///
/// Every method maps onto one OpenXR call (or a small fixed group of
/// them, for action creation). Handles live inside the implementation.
pub trait XrRuntime {
    fn available_extensions(&mut self) -> Result<Vec<String>, XrError>;
    /// `sink` receives debug-utils messages when `plan.enable_debug` is set.
    fn create_instance(
        &mut self,
        plan: &ExtensionPlan,
        sink: Option<Arc<dyn DebugSink>>,
    ) -> Result<RuntimeInfo, XrError>;
    fn acquire_system(&mut self) -> Result<(), XrError>;
    fn view_configuration_views(&mut self) -> Result<Vec<ViewConfigView>, XrError>;
    fn graphics_requirements(&mut self) -> Result<GraphicsRequirements, XrError>;
    fn create_session(&mut self, binding: &GraphicsBinding) -> Result<(), XrError>;
    /// STAGE space with identity pose.
    fn create_reference_space(&mut self) -> Result<(), XrError>;
    /// Returns the GL texture names of the swapchain images.
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<Vec<u32>, XrError>;
    /// Action set, actions, suggested bindings, attachment and one grip
    /// space per hand.
    fn create_actions(&mut self, bindings: &[ProfileBinding]) -> Result<(), XrError>;

    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>, XrError>;
    fn begin_session(&mut self) -> Result<(), XrError>;
    fn end_session(&mut self) -> Result<(), XrError>;
    fn wait_frame(&mut self) -> Result<FrameTiming, XrError>;
    fn begin_frame(&mut self) -> Result<(), XrError>;
    fn locate_views(&mut self, time: i64) -> Result<[EyeView; 2], XrError>;
    fn sync_actions(&mut self) -> Result<ActionSync, XrError>;
    fn locate_hand(&mut self, hand: Hand, time: i64) -> Result<SpaceLocation, XrError>;
    fn float_action(&mut self, action: FloatAction, hand: Hand) -> Result<f32, XrError>;
    fn acquire_image(&mut self) -> Result<u32, XrError>;
    fn wait_image(&mut self, timeout_ns: i64) -> Result<(), XrError>;
    fn release_image(&mut self) -> Result<(), XrError>;
    /// `None` submits zero layers.
    fn end_frame(&mut self, time: i64, layer: Option<&ProjectionLayer>) -> Result<(), XrError>;

    /// Destroy a handle group. Destroying an absent handle is a no-op.
    fn destroy(&mut self, handle: HandleKind) -> Result<(), XrError>;
}
