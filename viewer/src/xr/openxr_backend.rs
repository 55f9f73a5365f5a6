//! `XrRuntime` over the `openxr` crate, bound to GLX on Xlib.
//!
//! Handles are created incrementally and stored as `Option`s; `destroy`
//! drops the matching group. The debug messenger and the focus-aware
//! action sync go through the raw function tables because the safe
//! wrappers do not expose them.

use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::sync::Arc;

use openxrs as xr;
use tracing::{debug, info, warn};

use crate::error::{RuntimeCall, XrError};
use crate::input::Hand;
use crate::pose::{EyeView, Fov, Pose};
use crate::xr::bindings::{
    ProfileBinding, ACTION_SET, ACTION_SET_LOCALIZED, POSE_ACTION, POSE_ACTION_LOCALIZED,
};
use crate::xr::debug::{DebugSink, Severity};
use crate::xr::resources::needs_destroy_instance_workaround;
use crate::xr::runtime::{
    ActionSync, ExtensionPlan, FloatAction, FrameTiming, GraphicsBinding, GraphicsRequirements,
    HandleKind, ProjectionLayer, RuntimeEvent, RuntimeInfo, SessionState, SpaceLocation,
    SwapchainDesc, ViewConfigView, XrRuntime, APPLICATION_NAME, EXT_DEBUG_UTILS,
    KHR_OPENGL_ENABLE,
};

const VIEW_TYPE: xr::ViewConfigurationType = xr::ViewConfigurationType::PRIMARY_STEREO;

fn fail(call: RuntimeCall) -> impl Fn(xr::sys::Result) -> XrError {
    move |code| XrError::runtime(call, code.to_string())
}

/// A handle the viewer asked for before creating it.
fn need<T>(handle: &Option<T>, call: RuntimeCall) -> Result<&T, XrError> {
    handle
        .as_ref()
        .ok_or_else(|| XrError::runtime(call, "XR_ERROR_HANDLE_INVALID"))
}

fn need_mut<T>(handle: &mut Option<T>, call: RuntimeCall) -> Result<&mut T, XrError> {
    handle
        .as_mut()
        .ok_or_else(|| XrError::runtime(call, "XR_ERROR_HANDLE_INVALID"))
}

fn to_pose(p: xr::Posef) -> Pose {
    Pose::from_raw(
        [p.position.x, p.position.y, p.position.z],
        [p.orientation.x, p.orientation.y, p.orientation.z, p.orientation.w],
    )
}

fn to_posef(p: &Pose) -> xr::Posef {
    let q = p.orientation.quaternion();
    xr::Posef {
        orientation: xr::Quaternionf {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        },
        position: xr::Vector3f {
            x: p.position.x,
            y: p.position.y,
            z: p.position.z,
        },
    }
}

fn to_fov(f: xr::Fovf) -> Fov {
    Fov {
        angle_left: f.angle_left,
        angle_right: f.angle_right,
        angle_up: f.angle_up,
        angle_down: f.angle_down,
    }
}

fn to_fovf(f: &Fov) -> xr::Fovf {
    xr::Fovf {
        angle_left: f.angle_left,
        angle_right: f.angle_right,
        angle_up: f.angle_up,
        angle_down: f.angle_down,
    }
}

fn session_state(state: xr::SessionState) -> Option<SessionState> {
    Some(match state {
        xr::SessionState::IDLE => SessionState::Idle,
        xr::SessionState::READY => SessionState::Ready,
        xr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        xr::SessionState::VISIBLE => SessionState::Visible,
        xr::SessionState::FOCUSED => SessionState::Focused,
        xr::SessionState::STOPPING => SessionState::Stopping,
        xr::SessionState::LOSS_PENDING => SessionState::LossPending,
        xr::SessionState::EXITING => SessionState::Exiting,
        _ => return None,
    })
}

unsafe extern "system" fn debug_callback(
    severity: xr::sys::DebugUtilsMessageSeverityFlagsEXT,
    _types: xr::sys::DebugUtilsMessageTypeFlagsEXT,
    data: *const xr::sys::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> xr::sys::Bool32 {
    if data.is_null() || user_data.is_null() {
        return xr::sys::FALSE;
    }
    let text = |ptr: *const c_char| {
        if ptr.is_null() {
            String::new()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    };
    let data = &*data;
    let sink = &*(user_data as *const Arc<dyn DebugSink>);
    sink.on_message(
        Severity::from_xr_bits(severity.into_raw()),
        &text(data.function_name),
        &text(data.message),
    );
    xr::sys::FALSE
}

/// A registered debug-utils messenger and the sink its callback reads.
struct DebugMessenger {
    handle: xr::sys::DebugUtilsMessengerEXT,
    destroy: xr::sys::pfn::DestroyDebugUtilsMessengerEXT,
    _sink: Box<Arc<dyn DebugSink>>,
}

impl DebugMessenger {
    fn create(instance: &xr::Instance, sink: Arc<dyn DebugSink>) -> Result<Self, XrError> {
        let ext = instance
            .exts()
            .ext_debug_utils
            .as_ref()
            .ok_or(XrError::MissingExtension(EXT_DEBUG_UTILS))?;
        let sink = Box::new(sink);
        let info = xr::sys::DebugUtilsMessengerCreateInfoEXT {
            ty: xr::sys::DebugUtilsMessengerCreateInfoEXT::TYPE,
            next: std::ptr::null(),
            message_severities: xr::sys::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | xr::sys::DebugUtilsMessageSeverityFlagsEXT::INFO
                | xr::sys::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | xr::sys::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_types: xr::sys::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | xr::sys::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | xr::sys::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | xr::sys::DebugUtilsMessageTypeFlagsEXT::CONFORMANCE,
            user_callback: Some(debug_callback),
            user_data: &*sink as *const Arc<dyn DebugSink> as *mut c_void,
        };
        let mut handle = xr::sys::DebugUtilsMessengerEXT::NULL;
        let res = unsafe {
            (ext.create_debug_utils_messenger)(instance.as_raw(), &info, &mut handle)
        };
        if res.into_raw() < 0 {
            return Err(XrError::runtime(RuntimeCall::CreateInstance, res.to_string()));
        }
        Ok(Self {
            handle,
            destroy: ext.destroy_debug_utils_messenger,
            _sink: sink,
        })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        let res = unsafe { (self.destroy)(self.handle) };
        if res.into_raw() < 0 {
            warn!("XR: destroying debug messenger: {}", res);
        }
    }
}

struct Actions {
    set: xr::ActionSet,
    pose: xr::Action<xr::Posef>,
    floats: HashMap<FloatAction, xr::Action<f32>>,
    hand_paths: [xr::Path; 2],
}

/// The real runtime, loaded from the system OpenXR loader.
pub struct OpenXrRuntime {
    // Field order is drop order: dependents first.
    hand_spaces: Option<[xr::Space; 2]>,
    stage: Option<xr::Space>,
    actions: Option<Actions>,
    swapchain: Option<xr::Swapchain<xr::OpenGL>>,
    frame_stream: Option<xr::FrameStream<xr::OpenGL>>,
    frame_waiter: Option<xr::FrameWaiter>,
    session: Option<xr::Session<xr::OpenGL>>,
    messenger: Option<DebugMessenger>,
    instance: Option<xr::Instance>,
    system: Option<xr::SystemId>,
    entry: xr::Entry,
    event_buffer: xr::EventDataBuffer,
    leak_instance: bool,
}

impl OpenXrRuntime {
    /// Load the OpenXR loader. Nothing is created until bootstrap.
    pub fn load() -> Result<Self, XrError> {
        let entry = unsafe { xr::Entry::load() }
            .map_err(|e| XrError::runtime(RuntimeCall::EnumerateExtensions, e.to_string()))?;
        Ok(Self {
            hand_spaces: None,
            stage: None,
            actions: None,
            swapchain: None,
            frame_stream: None,
            frame_waiter: None,
            session: None,
            messenger: None,
            instance: None,
            system: None,
            entry,
            event_buffer: xr::EventDataBuffer::new(),
            leak_instance: false,
        })
    }

    fn suggest(&self, actions: &Actions, binding: &ProfileBinding) -> Result<(), xr::sys::Result> {
        let instance = match self.instance.as_ref() {
            Some(instance) => instance,
            None => return Err(xr::sys::Result::ERROR_HANDLE_INVALID),
        };
        let mut suggested = Vec::new();
        for hand in Hand::ALL {
            for (name, path) in binding.paths(hand) {
                let path = instance.string_to_path(&path)?;
                if name == POSE_ACTION {
                    suggested.push(xr::Binding::new(&actions.pose, path));
                } else if let Some(action) = FloatAction::ALL
                    .iter()
                    .find(|a| a.name() == name)
                    .and_then(|a| actions.floats.get(a))
                {
                    suggested.push(xr::Binding::new(action, path));
                }
            }
        }
        let profile = instance.string_to_path(binding.profile)?;
        instance.suggest_interaction_profile_bindings(profile, &suggested)
    }
}

impl XrRuntime for OpenXrRuntime {
    fn available_extensions(&mut self) -> Result<Vec<String>, XrError> {
        let set = self
            .entry
            .enumerate_extensions()
            .map_err(fail(RuntimeCall::EnumerateExtensions))?;
        let mut names = set.other.clone();
        if set.khr_opengl_enable {
            names.push(KHR_OPENGL_ENABLE.to_string());
        }
        if set.ext_debug_utils {
            names.push(EXT_DEBUG_UTILS.to_string());
        }
        Ok(names)
    }

    fn create_instance(
        &mut self,
        plan: &ExtensionPlan,
        sink: Option<Arc<dyn DebugSink>>,
    ) -> Result<RuntimeInfo, XrError> {
        let mut exts = xr::ExtensionSet::default();
        exts.khr_opengl_enable = plan.extensions.contains(&KHR_OPENGL_ENABLE);
        exts.ext_debug_utils = plan.enable_debug;
        let app_info = xr::ApplicationInfo {
            application_name: APPLICATION_NAME,
            application_version: 1,
            engine_name: APPLICATION_NAME,
            engine_version: 1,
            api_version: xr::Version::new(1, 0, 0),
        };
        let instance = self
            .entry
            .create_instance(&app_info, &exts, &[])
            .map_err(fail(RuntimeCall::CreateInstance))?;
        let props = instance
            .properties()
            .map_err(fail(RuntimeCall::CreateInstance))?;
        let info = RuntimeInfo {
            runtime_name: props.runtime_name,
            runtime_version: props.runtime_version.into_raw(),
        };
        self.leak_instance = needs_destroy_instance_workaround(
            std::env::consts::OS,
            &info.runtime_name,
            info.runtime_version,
        );

        if let (true, Some(sink)) = (plan.enable_debug, sink) {
            match DebugMessenger::create(&instance, sink) {
                Ok(messenger) => self.messenger = Some(messenger),
                Err(e) => warn!("XR: debug messenger unavailable: {}", e),
            }
        }
        self.instance = Some(instance);
        Ok(info)
    }

    fn acquire_system(&mut self) -> Result<(), XrError> {
        let instance = need(&self.instance, RuntimeCall::GetSystem)?;
        let system = instance
            .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(fail(RuntimeCall::GetSystem))?;
        if let Ok(props) = instance.system_properties(system) {
            info!(
                "XR: HMD {} (vendor {}), max swapchain {}x{}",
                props.system_name,
                props.vendor_id,
                props.graphics_properties.max_swapchain_image_width,
                props.graphics_properties.max_swapchain_image_height
            );
        }
        self.system = Some(system);
        Ok(())
    }

    fn view_configuration_views(&mut self) -> Result<Vec<ViewConfigView>, XrError> {
        let instance = need(&self.instance, RuntimeCall::EnumerateViews)?;
        let system = *need(&self.system, RuntimeCall::EnumerateViews)?;
        let views = instance
            .enumerate_view_configuration_views(system, VIEW_TYPE)
            .map_err(fail(RuntimeCall::EnumerateViews))?;
        Ok(views
            .iter()
            .map(|v| ViewConfigView {
                recommended_width: v.recommended_image_rect_width,
                recommended_height: v.recommended_image_rect_height,
                max_width: v.max_image_rect_width,
                max_height: v.max_image_rect_height,
                recommended_samples: v.recommended_swapchain_sample_count,
            })
            .collect())
    }

    fn graphics_requirements(&mut self) -> Result<GraphicsRequirements, XrError> {
        let instance = need(&self.instance, RuntimeCall::GraphicsRequirements)?;
        let system = *need(&self.system, RuntimeCall::GraphicsRequirements)?;
        let req = instance
            .graphics_requirements::<xr::OpenGL>(system)
            .map_err(fail(RuntimeCall::GraphicsRequirements))?;
        Ok(GraphicsRequirements {
            min_api_version: req.min_api_version_supported.into_raw(),
            max_api_version: req.max_api_version_supported.into_raw(),
        })
    }

    fn create_session(&mut self, binding: &GraphicsBinding) -> Result<(), XrError> {
        let instance = need(&self.instance, RuntimeCall::CreateSession)?;
        let system = *need(&self.system, RuntimeCall::CreateSession)?;
        let create_info = match *binding {
            GraphicsBinding::Xlib {
                x_display,
                visualid,
                glx_fb_config,
                glx_drawable,
                glx_context,
            } => xr::opengl::SessionCreateInfo::Xlib {
                x_display: x_display as *mut _,
                visualid,
                glx_fb_config: glx_fb_config as *mut _,
                glx_drawable: glx_drawable as _,
                glx_context: glx_context as *mut _,
            },
            GraphicsBinding::Headless => {
                return Err(XrError::Graphics(
                    "OpenXR sessions need an Xlib/GLX binding".to_string(),
                ))
            }
        };
        // SAFETY: the binding's handles belong to the worker context,
        // which the caller keeps current for the lifetime of the session.
        let (session, waiter, stream) = unsafe {
            instance
                .create_session::<xr::OpenGL>(system, &create_info)
                .map_err(fail(RuntimeCall::CreateSession))?
        };
        self.session = Some(session);
        self.frame_waiter = Some(waiter);
        self.frame_stream = Some(stream);
        Ok(())
    }

    fn create_reference_space(&mut self) -> Result<(), XrError> {
        let session = need(&self.session, RuntimeCall::CreateReferenceSpace)?;
        let stage = session
            .create_reference_space(xr::ReferenceSpaceType::STAGE, xr::Posef::IDENTITY)
            .map_err(fail(RuntimeCall::CreateReferenceSpace))?;
        self.stage = Some(stage);
        Ok(())
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<Vec<u32>, XrError> {
        let session = need(&self.session, RuntimeCall::CreateSwapchain)?;
        let swapchain = session
            .create_swapchain(&xr::SwapchainCreateInfo {
                create_flags: xr::SwapchainCreateFlags::EMPTY,
                usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT
                    | xr::SwapchainUsageFlags::TRANSFER_DST,
                format: desc.format,
                sample_count: desc.sample_count,
                width: desc.width,
                height: desc.height,
                face_count: 1,
                array_size: 1,
                mip_count: 1,
            })
            .map_err(fail(RuntimeCall::CreateSwapchain))?;
        let images = swapchain
            .enumerate_images()
            .map_err(fail(RuntimeCall::CreateSwapchain))?;
        self.swapchain = Some(swapchain);
        Ok(images)
    }

    fn create_actions(&mut self, bindings: &[ProfileBinding]) -> Result<(), XrError> {
        let call = RuntimeCall::CreateActions;
        let instance = need(&self.instance, call)?;
        let hand_paths = [
            instance.string_to_path(Hand::Left.path()).map_err(fail(call))?,
            instance.string_to_path(Hand::Right.path()).map_err(fail(call))?,
        ];
        let set = instance
            .create_action_set(ACTION_SET, ACTION_SET_LOCALIZED, 0)
            .map_err(fail(call))?;
        let pose = set
            .create_action::<xr::Posef>(POSE_ACTION, POSE_ACTION_LOCALIZED, &hand_paths)
            .map_err(fail(call))?;
        let mut floats = HashMap::new();
        for action in FloatAction::ALL {
            let handle = set
                .create_action::<f32>(action.name(), action.localized_name(), &hand_paths)
                .map_err(fail(call))?;
            floats.insert(action, handle);
        }
        let actions = Actions {
            set,
            pose,
            floats,
            hand_paths,
        };

        for binding in bindings {
            match self.suggest(&actions, binding) {
                Ok(()) => debug!("XR input: suggested bindings for {}", binding.profile),
                Err(e) => warn!("XR input: {} rejected: {}", binding.profile, e),
            }
        }

        let session = need(&self.session, call)?;
        session
            .attach_action_sets(&[&actions.set])
            .map_err(fail(call))?;
        let space = |path: xr::Path| {
            actions
                .pose
                .create_space(session, path, xr::Posef::IDENTITY)
                .map_err(fail(call))
        };
        let spaces = [space(hand_paths[0])?, space(hand_paths[1])?];
        self.actions = Some(actions);
        self.hand_spaces = Some(spaces);
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>, XrError> {
        let instance = need(&self.instance, RuntimeCall::PollEvent)?;
        let event = instance
            .poll_event(&mut self.event_buffer)
            .map_err(fail(RuntimeCall::PollEvent))?;
        Ok(event.map(|event| match event {
            xr::Event::SessionStateChanged(e) => match session_state(e.state()) {
                Some(state) => RuntimeEvent::SessionStateChanged(state),
                None => RuntimeEvent::Other,
            },
            xr::Event::InstanceLossPending(_) => RuntimeEvent::InstanceLossPending,
            _ => RuntimeEvent::Other,
        }))
    }

    fn begin_session(&mut self) -> Result<(), XrError> {
        need(&self.session, RuntimeCall::BeginSession)?
            .begin(VIEW_TYPE)
            .map_err(fail(RuntimeCall::BeginSession))?;
        Ok(())
    }

    fn end_session(&mut self) -> Result<(), XrError> {
        need(&self.session, RuntimeCall::EndSession)?
            .end()
            .map_err(fail(RuntimeCall::EndSession))?;
        Ok(())
    }

    fn wait_frame(&mut self) -> Result<FrameTiming, XrError> {
        let state = need_mut(&mut self.frame_waiter, RuntimeCall::WaitFrame)?
            .wait()
            .map_err(fail(RuntimeCall::WaitFrame))?;
        Ok(FrameTiming {
            predicted_display_time: state.predicted_display_time.as_nanos(),
            predicted_display_period: state.predicted_display_period.as_nanos(),
            should_render: state.should_render,
        })
    }

    fn begin_frame(&mut self) -> Result<(), XrError> {
        need_mut(&mut self.frame_stream, RuntimeCall::BeginFrame)?
            .begin()
            .map_err(fail(RuntimeCall::BeginFrame))
    }

    fn locate_views(&mut self, time: i64) -> Result<[EyeView; 2], XrError> {
        let call = RuntimeCall::LocateViews;
        let session = need(&self.session, call)?;
        let stage = need(&self.stage, call)?;
        let (_, views) = session
            .locate_views(VIEW_TYPE, xr::Time::from_nanos(time), stage)
            .map_err(fail(call))?;
        match views.as_slice() {
            [left, right, ..] => Ok([
                EyeView {
                    pose: to_pose(left.pose),
                    fov: to_fov(left.fov),
                },
                EyeView {
                    pose: to_pose(right.pose),
                    fov: to_fov(right.fov),
                },
            ]),
            _ => Err(XrError::ViewConfiguration(format!(
                "runtime located {} views",
                views.len()
            ))),
        }
    }

    fn sync_actions(&mut self) -> Result<ActionSync, XrError> {
        let call = RuntimeCall::SyncActions;
        let instance = need(&self.instance, call)?;
        let session = need(&self.session, call)?;
        let actions = need(&self.actions, call)?;
        let active = xr::sys::ActiveActionSet {
            action_set: actions.set.as_raw(),
            subaction_path: xr::Path::NULL,
        };
        let info = xr::sys::ActionsSyncInfo {
            ty: xr::sys::ActionsSyncInfo::TYPE,
            next: std::ptr::null(),
            count_active_action_sets: 1,
            active_action_sets: &active,
        };
        // The safe wrapper folds XR_SESSION_NOT_FOCUSED into success.
        let res = unsafe { (instance.fp().sync_actions)(session.as_raw(), &info) };
        if res == xr::sys::Result::SESSION_NOT_FOCUSED {
            Ok(ActionSync::NotFocused)
        } else if res.into_raw() < 0 {
            Err(XrError::runtime(call, res.to_string()))
        } else {
            Ok(ActionSync::Synced)
        }
    }

    fn locate_hand(&mut self, hand: Hand, time: i64) -> Result<SpaceLocation, XrError> {
        let call = RuntimeCall::LocateSpace;
        let spaces = need(&self.hand_spaces, call)?;
        let stage = need(&self.stage, call)?;
        let location = spaces[hand.index()]
            .locate(stage, xr::Time::from_nanos(time))
            .map_err(fail(call))?;
        let flags = location.location_flags;
        Ok(SpaceLocation {
            pose: to_pose(location.pose),
            position_valid: flags.contains(xr::SpaceLocationFlags::POSITION_VALID),
            orientation_valid: flags.contains(xr::SpaceLocationFlags::ORIENTATION_VALID),
        })
    }

    fn float_action(&mut self, action: FloatAction, hand: Hand) -> Result<f32, XrError> {
        let call = RuntimeCall::GetActionState;
        let session = need(&self.session, call)?;
        let actions = need(&self.actions, call)?;
        let handle = actions
            .floats
            .get(&action)
            .ok_or_else(|| XrError::runtime(call, "XR_ERROR_HANDLE_INVALID"))?;
        let state = handle
            .state(session, actions.hand_paths[hand.index()])
            .map_err(fail(call))?;
        Ok(if state.is_active { state.current_state } else { 0.0 })
    }

    fn acquire_image(&mut self) -> Result<u32, XrError> {
        need_mut(&mut self.swapchain, RuntimeCall::AcquireImage)?
            .acquire_image()
            .map_err(fail(RuntimeCall::AcquireImage))
    }

    fn wait_image(&mut self, timeout_ns: i64) -> Result<(), XrError> {
        need_mut(&mut self.swapchain, RuntimeCall::WaitImage)?
            .wait_image(xr::Duration::from_nanos(timeout_ns))
            .map_err(fail(RuntimeCall::WaitImage))
    }

    fn release_image(&mut self) -> Result<(), XrError> {
        need_mut(&mut self.swapchain, RuntimeCall::ReleaseImage)?
            .release_image()
            .map_err(fail(RuntimeCall::ReleaseImage))
    }

    fn end_frame(&mut self, time: i64, layer: Option<&ProjectionLayer>) -> Result<(), XrError> {
        let call = RuntimeCall::EndFrame;
        let time = xr::Time::from_nanos(time);
        let stream = need_mut(&mut self.frame_stream, call)?;
        let Some(layer) = layer else {
            return stream
                .end(time, xr::EnvironmentBlendMode::OPAQUE, &[])
                .map_err(fail(call));
        };
        let swapchain = need(&self.swapchain, call)?;
        let stage = need(&self.stage, call)?;
        let view = |i: usize| {
            let v = &layer.views[i];
            let rect = v.image_rect;
            xr::CompositionLayerProjectionView::new()
                .pose(to_posef(&v.pose))
                .fov(to_fovf(&v.fov))
                .sub_image(
                    xr::SwapchainSubImage::new()
                        .swapchain(swapchain)
                        .image_array_index(0)
                        .image_rect(xr::Rect2Di {
                            offset: xr::Offset2Di {
                                x: rect.x,
                                y: rect.y,
                            },
                            extent: xr::Extent2Di {
                                width: rect.width,
                                height: rect.height,
                            },
                        }),
                )
        };
        let views = [view(0), view(1)];
        let projection = xr::CompositionLayerProjection::new()
            .space(stage)
            .views(&views);
        stream
            .end(time, xr::EnvironmentBlendMode::OPAQUE, &[&projection])
            .map_err(fail(call))
    }

    fn destroy(&mut self, handle: HandleKind) -> Result<(), XrError> {
        match handle {
            HandleKind::ActionSpaces => self.hand_spaces = None,
            HandleKind::ReferenceSpace => self.stage = None,
            HandleKind::ActionSet => self.actions = None,
            HandleKind::Swapchain => self.swapchain = None,
            HandleKind::Session => {
                self.frame_stream = None;
                self.frame_waiter = None;
                self.session = None;
            }
            HandleKind::DebugMessenger => self.messenger = None,
            HandleKind::Instance => {
                self.system = None;
                self.instance = None;
            }
        }
        Ok(())
    }
}

impl Drop for OpenXrRuntime {
    fn drop(&mut self) {
        if self.leak_instance {
            if let Some(instance) = self.instance.take() {
                // SteamVR on Linux hangs in xrDestroyInstance.
                if let Some(messenger) = self.messenger.take() {
                    std::mem::forget(messenger);
                }
                std::mem::forget(instance);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_session_state_mapping() {
        assert_eq!(session_state(xr::SessionState::READY), Some(SessionState::Ready));
        assert_eq!(session_state(xr::SessionState::FOCUSED), Some(SessionState::Focused));
        assert_eq!(
            session_state(xr::SessionState::LOSS_PENDING),
            Some(SessionState::LossPending)
        );
        assert_eq!(session_state(xr::SessionState::UNKNOWN), None);
    }

    #[test]
    fn test_pose_roundtrip_keeps_quaternion_order() {
        let raw = xr::Posef {
            orientation: xr::Quaternionf {
                x: 0.0,
                y: std::f32::consts::FRAC_1_SQRT_2,
                z: 0.0,
                w: std::f32::consts::FRAC_1_SQRT_2,
            },
            position: xr::Vector3f {
                x: 0.1,
                y: 1.6,
                z: -0.2,
            },
        };
        let back = to_posef(&to_pose(raw));
        assert_relative_eq!(back.orientation.y, raw.orientation.y, epsilon = 1e-6);
        assert_relative_eq!(back.orientation.w, raw.orientation.w, epsilon = 1e-6);
        assert_relative_eq!(back.position.y, 1.6);
        assert_relative_eq!(back.position.z, -0.2);
    }

    #[test]
    fn test_fov_passes_angles_through() {
        let fov = to_fov(xr::Fovf {
            angle_left: -0.8,
            angle_right: 0.7,
            angle_up: 0.75,
            angle_down: -0.9,
        });
        assert_eq!(fov.angle_left, -0.8);
        assert_eq!(to_fovf(&fov).angle_down, -0.9);
    }
}
