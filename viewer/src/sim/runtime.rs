use std::collections::VecDeque;
use std::sync::Arc;

use nalgebra::Vector3;

use super::CallLog;
use crate::error::{RuntimeCall, XrError};
use crate::input::Hand;
use crate::pose::{EyeView, Fov, Pose};
use crate::xr::bindings::ProfileBinding;
use crate::xr::debug::{DebugSink, Severity};
use crate::xr::runtime::{
    ActionSync, ExtensionPlan, FloatAction, FrameTiming, GraphicsBinding, GraphicsRequirements,
    HandleKind, ProjectionLayer, RuntimeEvent, RuntimeInfo, SessionState, SpaceLocation,
    SwapchainDesc, ViewConfigView, XrRuntime, EXT_DEBUG_UTILS, KHR_OPENGL_ENABLE,
};

pub const SIM_RUNTIME_NAME: &str = "Simulated OpenXR";
const FIRST_DISPLAY_TIME: i64 = 1_000_000_000;
/// 90 Hz
const DISPLAY_PERIOD: i64 = 11_111_111;
const FIRST_SWAPCHAIN_TEXTURE: u32 = 100;

#[derive(Debug, Clone, Copy, Default)]
struct SimHand {
    tracked: bool,
    position: Vector3<f32>,
    stick_x: f32,
    stick_y: f32,
    trigger: f32,
}

#[derive(Debug, Clone)]
struct Failure {
    call: RuntimeCall,
    code: String,
    once: bool,
}

/// Scripted OpenXR runtime.
///
/// Defaults: both extensions offered, a 640x480-per-eye stereo view
/// configuration, three swapchain images, focused, should-render every
/// frame and both hands untracked.
pub struct SimRuntime {
    log: CallLog,
    extensions: Vec<String>,
    info: RuntimeInfo,
    views: Vec<ViewConfigView>,
    events: VecDeque<RuntimeEvent>,
    eyes: [EyeView; 2],
    hands: [SimHand; 2],
    focused: bool,
    image_count: u32,
    next_image: u32,
    should_render_every: u64,
    frame_counter: u64,
    display_time: i64,
    failures: Vec<Failure>,
    debug_sink: Option<Arc<dyn DebugSink>>,
    ended_frames: Vec<Option<ProjectionLayer>>,
}

fn default_eyes() -> [EyeView; 2] {
    let fov = Fov {
        angle_left: -0.8,
        angle_right: 0.75,
        angle_up: 0.8,
        angle_down: -0.85,
    };
    let eye = |x: f32| EyeView {
        pose: Pose::from_raw([x, 1.6, 0.0], [0.0, 0.0, 0.0, 1.0]),
        fov,
    };
    [eye(-0.032), eye(0.032)]
}

impl SimRuntime {
    pub fn new(log: CallLog) -> Self {
        let view = ViewConfigView {
            recommended_width: 640,
            recommended_height: 480,
            max_width: 2048,
            max_height: 2048,
            recommended_samples: 1,
        };
        Self {
            log,
            extensions: vec![KHR_OPENGL_ENABLE.to_string(), EXT_DEBUG_UTILS.to_string()],
            info: RuntimeInfo {
                runtime_name: SIM_RUNTIME_NAME.to_string(),
                runtime_version: 1 << 48,
            },
            views: vec![view, view],
            events: VecDeque::new(),
            eyes: default_eyes(),
            hands: [SimHand::default(); 2],
            focused: true,
            image_count: 3,
            next_image: 0,
            should_render_every: 1,
            frame_counter: 0,
            display_time: FIRST_DISPLAY_TIME,
            failures: Vec::new(),
            debug_sink: None,
            ended_frames: Vec::new(),
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn set_extensions(&mut self, extensions: &[&str]) {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
    }

    pub fn set_runtime_info(&mut self, name: &str, version: u64) {
        self.info = RuntimeInfo {
            runtime_name: name.to_string(),
            runtime_version: version,
        };
    }

    pub fn set_views(&mut self, views: Vec<ViewConfigView>) {
        self.views = views;
    }

    pub fn set_eyes(&mut self, eyes: [EyeView; 2]) {
        self.eyes = eyes;
    }

    pub fn push_event(&mut self, event: RuntimeEvent) {
        self.events.push_back(event);
    }

    pub fn push_state(&mut self, state: SessionState) {
        self.push_event(RuntimeEvent::SessionStateChanged(state));
    }

    /// Queue READY through FOCUSED, the usual start of a session.
    pub fn push_startup_states(&mut self) {
        for state in [
            SessionState::Ready,
            SessionState::Synchronized,
            SessionState::Visible,
            SessionState::Focused,
        ] {
            self.push_state(state);
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Place a tracked controller with the given action values.
    pub fn set_hand(&mut self, hand: Hand, position: Vector3<f32>, stick_x: f32, stick_y: f32, trigger: f32) {
        self.hands[hand.index()] = SimHand {
            tracked: true,
            position,
            stick_x,
            stick_y,
            trigger,
        };
    }

    pub fn set_hand_tracked(&mut self, hand: Hand, tracked: bool) {
        self.hands[hand.index()].tracked = tracked;
    }

    /// Report should-render on every `n`th frame; 0 never renders.
    pub fn set_should_render_every(&mut self, n: u64) {
        self.should_render_every = n;
    }

    pub fn set_image_count(&mut self, count: u32) {
        self.image_count = count.max(1);
    }

    /// Fail every call to `call` with `code` until cleared.
    pub fn fail_on(&mut self, call: RuntimeCall, code: &str) {
        self.failures.push(Failure {
            call,
            code: code.to_string(),
            once: false,
        });
    }

    /// Fail the next call to `call` with `code`.
    pub fn fail_once(&mut self, call: RuntimeCall, code: &str) {
        self.failures.push(Failure {
            call,
            code: code.to_string(),
            once: true,
        });
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn debug_messenger_attached(&self) -> bool {
        self.debug_sink.is_some()
    }

    /// The layer submitted by each end-frame call, in order.
    pub fn ended_frames(&self) -> &[Option<ProjectionLayer>] {
        &self.ended_frames
    }

    fn call(&mut self, call: RuntimeCall) -> Result<(), XrError> {
        self.log.push(call.as_str());
        self.check(call)
    }

    fn call_with(&mut self, call: RuntimeCall, detail: &str) -> Result<(), XrError> {
        self.log.push(format!("{} {}", call.as_str(), detail));
        self.check(call)
    }

    fn check(&mut self, call: RuntimeCall) -> Result<(), XrError> {
        let Some(at) = self.failures.iter().position(|f| f.call == call) else {
            return Ok(());
        };
        let code = if self.failures[at].once {
            self.failures.remove(at).code
        } else {
            self.failures[at].code.clone()
        };
        Err(XrError::runtime(call, code))
    }
}

impl XrRuntime for SimRuntime {
    fn available_extensions(&mut self) -> Result<Vec<String>, XrError> {
        self.call(RuntimeCall::EnumerateExtensions)?;
        Ok(self.extensions.clone())
    }

    fn create_instance(
        &mut self,
        plan: &ExtensionPlan,
        sink: Option<Arc<dyn DebugSink>>,
    ) -> Result<RuntimeInfo, XrError> {
        self.call(RuntimeCall::CreateInstance)?;
        if plan.enable_debug {
            if let Some(sink) = sink {
                sink.on_message(Severity::Info, "sim", "debug messenger attached");
                self.debug_sink = Some(sink);
            }
        }
        Ok(self.info.clone())
    }

    fn acquire_system(&mut self) -> Result<(), XrError> {
        self.call(RuntimeCall::GetSystem)
    }

    fn view_configuration_views(&mut self) -> Result<Vec<ViewConfigView>, XrError> {
        self.call(RuntimeCall::EnumerateViews)?;
        Ok(self.views.clone())
    }

    fn graphics_requirements(&mut self) -> Result<GraphicsRequirements, XrError> {
        self.call(RuntimeCall::GraphicsRequirements)?;
        Ok(GraphicsRequirements {
            min_api_version: 3 << 48,
            max_api_version: 4 << 48 | 6 << 32,
        })
    }

    fn create_session(&mut self, _binding: &GraphicsBinding) -> Result<(), XrError> {
        self.call(RuntimeCall::CreateSession)
    }

    fn create_reference_space(&mut self) -> Result<(), XrError> {
        self.call(RuntimeCall::CreateReferenceSpace)
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<Vec<u32>, XrError> {
        self.call_with(
            RuntimeCall::CreateSwapchain,
            &format!("{}x{}", desc.width, desc.height),
        )?;
        Ok((0..self.image_count)
            .map(|i| FIRST_SWAPCHAIN_TEXTURE + i)
            .collect())
    }

    fn create_actions(&mut self, bindings: &[ProfileBinding]) -> Result<(), XrError> {
        self.call_with(
            RuntimeCall::CreateActions,
            &format!("profiles={}", bindings.len()),
        )
    }

    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>, XrError> {
        // Polling an empty queue is not logged; it happens every tick.
        if self.events.is_empty() {
            self.check(RuntimeCall::PollEvent)?;
            return Ok(None);
        }
        self.call(RuntimeCall::PollEvent)?;
        Ok(self.events.pop_front())
    }

    fn begin_session(&mut self) -> Result<(), XrError> {
        self.call(RuntimeCall::BeginSession)
    }

    fn end_session(&mut self) -> Result<(), XrError> {
        self.call(RuntimeCall::EndSession)
    }

    fn wait_frame(&mut self) -> Result<FrameTiming, XrError> {
        self.call(RuntimeCall::WaitFrame)?;
        self.frame_counter += 1;
        self.display_time += DISPLAY_PERIOD;
        let should_render = self.should_render_every != 0
            && (self.frame_counter - 1) % self.should_render_every == 0;
        Ok(FrameTiming {
            predicted_display_time: self.display_time,
            predicted_display_period: DISPLAY_PERIOD,
            should_render,
        })
    }

    fn begin_frame(&mut self) -> Result<(), XrError> {
        self.call(RuntimeCall::BeginFrame)
    }

    fn locate_views(&mut self, _time: i64) -> Result<[EyeView; 2], XrError> {
        self.call(RuntimeCall::LocateViews)?;
        Ok(self.eyes)
    }

    fn sync_actions(&mut self) -> Result<ActionSync, XrError> {
        self.call(RuntimeCall::SyncActions)?;
        Ok(if self.focused {
            ActionSync::Synced
        } else {
            ActionSync::NotFocused
        })
    }

    fn locate_hand(&mut self, hand: Hand, _time: i64) -> Result<SpaceLocation, XrError> {
        self.call(RuntimeCall::LocateSpace)?;
        let sim = self.hands[hand.index()];
        Ok(SpaceLocation {
            pose: Pose {
                position: sim.position,
                ..Pose::identity()
            },
            position_valid: sim.tracked,
            orientation_valid: sim.tracked,
        })
    }

    fn float_action(&mut self, action: FloatAction, hand: Hand) -> Result<f32, XrError> {
        self.call(RuntimeCall::GetActionState)?;
        let sim = self.hands[hand.index()];
        Ok(match action {
            FloatAction::StickX => sim.stick_x,
            FloatAction::StickY => sim.stick_y,
            FloatAction::Trigger => sim.trigger,
        })
    }

    fn acquire_image(&mut self) -> Result<u32, XrError> {
        self.call(RuntimeCall::AcquireImage)?;
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(index)
    }

    fn wait_image(&mut self, _timeout_ns: i64) -> Result<(), XrError> {
        self.call(RuntimeCall::WaitImage)
    }

    fn release_image(&mut self) -> Result<(), XrError> {
        self.call(RuntimeCall::ReleaseImage)
    }

    fn end_frame(&mut self, _time: i64, layer: Option<&ProjectionLayer>) -> Result<(), XrError> {
        let layers = usize::from(layer.is_some());
        self.call_with(RuntimeCall::EndFrame, &format!("layers={}", layers))?;
        self.ended_frames.push(layer.copied());
        Ok(())
    }

    fn destroy(&mut self, handle: HandleKind) -> Result<(), XrError> {
        self.call_with(RuntimeCall::Destroy, handle.as_str())?;
        if handle == HandleKind::DebugMessenger {
            self.debug_sink = None;
        }
        Ok(())
    }
}
