//! The per-tick frame protocol.
//!
//! One call to [`FrameCycle::run_frame`] per host timer tick:
//! poll events, then (if the session accepts frames) wait, begin,
//! optionally render, and end. Every successful begin-frame is matched by
//! exactly one end-frame, with zero layers when nothing was rendered.

use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::clock::{millis_between, Clock};
use crate::config::ViewerPreferences;
use crate::error::XrError;
use crate::input::{ControllerInputSampler, ControllerState, Hand};
use crate::locomotion::{Locomotion, WorldTransform};
use crate::pose::{eye_camera, EyeCamera};
use crate::render::context::{ContextRole, ContextScheduler};
use crate::render::gl::{GlDevice, TextureId};
use crate::render::pipeline::RenderTargetPipeline;
use crate::scene::{SceneHandle, SceneRenderer, SceneRoot};
use crate::xr::frame_stats::{FrameSample, FrameStats};
use crate::xr::runtime::{FrameTiming, ProjectionLayer, RuntimeEvent, XrRuntime, INFINITE_DURATION};
use crate::xr::session::SessionStateMachine;
use crate::xr::swapchain::SwapchainManager;

/// Why a tick produced no frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The session is not in a state that accepts frames.
    SessionNotReady,
    /// Wait-frame or begin-frame failed; try again next tick.
    FrameUnavailable,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// End-frame was called; `rendered` says whether a layer was attached.
    Submitted { rendered: bool },
    Skipped(SkipReason),
    /// The session is over. No further runtime calls will be made.
    Terminated,
}

pub struct FrameCycle {
    session: SessionStateMachine,
    swapchain: SwapchainManager,
    pipeline: RenderTargetPipeline,
    input: ControllerInputSampler,
    locomotion: Locomotion,
    stats: FrameStats,
    clock: Arc<dyn Clock>,
    prefs: ViewerPreferences,
    root: SceneRoot,
    cameras: Option<[EyeCamera; 2]>,
}

impl FrameCycle {
    pub fn new(
        swapchain: SwapchainManager,
        pipeline: RenderTargetPipeline,
        clock: Arc<dyn Clock>,
        prefs: ViewerPreferences,
        scene: SceneHandle,
    ) -> Self {
        let locomotion = Locomotion::new(clock.clone(), prefs.movement);
        Self {
            session: SessionStateMachine::new(),
            swapchain,
            pipeline,
            input: ControllerInputSampler::new(),
            locomotion,
            stats: FrameStats::default(),
            clock,
            prefs,
            root: SceneRoot::new(scene),
            cameras: None,
        }
    }

    pub fn session(&self) -> &SessionStateMachine {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionStateMachine {
        &mut self.session
    }

    pub fn controllers(&self) -> &[ControllerState; 2] {
        self.input.states()
    }

    pub fn world(&self) -> &WorldTransform {
        self.locomotion.world()
    }

    /// Cameras of the last rendered frame.
    pub fn cameras(&self) -> Option<&[EyeCamera; 2]> {
        self.cameras.as_ref()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn pipeline(&self) -> &RenderTargetPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut RenderTargetPipeline {
        &mut self.pipeline
    }

    pub fn preferences(&self) -> &ViewerPreferences {
        &self.prefs
    }

    pub fn scene(&self) -> SceneHandle {
        self.root.scene
    }

    pub fn set_scene(&mut self, scene: SceneHandle) {
        self.root.scene = scene;
    }

    /// Apply re-read preferences. Takes effect on the next rendered tick,
    /// except the sample count, which is fixed at startup.
    pub fn apply_preferences(&mut self, prefs: ViewerPreferences) {
        if prefs.msaa_samples != self.prefs.msaa_samples {
            warn!(
                "XR prefs: MSAA {} -> {} needs a restart",
                self.prefs.msaa_samples, prefs.msaa_samples
            );
        }
        if prefs.movement != self.locomotion.mode() {
            info!("XR prefs: movement mode {}", prefs.movement.as_str());
            self.locomotion.set_mode(prefs.movement);
        }
        self.prefs = ViewerPreferences {
            msaa_samples: self.prefs.msaa_samples,
            ..prefs
        };
    }

    /// Run one host tick.
    pub fn run_frame<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        contexts: &mut ContextScheduler,
        gl: &mut dyn GlDevice,
        renderer: &mut dyn SceneRenderer,
    ) -> Result<FrameOutcome, XrError> {
        if self.session.should_quit() {
            return Ok(FrameOutcome::Terminated);
        }
        self.drain_events(runtime)?;
        if self.session.should_quit() {
            return Ok(FrameOutcome::Terminated);
        }
        if !self.session.can_submit_frame() {
            trace!("XR: session {}, no frame", self.session.state().as_str());
            self.stats.record_skip();
            return Ok(FrameOutcome::Skipped(SkipReason::SessionNotReady));
        }

        contexts.with_current(ContextRole::Worker, || self.submit_frame(runtime, gl, renderer))?
    }

    fn drain_events<R: XrRuntime + ?Sized>(&mut self, runtime: &mut R) -> Result<(), XrError> {
        while let Some(event) = runtime.poll_event()? {
            match event {
                RuntimeEvent::SessionStateChanged(state) => self.session.on_event(runtime, state)?,
                RuntimeEvent::InstanceLossPending => self.session.on_instance_loss(),
                RuntimeEvent::Other => trace!("XR: ignoring event"),
            }
            if self.session.should_quit() {
                break;
            }
        }
        Ok(())
    }

    fn wait_and_begin<R: XrRuntime + ?Sized>(runtime: &mut R) -> Result<FrameTiming, XrError> {
        let timing = runtime.wait_frame()?;
        runtime.begin_frame()?;
        Ok(timing)
    }

    fn submit_frame<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        gl: &mut dyn GlDevice,
        renderer: &mut dyn SceneRenderer,
    ) -> Result<FrameOutcome, XrError> {
        let started = self.clock.now();
        let timing = match Self::wait_and_begin(runtime) {
            Ok(timing) => timing,
            Err(e) if e.is_recoverable_per_tick() => {
                debug!("XR: no frame this tick: {}", e);
                self.stats.record_skip();
                return Ok(FrameOutcome::Skipped(SkipReason::FrameUnavailable));
            }
            Err(e) => return Err(e),
        };
        let time = timing.predicted_display_time;
        let waited = self.clock.now();

        let (layer, render_err) = if timing.should_render {
            match self.render(runtime, gl, renderer, time) {
                Ok(layer) => (Some(layer), None),
                Err(e) => (None, Some(e)),
            }
        } else {
            (None, None)
        };
        let rendered_at = self.clock.now();

        let ended = runtime.end_frame(time, layer.as_ref());
        if let Some(e) = render_err {
            error!("XR: rendering failed: {}", e);
            return Err(e);
        }
        ended?;

        let rendered = layer.is_some();
        if rendered {
            let sample = FrameSample {
                wait_ms: millis_between(started, waited),
                render_ms: millis_between(waited, rendered_at),
                submit_ms: millis_between(rendered_at, self.clock.now()),
            };
            if self.stats.record(sample) {
                debug!("XR: {}", self.stats.summary());
            }
        }
        Ok(FrameOutcome::Submitted { rendered })
    }

    fn render<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        gl: &mut dyn GlDevice,
        renderer: &mut dyn SceneRenderer,
        time: i64,
    ) -> Result<ProjectionLayer, XrError> {
        self.input.sample_frame(runtime, time);
        let eyes = runtime.locate_views(time)?;
        self.locomotion.step(
            &eyes,
            self.input.states(),
            self.prefs.linear_speed,
            self.prefs.rotational_speed,
        );
        self.input.update_world_poses(self.locomotion.world());
        for hand in Hand::ALL {
            let state = self.input.state(hand);
            self.root.controllers[hand.index()] = state.visible.then_some(state.world_pose);
        }

        let world = *self.locomotion.world().isometry();
        let cameras = [eye_camera(&world, &eyes[0]), eye_camera(&world, &eyes[1])];

        let pipeline = &mut self.pipeline;
        let root = &self.root;
        self.swapchain.with_image(runtime, INFINITE_DURATION, |image| {
            pipeline.render(gl, TextureId(image.texture), &cameras, root, renderer);
            Ok(())
        })?;
        self.cameras = Some(cameras);

        let (width, height) = self.pipeline.size();
        Ok(ProjectionLayer::side_by_side(&eyes, width, height))
    }

    /// Release GL and swapchain state ahead of handle teardown. Must run
    /// with the worker context current.
    pub fn release_targets<R: XrRuntime + ?Sized>(self, runtime: &mut R, gl: &mut dyn GlDevice) {
        let FrameCycle {
            mut swapchain,
            pipeline,
            stats,
            ..
        } = self;
        swapchain.release_dangling(runtime);
        pipeline.destroy(gl);
        info!("XR: {}", stats.summary());
    }
}
