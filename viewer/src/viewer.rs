//! The top-level viewer a host embeds.
//!
//! `XrViewer::start` brings the runtime and the render targets up with the
//! worker context current; the host then calls [`XrViewer::tick`] from a
//! single-shot timer and [`XrViewer::terminate`] when it closes the view.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::{PreferencesStore, ViewerPreferences};
use crate::error::XrError;
use crate::input::ControllerState;
use crate::locomotion::WorldTransform;
use crate::pose::EyeCamera;
use crate::render::context::{ContextRole, ContextScheduler, GraphicsContext};
use crate::render::gl::GlDevice;
use crate::render::pipeline::{MirrorPresenter, RenderTargetPipeline};
use crate::scene::{LightSettings, SceneGraphProvider, SceneRenderer};
use crate::xr::bootstrap::bootstrap;
use crate::xr::debug::DebugSink;
use crate::xr::frame_cycle::{FrameCycle, FrameOutcome};
use crate::xr::frame_stats::FrameStatsSummary;
use crate::xr::resources::XrResources;
use crate::xr::runtime::{RuntimeInfo, SessionState, XrRuntime};

/// Collaborators supplied by the host windowing and scene layers.
pub struct HostBindings {
    /// Hidden-surface context for runtime and off-screen GL work.
    pub worker: Box<dyn GraphicsContext>,
    /// Context on the host's visible surface, used for the mirror.
    pub display: Box<dyn GraphicsContext>,
    pub worker_gl: Box<dyn GlDevice>,
    pub display_gl: Box<dyn GlDevice>,
    pub renderer: Box<dyn SceneRenderer>,
    pub scenes: Box<dyn SceneGraphProvider>,
    pub debug_sink: Arc<dyn DebugSink>,
}

fn flatten<T>(result: Result<Result<T, XrError>, XrError>) -> Result<T, XrError> {
    result.and_then(|inner| inner)
}

pub struct XrViewer<R: XrRuntime> {
    runtime: R,
    contexts: ContextScheduler,
    worker_gl: Box<dyn GlDevice>,
    display_gl: Box<dyn GlDevice>,
    renderer: Box<dyn SceneRenderer>,
    scenes: Box<dyn SceneGraphProvider>,
    resources: XrResources,
    runtime_info: RuntimeInfo,
    render_size: (u32, u32),
    /// `None` once terminated.
    core: Option<FrameCycle>,
    mirror: Option<MirrorPresenter>,
}

impl<R: XrRuntime> XrViewer<R> {
    /// Bring everything up. On failure whatever was created is destroyed
    /// and no viewer is returned.
    pub fn start(
        mut runtime: R,
        host: HostBindings,
        store: &dyn PreferencesStore,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, XrError> {
        let HostBindings {
            worker,
            display,
            mut worker_gl,
            display_gl,
            mut renderer,
            mut scenes,
            debug_sink,
        } = host;
        let prefs = ViewerPreferences::load(store);
        let mut contexts = ContextScheduler::new(worker, display);
        let binding = contexts.worker_binding();

        let system = flatten(contexts.with_current(ContextRole::Worker, || {
            bootstrap(&mut runtime, &binding, prefs.debug_enabled, debug_sink)
        }))?;
        let mut resources = system.resources;
        let (width, height) = system.render_size;

        let samples = prefs.effective_samples();
        let mirror = prefs.mirror_enabled;
        let targets = flatten(contexts.with_current(ContextRole::Worker, || {
            let mut pipeline = RenderTargetPipeline::create(&mut *worker_gl, width, height, samples)?;
            if mirror {
                if let Err(e) = pipeline.enable_mirror(&mut *worker_gl) {
                    pipeline.destroy(&mut *worker_gl);
                    return Err(e);
                }
            }
            Ok(pipeline)
        }));
        let pipeline = match targets {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!("GL: render target setup failed: {}", e);
                let cleanup = contexts.with_current(ContextRole::Worker, || resources.teardown(&mut runtime));
                if let Err(te) = flatten(cleanup) {
                    warn!("XR: cleanup after failed startup: {}", te);
                }
                return Err(e);
            }
        };

        renderer.configure_lighting(&LightSettings::from_prefs(&prefs));
        let scene = scenes.current_scene_graph();
        let core = FrameCycle::new(system.swapchain, pipeline, clock, prefs, scene);
        info!(
            "XR: viewer started, {}x{} stereo target, {} samples",
            width, height, samples
        );

        Ok(Self {
            runtime,
            contexts,
            worker_gl,
            display_gl,
            renderer,
            scenes,
            resources,
            runtime_info: system.runtime_info,
            render_size: system.render_size,
            core: Some(core),
            mirror: mirror.then(MirrorPresenter::new),
        })
    }

    /// Host timer entry point. Fatal errors are logged and the viewer is
    /// torn down; the host sees `Terminated`.
    pub fn tick(&mut self) -> FrameOutcome {
        match self.run_frame() {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("XR: {}", e);
                if let Err(e) = self.terminate() {
                    error!("XR: teardown: {}", e);
                }
                FrameOutcome::Terminated
            }
        }
    }

    /// One pass of the frame protocol, then the mirror if anything was
    /// rendered.
    pub fn run_frame(&mut self) -> Result<FrameOutcome, XrError> {
        let Some(core) = self.core.as_mut() else {
            return Ok(FrameOutcome::Terminated);
        };
        let outcome = core.run_frame(
            &mut self.runtime,
            &mut self.contexts,
            &mut *self.worker_gl,
            &mut *self.renderer,
        )?;
        if outcome == (FrameOutcome::Submitted { rendered: true }) {
            self.present_mirror();
        }
        Ok(outcome)
    }

    fn present_mirror(&mut self) {
        let (Some(core), Some(presenter)) = (self.core.as_ref(), self.mirror.as_mut()) else {
            return;
        };
        let Some(texture) = core.pipeline().mirror_texture() else {
            return;
        };
        let source = core.pipeline().full_rect();
        let surface = self.contexts.display_surface_size();
        let gl = &mut *self.display_gl;
        let presented = self
            .contexts
            .with_current(ContextRole::Display, || presenter.present(gl, texture, source, surface));
        match flatten(presented) {
            Ok(()) => self.contexts.swap_display(),
            Err(e) => warn!("GL: mirror: {}", e),
        }
    }

    /// Tear everything down. Safe to call more than once.
    pub fn terminate(&mut self) -> Result<(), XrError> {
        let Some(mut core) = self.core.take() else {
            return Ok(());
        };
        core.session_mut().request_quit();
        info!("XR: terminating");

        if let Some(mut presenter) = self.mirror.take() {
            let gl = &mut *self.display_gl;
            if let Err(e) = self
                .contexts
                .with_current(ContextRole::Display, || presenter.destroy(gl))
            {
                warn!("GL: mirror teardown: {}", e);
            }
        }

        let runtime = &mut self.runtime;
        let gl = &mut *self.worker_gl;
        let resources = &mut self.resources;
        flatten(self.contexts.with_current(ContextRole::Worker, || {
            core.release_targets(runtime, gl);
            resources.teardown(runtime)
        }))
    }

    pub fn enable_mirror(&mut self) -> Result<(), XrError> {
        let Some(core) = self.core.as_mut() else {
            return Ok(());
        };
        let gl = &mut *self.worker_gl;
        flatten(
            self.contexts
                .with_current(ContextRole::Worker, || core.pipeline_mut().enable_mirror(gl)),
        )?;
        if self.mirror.is_none() {
            info!("GL: mirror enabled");
            self.mirror = Some(MirrorPresenter::new());
        }
        Ok(())
    }

    pub fn disable_mirror(&mut self) -> Result<(), XrError> {
        if let Some(mut presenter) = self.mirror.take() {
            let gl = &mut *self.display_gl;
            self.contexts
                .with_current(ContextRole::Display, || presenter.destroy(gl))?;
            info!("GL: mirror disabled");
        }
        if let Some(core) = self.core.as_mut() {
            let gl = &mut *self.worker_gl;
            self.contexts
                .with_current(ContextRole::Worker, || core.pipeline_mut().disable_mirror(gl))?;
        }
        Ok(())
    }

    pub fn mirror_enabled(&self) -> bool {
        self.mirror.is_some()
    }

    /// Re-query the host for the document subtree to render.
    pub fn reload_scene_graph(&mut self) {
        let scene = self.scenes.current_scene_graph();
        if let Some(core) = self.core.as_mut() {
            info!("XR: scene graph reloaded ({:?})", scene);
            core.set_scene(scene);
        }
    }

    /// Re-read preferences. The sample count only changes on restart.
    pub fn reload_preferences(&mut self, store: &dyn PreferencesStore) -> Result<(), XrError> {
        let prefs = ViewerPreferences::load(store);
        self.renderer
            .configure_lighting(&LightSettings::from_prefs(&prefs));
        match (prefs.mirror_enabled, self.mirror_enabled()) {
            (true, false) => self.enable_mirror()?,
            (false, true) => self.disable_mirror()?,
            _ => {}
        }
        if let Some(core) = self.core.as_mut() {
            core.apply_preferences(prefs);
        }
        Ok(())
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.core.as_ref().map(|c| c.session().state())
    }

    /// True once the session asked to end or the viewer was torn down.
    pub fn should_quit(&self) -> bool {
        self.core
            .as_ref()
            .map_or(true, |c| c.session().should_quit())
    }

    pub fn is_terminated(&self) -> bool {
        self.core.is_none()
    }

    pub fn controllers(&self) -> Option<&[ControllerState; 2]> {
        self.core.as_ref().map(FrameCycle::controllers)
    }

    pub fn world(&self) -> Option<&WorldTransform> {
        self.core.as_ref().map(FrameCycle::world)
    }

    pub fn cameras(&self) -> Option<&[EyeCamera; 2]> {
        self.core.as_ref().and_then(FrameCycle::cameras)
    }

    pub fn stats(&self) -> Option<FrameStatsSummary> {
        self.core.as_ref().map(|c| c.stats().summary())
    }

    pub fn preferences(&self) -> Option<&ViewerPreferences> {
        self.core.as_ref().map(FrameCycle::preferences)
    }

    pub fn runtime_info(&self) -> &RuntimeInfo {
        &self.runtime_info
    }

    pub fn render_size(&self) -> (u32, u32) {
        self.render_size
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }
}

impl<R: XrRuntime> Drop for XrViewer<R> {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            error!("XR: teardown on drop: {}", e);
        }
    }
}
