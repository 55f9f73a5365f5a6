//! Shared fixtures: a viewer wired entirely to simulated collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use xr_viewer::clock::TestClock;
use xr_viewer::config::MemoryPreferences;
use xr_viewer::sim::{CallLog, RecordingRenderer, SimContext, SimGl, SimRuntime, SimSceneProvider};
use xr_viewer::viewer::{HostBindings, XrViewer};
use xr_viewer::xr::debug::TracingDebugSink;
use xr_viewer::XrError;

pub const SURFACE: (u32, u32) = (1280, 720);

pub struct Rig {
    pub log: CallLog,
    pub clock: Arc<TestClock>,
    pub runtime: SimRuntime,
    pub worker_gl: SimGl,
    pub prefs: MemoryPreferences,
}

impl Rig {
    /// A runtime that will walk READY through FOCUSED on the first tick.
    pub fn new() -> Self {
        let log = CallLog::new();
        let mut runtime = SimRuntime::new(log.clone());
        runtime.push_startup_states();
        Self {
            worker_gl: SimGl::new("worker", log.clone()),
            clock: Arc::new(TestClock::new()),
            prefs: MemoryPreferences::new(),
            runtime,
            log,
        }
    }

    pub fn start(self) -> Result<(XrViewer<SimRuntime>, CallLog, Arc<TestClock>), XrError> {
        let Rig {
            log,
            clock,
            runtime,
            worker_gl,
            prefs,
        } = self;
        let host = HostBindings {
            worker: Box::new(SimContext::new("worker", (1, 1), log.clone())),
            display: Box::new(SimContext::new("display", SURFACE, log.clone())),
            worker_gl: Box::new(worker_gl),
            display_gl: Box::new(SimGl::new("display", log.clone())),
            renderer: Box::new(RecordingRenderer::new(log.clone())),
            scenes: Box::new(SimSceneProvider::new(log.clone())),
            debug_sink: Arc::new(TracingDebugSink),
        };
        let viewer = XrViewer::start(runtime, host, &prefs, clock.clone())?;
        Ok((viewer, log, clock))
    }
}

/// Start a default rig, panicking on failure.
pub fn started() -> (XrViewer<SimRuntime>, CallLog, Arc<TestClock>) {
    match Rig::new().start() {
        Ok(parts) => parts,
        Err(e) => panic!("viewer failed to start: {}", e),
    }
}

/// Index of the first log entry equal to `entry`.
pub fn position(log: &CallLog, entry: &str) -> usize {
    log.names()
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{:?} not in log {:?}", entry, log.names()))
}
