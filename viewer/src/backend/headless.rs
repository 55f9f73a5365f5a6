//! Headless backend: the viewer against the simulated runtime.
//!
//! Plays the host's part: a single-shot timer calling `tick`, graceful
//! signal handling, periodic status logging and a frame-statistics report
//! at exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::clock::SystemClock;
use crate::config::PreferencesStore;
use crate::sim::{CallLog, RecordingRenderer, SimContext, SimGl, SimRuntime, SimSceneProvider};
use crate::viewer::{HostBindings, XrViewer};
use crate::xr::debug::TracingDebugSink;
use crate::xr::frame_cycle::FrameOutcome;
use crate::xr::frame_stats::FrameStatsSummary;
use crate::xr::runtime::SessionState;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Stop after this many ticks; `None` runs until a signal arrives.
    pub frames: Option<u64>,
    /// Host timer period.
    pub tick_ms: u64,
    /// Simulated should-render cadence.
    pub should_render_every: u64,
    pub mirror: bool,
    /// Size of the simulated display surface.
    pub surface: (u32, u32),
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frames: Some(600),
            tick_ms: 11,
            should_render_every: 1,
            mirror: false,
            surface: (1280, 720),
        }
    }
}

impl HeadlessConfig {
    /// Parse a "WxH" surface size string.
    pub fn parse_resolution(s: &str) -> Option<(u32, u32)> {
        let (w, h) = s.split_once('x')?;
        let w = w.parse::<u32>().ok()?;
        let h = h.parse::<u32>().ok()?;
        if w > 0 && h > 0 {
            Some((w, h))
        } else {
            None
        }
    }
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Run the viewer until the frame budget is spent, the session ends or
/// a signal arrives. Returns the final frame statistics.
pub fn run(config: HeadlessConfig, store: &dyn PreferencesStore) -> anyhow::Result<FrameStatsSummary> {
    let log = CallLog::new();
    let mut runtime = SimRuntime::new(log.clone());
    runtime.set_should_render_every(config.should_render_every);
    runtime.push_startup_states();

    let host = HostBindings {
        worker: Box::new(SimContext::new("worker", (1, 1), log.clone())),
        display: Box::new(SimContext::new("display", config.surface, log.clone())),
        worker_gl: Box::new(SimGl::new("worker", log.clone())),
        display_gl: Box::new(SimGl::new("display", log.clone())),
        renderer: Box::new(RecordingRenderer::new(log.clone())),
        scenes: Box::new(SimSceneProvider::new(log.clone())),
        debug_sink: Arc::new(TracingDebugSink),
    };
    let mut viewer = XrViewer::start(runtime, host, store, Arc::new(SystemClock))?;
    if config.mirror {
        viewer.enable_mirror()?;
    }
    info!(
        "Headless viewer on {} ({}x{}), tick {}ms",
        viewer.runtime_info().runtime_name,
        viewer.render_size().0,
        viewer.render_size().1,
        config.tick_ms
    );

    // Signal handling via libc
    install_signal_handlers();

    let tick_period = Duration::from_millis(config.tick_ms);
    let status_interval = Duration::from_secs(5);
    let mut last_status_log = Instant::now();
    let mut ticks: u64 = 0;
    let mut calls: usize = 0;
    let mut stopping = false;
    let mut summary = FrameStatsSummary::default();

    loop {
        if !stopping && SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown signal received, stopping session");
            viewer.runtime_mut().push_state(SessionState::Stopping);
            viewer.runtime_mut().push_state(SessionState::Exiting);
            stopping = true;
        }
        if config.frames.is_some_and(|n| ticks >= n) {
            info!("Frame budget of {} ticks spent", ticks);
            break;
        }

        let tick_start = Instant::now();
        if let Some(stats) = viewer.stats() {
            summary = stats;
        }
        let outcome = viewer.tick();
        ticks += 1;
        calls += log.len();
        log.clear();
        if outcome == FrameOutcome::Terminated {
            info!("Session ended after {} ticks", ticks);
            break;
        }

        if last_status_log.elapsed() >= status_interval {
            info!(
                "Headless status: {} tick(s), session {:?}, {} recorded call(s)",
                ticks,
                viewer.session_state(),
                calls
            );
            last_status_log = Instant::now();
        }

        if let Some(rest) = tick_period.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if let Some(stats) = viewer.stats() {
        summary = stats;
    }
    viewer.terminate()?;
    calls += log.len();
    info!(
        "Headless viewer shutting down ({} tick(s), {} recorded call(s))",
        ticks, calls
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(HeadlessConfig::parse_resolution("1920x1080"), Some((1920, 1080)));
        assert_eq!(HeadlessConfig::parse_resolution("0x1080"), None);
        assert_eq!(HeadlessConfig::parse_resolution("1920"), None);
        assert_eq!(HeadlessConfig::parse_resolution("axb"), None);
    }
}
