//! Rolling per-frame timing for rendered ticks.

use std::collections::VecDeque;
use std::fmt;

/// Samples kept in the window.
pub const DEFAULT_WINDOW: usize = 1000;
/// 90 Hz frame budget in milliseconds.
pub const DEFAULT_BUDGET_MS: f64 = 11.1;
/// Submitted frames between periodic summary lines.
pub const LOG_INTERVAL: u64 = 600;

/// Durations of one rendered tick, milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameSample {
    /// wait-frame latency
    pub wait_ms: f64,
    /// locate views through release of the swapchain image
    pub render_ms: f64,
    /// end-frame latency
    pub submit_ms: f64,
}

impl FrameSample {
    pub fn total_ms(&self) -> f64 {
        self.wait_ms + self.render_ms + self.submit_ms
    }
}

#[derive(Debug)]
pub struct FrameStats {
    samples: VecDeque<FrameSample>,
    window_size: usize,
    budget_ms: f64,
    total_frames: u64,
    missed_frames: u64,
    skipped_ticks: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_BUDGET_MS)
    }
}

impl FrameStats {
    pub fn new(window_size: usize, budget_ms: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            budget_ms,
            total_frames: 0,
            missed_frames: 0,
            skipped_ticks: 0,
        }
    }

    /// Record a submitted frame. Returns true when a periodic summary is due.
    pub fn record(&mut self, sample: FrameSample) -> bool {
        if self.samples.len() == self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total_frames += 1;
        if sample.total_ms() > self.budget_ms {
            self.missed_frames += 1;
        }
        self.total_frames % LOG_INTERVAL == 0
    }

    /// A tick that produced no frame (runtime not ready).
    pub fn record_skip(&mut self) {
        self.skipped_ticks += 1;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    fn sorted(&self, field: impl Fn(&FrameSample) -> f64) -> Vec<f64> {
        let mut values: Vec<f64> = self.samples.iter().map(field).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values
    }

    pub fn summary(&self) -> FrameStatsSummary {
        let wait = self.sorted(|s| s.wait_ms);
        let render = self.sorted(|s| s.render_ms);
        let submit = self.sorted(|s| s.submit_ms);
        let total = self.sorted(FrameSample::total_ms);
        let total_p50 = Self::percentile(&total, 50.0);

        FrameStatsSummary {
            wait_p50: Self::percentile(&wait, 50.0),
            render_p50: Self::percentile(&render, 50.0),
            render_p99: Self::percentile(&render, 99.0),
            submit_p50: Self::percentile(&submit, 50.0),
            total_p50,
            total_p95: Self::percentile(&total, 95.0),
            total_p99: Self::percentile(&total, 99.0),
            fps: if total_p50 > 0.0 { 1000.0 / total_p50 } else { 0.0 },
            missed_pct: if self.total_frames > 0 {
                (self.missed_frames as f64 / self.total_frames as f64) * 100.0
            } else {
                0.0
            },
            total_frames: self.total_frames,
            missed_frames: self.missed_frames,
            skipped_ticks: self.skipped_ticks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameStatsSummary {
    pub wait_p50: f64,
    pub render_p50: f64,
    pub render_p99: f64,
    pub submit_p50: f64,
    pub total_p50: f64,
    pub total_p95: f64,
    pub total_p99: f64,
    pub fps: f64,
    pub missed_pct: f64,
    pub total_frames: u64,
    pub missed_frames: u64,
    pub skipped_ticks: u64,
}

impl fmt::Display for FrameStatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} missed={} ({:.1}%) skipped={} fps={:.0} total p50/p95/p99={:.1}/{:.1}/{:.1}ms \
             wait p50={:.1}ms render p50/p99={:.1}/{:.1}ms submit p50={:.1}ms",
            self.total_frames,
            self.missed_frames,
            self.missed_pct,
            self.skipped_ticks,
            self.fps,
            self.total_p50,
            self.total_p95,
            self.total_p99,
            self.wait_p50,
            self.render_p50,
            self.render_p99,
            self.submit_p50,
        )
    }
}
