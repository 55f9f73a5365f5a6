//! xr-viewer: runs the viewer core against the simulated OpenXR runtime.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use xr_viewer::backend::headless::{self, HeadlessConfig};
use xr_viewer::config::{MemoryPreferences, PreferencesStore, TomlPreferences};

#[derive(Parser, Debug)]
#[command(name = "xr-viewer", version, about = "Headless OpenXR stereo viewer simulation")]
struct Cli {
    /// Number of host ticks to run; 0 runs until SIGINT/SIGTERM
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Preferences file (TOML)
    #[arg(long)]
    prefs: Option<PathBuf>,

    /// Enable the desktop mirror
    #[arg(long)]
    mirror: bool,

    /// Simulated should-render cadence: render every Nth frame, 0 never
    #[arg(long, default_value_t = 1)]
    should_render_every: u64,

    /// Host timer period in milliseconds
    #[arg(long, default_value_t = 11)]
    tick_ms: u64,

    /// Mirror surface size, WxH
    #[arg(long, default_value = "1280x720")]
    surface: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xr_viewer=info".into()),
        )
        .init();

    info!("xr-viewer v{} starting", env!("CARGO_PKG_VERSION"));

    let store: Box<dyn PreferencesStore> = match &cli.prefs {
        Some(path) => Box::new(
            TomlPreferences::load(path)
                .with_context(|| format!("loading preferences from {}", path.display()))?,
        ),
        None => Box::new(MemoryPreferences::new()),
    };
    let surface = HeadlessConfig::parse_resolution(&cli.surface)
        .with_context(|| format!("invalid surface size {:?}, expected WxH", cli.surface))?;

    let config = HeadlessConfig {
        frames: (cli.frames > 0).then_some(cli.frames),
        tick_ms: cli.tick_ms,
        should_render_every: cli.should_render_every,
        mirror: cli.mirror,
        surface,
    };
    let summary = headless::run(config, store.as_ref())?;
    info!("XR: {}", summary);
    Ok(())
}
