//! OpenXR session and frame protocol.

pub mod bindings;
pub mod bootstrap;
pub mod debug;
pub mod frame_cycle;
pub mod frame_stats;
pub mod resources;
pub mod runtime;
pub mod session;
pub mod swapchain;

#[cfg(feature = "vr")]
pub mod openxr_backend;

pub use frame_cycle::{FrameCycle, FrameOutcome, SkipReason};
pub use runtime::{SessionState, XrRuntime};
pub use session::SessionStateMachine;
