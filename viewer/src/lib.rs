//! XR viewer core: OpenXR session/frame lifecycle and stereo composition
//! for a CAD host's scene graph.
//!
//! The host hands in a runtime, a GL device, two graphics contexts, a
//! scene renderer and a scene graph provider; [`viewer::XrViewer`] drives
//! them once per host timer tick. The `sim` module provides a fully
//! scripted runtime so the whole protocol can run without an HMD.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod input;
pub mod locomotion;
pub mod pose;
pub mod render;
pub mod scene;
pub mod sim;
pub mod viewer;
pub mod xr;

pub use error::XrError;
pub use viewer::XrViewer;

#[cfg(feature = "vr")]
pub use render::glow_device::GlowDevice;
#[cfg(feature = "vr")]
pub use xr::openxr_backend::OpenXrRuntime;
