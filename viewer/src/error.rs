//! Error taxonomy for the viewer core.
//!
//! Runtime failures carry the name of the call that failed so the tick
//! loop can decide between "skip this tick" and "tear the viewer down".

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the XR core.
#[derive(Error, Debug)]
pub enum XrError {
    /// A runtime call returned a failure code.
    #[error("XR call {call} failed: {code}")]
    Runtime { call: RuntimeCall, code: String },

    /// The runtime does not offer an extension the viewer cannot work without.
    #[error("required extension {0} is not available")]
    MissingExtension(&'static str),

    /// The HMD view configuration is not a usable stereo pair.
    #[error("unsupported view configuration: {0}")]
    ViewConfiguration(String),

    /// A GL object could not be created or is incomplete.
    #[error("graphics error: {0}")]
    Graphics(String),

    /// A graphics context could not be made current.
    #[error("could not make {0} context current")]
    Context(&'static str),

    /// Acquire/release ordering on the swapchain was violated.
    #[error("swapchain misuse: {0}")]
    Swapchain(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Runtime entry points, named after the OpenXR functions they wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    EnumerateExtensions,
    CreateInstance,
    GetSystem,
    EnumerateViews,
    GraphicsRequirements,
    CreateSession,
    CreateReferenceSpace,
    CreateSwapchain,
    CreateActions,
    PollEvent,
    BeginSession,
    EndSession,
    WaitFrame,
    BeginFrame,
    LocateViews,
    SyncActions,
    LocateSpace,
    GetActionState,
    AcquireImage,
    WaitImage,
    ReleaseImage,
    EndFrame,
    Destroy,
}

impl RuntimeCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnumerateExtensions => "xrEnumerateInstanceExtensionProperties",
            Self::CreateInstance => "xrCreateInstance",
            Self::GetSystem => "xrGetSystem",
            Self::EnumerateViews => "xrEnumerateViewConfigurationViews",
            Self::GraphicsRequirements => "xrGetOpenGLGraphicsRequirementsKHR",
            Self::CreateSession => "xrCreateSession",
            Self::CreateReferenceSpace => "xrCreateReferenceSpace",
            Self::CreateSwapchain => "xrCreateSwapchain",
            Self::CreateActions => "xrCreateAction",
            Self::PollEvent => "xrPollEvent",
            Self::BeginSession => "xrBeginSession",
            Self::EndSession => "xrEndSession",
            Self::WaitFrame => "xrWaitFrame",
            Self::BeginFrame => "xrBeginFrame",
            Self::LocateViews => "xrLocateViews",
            Self::SyncActions => "xrSyncActions",
            Self::LocateSpace => "xrLocateSpace",
            Self::GetActionState => "xrGetActionStateFloat",
            Self::AcquireImage => "xrAcquireSwapchainImage",
            Self::WaitImage => "xrWaitSwapchainImage",
            Self::ReleaseImage => "xrReleaseSwapchainImage",
            Self::EndFrame => "xrEndFrame",
            Self::Destroy => "xrDestroy*",
        }
    }
}

impl std::fmt::Display for RuntimeCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl XrError {
    /// Shorthand for a runtime failure.
    pub fn runtime(call: RuntimeCall, code: impl Into<String>) -> Self {
        Self::Runtime {
            call,
            code: code.into(),
        }
    }

    /// Failures that only cost the current tick: the runtime was not ready
    /// to hand out a frame.
    pub fn is_recoverable_per_tick(&self) -> bool {
        matches!(
            self,
            Self::Runtime {
                call: RuntimeCall::WaitFrame | RuntimeCall::BeginFrame,
                ..
            }
        )
    }

    /// The call that produced this error, if it came from the runtime.
    pub fn call(&self) -> Option<RuntimeCall> {
        match self {
            Self::Runtime { call, .. } => Some(*call),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_and_begin_frame_are_recoverable() {
        assert!(XrError::runtime(RuntimeCall::WaitFrame, "XR_TIMEOUT_EXPIRED").is_recoverable_per_tick());
        assert!(XrError::runtime(RuntimeCall::BeginFrame, "XR_ERROR_CALL_ORDER_INVALID")
            .is_recoverable_per_tick());
    }

    #[test]
    fn test_end_frame_is_fatal() {
        let err = XrError::runtime(RuntimeCall::EndFrame, "XR_ERROR_SESSION_LOST");
        assert!(!err.is_recoverable_per_tick());
        assert_eq!(err.call(), Some(RuntimeCall::EndFrame));
    }

    #[test]
    fn test_display_names_the_call() {
        let err = XrError::runtime(RuntimeCall::BeginSession, "XR_ERROR_SESSION_NOT_READY");
        assert_eq!(
            err.to_string(),
            "XR call xrBeginSession failed: XR_ERROR_SESSION_NOT_READY"
        );
    }
}
