//! Ordered teardown of runtime handles.

use tracing::{debug, error, warn};

use crate::error::XrError;
use crate::xr::runtime::{HandleKind, XrRuntime};

const STEAMVR_RUNTIME_NAME: &str = "SteamVR/OpenXR";
/// The one SteamVR build whose instance destroy does not hang on Linux.
const STEAMVR_FIXED_VERSION: u64 = 4294967296;

/// SteamVR on Linux hangs in xrDestroyInstance
/// (ValveSoftware/SteamVR-for-Linux#422, #479).
pub fn needs_destroy_instance_workaround(os: &str, runtime_name: &str, runtime_version: u64) -> bool {
    os == "linux" && runtime_name == STEAMVR_RUNTIME_NAME && runtime_version != STEAMVR_FIXED_VERSION
}

/// Handles created so far, destroyed dependents-first.
#[derive(Debug, Default)]
pub struct XrResources {
    created: Vec<HandleKind>,
    skip_instance_destroy: bool,
}

impl XrResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: HandleKind) {
        if !self.created.contains(&kind) {
            self.created.push(kind);
        }
    }

    pub fn contains(&self, kind: HandleKind) -> bool {
        self.created.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    pub fn set_skip_instance_destroy(&mut self, skip: bool) {
        self.skip_instance_destroy = skip;
    }

    pub fn skips_instance_destroy(&self) -> bool {
        self.skip_instance_destroy
    }

    /// Destroy everything recorded. Every destroy is attempted; the first
    /// failure is returned after the rest have run.
    pub fn teardown<R: XrRuntime + ?Sized>(&mut self, runtime: &mut R) -> Result<(), XrError> {
        let mut first_err = None;
        for kind in HandleKind::TEARDOWN_ORDER {
            if !self.created.contains(&kind) {
                continue;
            }
            if kind == HandleKind::Instance && self.skip_instance_destroy {
                warn!("XR: leaving instance alive, runtime hangs in xrDestroyInstance");
                continue;
            }
            match runtime.destroy(kind) {
                Ok(()) => debug!("XR: destroyed {}", kind.as_str()),
                Err(e) => {
                    error!("XR: destroying {} failed: {}", kind.as_str(), e);
                    first_err.get_or_insert(e);
                }
            }
        }
        self.created.clear();
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
