//! Runtime bring-up, from extension negotiation to action spaces.
//!
//! Any failure tears down whatever was already created, in dependency
//! order, and returns the error. Nothing is handed back half-built.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::XrError;
use crate::xr::bindings::default_bindings;
use crate::xr::debug::DebugSink;
use crate::xr::resources::{needs_destroy_instance_workaround, XrResources};
use crate::xr::runtime::{
    ExtensionPlan, GraphicsBinding, HandleKind, RuntimeInfo, SwapchainDesc, ViewConfigView,
    XrRuntime,
};
use crate::xr::swapchain::SwapchainManager;

/// Everything the frame loop needs from a started runtime.
#[derive(Debug)]
pub struct XrSystem {
    pub runtime_info: RuntimeInfo,
    pub extensions: ExtensionPlan,
    pub views: Vec<ViewConfigView>,
    /// Full side-by-side target: (2 x eye width, eye height).
    pub render_size: (u32, u32),
    pub swapchain: SwapchainManager,
    pub resources: XrResources,
}

/// Render-target size for a stereo view configuration.
pub fn stereo_render_size(views: &[ViewConfigView]) -> Result<(u32, u32), XrError> {
    match views {
        [left, right] => {
            if left.recommended_height != right.recommended_height {
                return Err(XrError::ViewConfiguration(format!(
                    "eye heights differ: {} vs {}",
                    left.recommended_height, right.recommended_height
                )));
            }
            Ok((left.recommended_width * 2, left.recommended_height))
        }
        _ => Err(XrError::ViewConfiguration(format!(
            "expected 2 views, runtime reported {}",
            views.len()
        ))),
    }
}

/// `major.minor.patch` of a packed `XrVersion`.
pub fn format_version(version: u64) -> String {
    format!(
        "{}.{}.{}",
        version >> 48,
        (version >> 32) & 0xffff,
        version & 0xffff_ffff
    )
}

struct Created {
    runtime_info: RuntimeInfo,
    extensions: ExtensionPlan,
    views: Vec<ViewConfigView>,
    render_size: (u32, u32),
    images: Vec<u32>,
}

fn create_all<R: XrRuntime + ?Sized>(
    runtime: &mut R,
    binding: &GraphicsBinding,
    want_debug: bool,
    sink: Arc<dyn DebugSink>,
    resources: &mut XrResources,
) -> Result<Created, XrError> {
    let available = runtime.available_extensions()?;
    debug!("XR: runtime offers {} extensions", available.len());
    let extensions = ExtensionPlan::negotiate(&available, want_debug)?;
    if want_debug && !extensions.enable_debug {
        warn!("XR: debug utils requested but not offered by the runtime");
    }

    let sink = extensions.enable_debug.then_some(sink);
    let runtime_info = runtime.create_instance(&extensions, sink)?;
    resources.record(HandleKind::Instance);
    if extensions.enable_debug {
        resources.record(HandleKind::DebugMessenger);
    }
    info!(
        "XR: runtime {} {}",
        runtime_info.runtime_name,
        format_version(runtime_info.runtime_version)
    );
    if needs_destroy_instance_workaround(
        std::env::consts::OS,
        &runtime_info.runtime_name,
        runtime_info.runtime_version,
    ) {
        resources.set_skip_instance_destroy(true);
    }

    runtime.acquire_system()?;
    let views = runtime.view_configuration_views()?;
    let render_size = stereo_render_size(&views)?;
    let requirements = runtime.graphics_requirements()?;
    debug!(
        "XR: OpenGL {} to {}",
        format_version(requirements.min_api_version),
        format_version(requirements.max_api_version)
    );

    runtime.create_session(binding)?;
    resources.record(HandleKind::Session);

    runtime.create_reference_space()?;
    resources.record(HandleKind::ReferenceSpace);

    let desc = SwapchainDesc::stereo(render_size.0, render_size.1);
    let images = runtime.create_swapchain(&desc)?;
    resources.record(HandleKind::Swapchain);
    if images.is_empty() {
        return Err(XrError::Swapchain("runtime returned no swapchain images"));
    }
    info!(
        "XR: swapchain {}x{} with {} images",
        render_size.0,
        render_size.1,
        images.len()
    );

    // Action creation is one grouped call; a partial failure may leave
    // either handle group behind.
    resources.record(HandleKind::ActionSet);
    resources.record(HandleKind::ActionSpaces);
    runtime.create_actions(&default_bindings())?;

    Ok(Created {
        runtime_info,
        extensions,
        views,
        render_size,
        images,
    })
}

/// Bring the runtime up to the point where frames can be submitted.
pub fn bootstrap<R: XrRuntime + ?Sized>(
    runtime: &mut R,
    binding: &GraphicsBinding,
    want_debug: bool,
    sink: Arc<dyn DebugSink>,
) -> Result<XrSystem, XrError> {
    let mut resources = XrResources::new();
    match create_all(runtime, binding, want_debug, sink, &mut resources) {
        Ok(created) => {
            let (w, h) = created.render_size;
            Ok(XrSystem {
                runtime_info: created.runtime_info,
                extensions: created.extensions,
                views: created.views,
                render_size: created.render_size,
                swapchain: SwapchainManager::new(created.images, w, h),
                resources,
            })
        }
        Err(e) => {
            error!("XR: startup failed: {}", e);
            if let Err(te) = resources.teardown(runtime) {
                warn!("XR: cleanup after failed startup: {}", te);
            }
            Err(e)
        }
    }
}
