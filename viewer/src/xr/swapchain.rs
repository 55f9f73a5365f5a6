//! Compositor-owned render targets.
//!
//! At most one image is held at a time, and never across ticks:
//! acquire -> wait -> render -> release.

use tracing::{trace, warn};

use crate::error::XrError;
use crate::xr::runtime::XrRuntime;

/// An acquired swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    pub index: u32,
    /// GL texture name backing the image.
    pub texture: u32,
}

#[derive(Debug)]
pub struct SwapchainManager {
    images: Vec<u32>,
    width: u32,
    height: u32,
    acquired: Option<SwapchainImage>,
}

impl SwapchainManager {
    pub fn new(images: Vec<u32>, width: u32, height: u32) -> Self {
        Self {
            images,
            width,
            height,
            acquired: None,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn acquired(&self) -> Option<SwapchainImage> {
        self.acquired
    }

    /// Acquire the next image and wait until the compositor is done with it.
    pub fn acquire_and_wait<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        timeout_ns: i64,
    ) -> Result<SwapchainImage, XrError> {
        if self.acquired.is_some() {
            return Err(XrError::Swapchain("acquire while an image is still held"));
        }
        let index = runtime.acquire_image()?;
        let texture = *self
            .images
            .get(index as usize)
            .ok_or(XrError::Swapchain("runtime returned an out-of-range image index"))?;
        let image = SwapchainImage { index, texture };
        self.acquired = Some(image);
        runtime.wait_image(timeout_ns)?;
        trace!("XR: acquired swapchain image {}", index);
        Ok(image)
    }

    /// Hand the held image back to the compositor.
    pub fn release<R: XrRuntime + ?Sized>(&mut self, runtime: &mut R) -> Result<(), XrError> {
        let image = self
            .acquired
            .take()
            .ok_or(XrError::Swapchain("release without an acquired image"))?;
        runtime.release_image()?;
        trace!("XR: released swapchain image {}", image.index);
        Ok(())
    }

    /// Run `render` against a freshly acquired image, releasing it on
    /// every exit path. A render error wins over a release error.
    pub fn with_image<R, T, F>(
        &mut self,
        runtime: &mut R,
        timeout_ns: i64,
        render: F,
    ) -> Result<T, XrError>
    where
        R: XrRuntime + ?Sized,
        F: FnOnce(SwapchainImage) -> Result<T, XrError>,
    {
        let image = self.acquire_and_wait(runtime, timeout_ns)?;
        let rendered = render(image);
        let released = self.release(runtime);
        let value = rendered?;
        released?;
        Ok(value)
    }

    /// Release an image left held by an aborted tick. Used at teardown.
    pub fn release_dangling<R: XrRuntime + ?Sized>(&mut self, runtime: &mut R) {
        if let Some(image) = self.acquired {
            warn!("XR: releasing dangling swapchain image {}", image.index);
            if let Err(e) = self.release(runtime) {
                warn!("XR: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeCall;
    use crate::sim::{CallLog, SimRuntime};

    fn setup() -> (SwapchainManager, SimRuntime, CallLog) {
        let log = CallLog::new();
        let rt = SimRuntime::new(log.clone());
        (SwapchainManager::new(vec![11, 12, 13], 64, 32), rt, log)
    }

    #[test]
    fn test_acquire_then_release() {
        let (mut sc, mut rt, log) = setup();
        let image = sc.acquire_and_wait(&mut rt, 1000).unwrap();
        assert_eq!(image, SwapchainImage { index: 0, texture: 11 });
        assert_eq!(sc.acquired(), Some(image));
        sc.release(&mut rt).unwrap();
        assert_eq!(sc.acquired(), None);
        assert_eq!(
            log.names(),
            vec![
                "xrAcquireSwapchainImage",
                "xrWaitSwapchainImage",
                "xrReleaseSwapchainImage"
            ]
        );
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let (mut sc, mut rt, log) = setup();
        sc.acquire_and_wait(&mut rt, 1000).unwrap();
        assert!(matches!(
            sc.acquire_and_wait(&mut rt, 1000),
            Err(XrError::Swapchain(_))
        ));
        assert_eq!(log.count("xrAcquireSwapchainImage"), 1);
    }

    #[test]
    fn test_release_without_acquire_is_rejected() {
        let (mut sc, mut rt, log) = setup();
        assert!(matches!(sc.release(&mut rt), Err(XrError::Swapchain(_))));
        assert!(log.is_empty());
    }

    #[test]
    fn test_with_image_releases_on_error() {
        let (mut sc, mut rt, log) = setup();
        let result: Result<(), _> =
            sc.with_image(&mut rt, 1000, |_| Err(XrError::Graphics("boom".into())));
        assert!(matches!(result, Err(XrError::Graphics(_))));
        assert_eq!(log.count("xrReleaseSwapchainImage"), 1);
        assert_eq!(sc.acquired(), None);
    }

    #[test]
    fn test_images_rotate() {
        let (mut sc, mut rt, _log) = setup();
        let seen: Vec<u32> = (0..4)
            .map(|_| sc.with_image(&mut rt, 1000, |img| Ok(img.texture)).unwrap())
            .collect();
        assert_eq!(seen, vec![11, 12, 13, 11]);
    }

    #[test]
    fn test_wait_failure_leaves_image_dangling() {
        let (mut sc, mut rt, log) = setup();
        rt.fail_once(RuntimeCall::WaitImage, "XR_TIMEOUT_EXPIRED");
        assert!(sc.acquire_and_wait(&mut rt, 10).is_err());
        assert!(sc.acquired().is_some());
        sc.release_dangling(&mut rt);
        assert_eq!(sc.acquired(), None);
        assert_eq!(log.count("xrReleaseSwapchainImage"), 1);
    }
}
