//! Loops that drive an [`XrViewer`](crate::XrViewer) the way a host would.

pub mod headless;
