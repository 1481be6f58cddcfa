//! vigil-hw: camera capture for the liveness pipeline.
//!
//! V4L2 access through the `v4l` crate, grayscale frame conversion and the
//! [`FrameSource`] seam the daemon pulls frames through.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
pub use source::FrameSource;
