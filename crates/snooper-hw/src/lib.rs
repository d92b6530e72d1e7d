//! snooper-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based streaming capture and the `FrameSource` seam the
//! watch loop consumes.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, PixelFormat};
pub use frame::{CaptureError, Frame, FrameSource};
