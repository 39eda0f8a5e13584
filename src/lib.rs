//! Face-cam-capture: webcam frame capture for a face-recognition service.
//!
//! Frames are read from a V4L2 camera, encoded as JPEG, and either saved to
//! disk or uploaded to an HTTP endpoint. The camera sits behind the
//! [`CameraDevice`] trait so sessions can be driven by mock devices in tests.

pub mod config;
pub mod deliver;
pub mod device;
pub mod encode;
pub mod error;
pub mod interrupt;
pub mod session;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use config::{CaptureConfig, ConfigError, FailurePolicy};
pub use deliver::{DeliveryError, FileSink, FrameSink, HttpSink, Receipt};
pub use device::V4L2Device;
pub use error::Error;
pub use interrupt::stop_on_interrupt;
pub use session::{
    capture_once, CaptureSession, DeliveryAttempt, SnapshotOutcome, StopSignal, Termination,
};
pub use traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata,
};
