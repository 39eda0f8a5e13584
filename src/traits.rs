//! Core traits and types for the camera abstraction.

use std::time::Duration;

use thiserror::Error;

/// Pixel format representation (e.g., YUYV, MJPG, RGB3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");

    /// Whether frames in this format can be turned into a JPEG.
    #[must_use]
    pub fn is_deliverable(self) -> bool {
        self == Self::YUYV || self == Self::MJPG || self == Self::RGB3
    }

    /// Bytes per pixel for packed formats, `None` for compressed ones.
    #[must_use]
    pub fn bytes_per_pixel(self) -> Option<u32> {
        if self == Self::YUYV {
            Some(2)
        } else if self == Self::RGB3 {
            Some(3)
        } else {
            None
        }
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride). Zero for compressed formats.
    pub stride: u32,
    /// Total frame size in bytes (upper bound for compressed formats).
    pub size: u32,
}

impl Format {
    /// Create a tightly packed format specification.
    #[must_use]
    pub fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let (stride, size) = fourcc.bytes_per_pixel().map_or_else(
            || (0, width * height * 2),
            |bpp| (width * bpp, width * bpp * height),
        );
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame data.
    pub data: Vec<u8>,
    /// Frame metadata.
    pub metadata: FrameMetadata,
}

/// Convert YUV values to RGB using the ITU-R BT.601 formula.
///
/// The result is clamped to the 0-255 range.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub(crate) fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = f32::from(y);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.402f32.mul_add(v_f, y_f);
    let g = 0.714_14f32.mul_add(-v_f, 0.344_14f32.mul_add(-u_f, y_f));
    let b = 1.772f32.mul_add(u_f, y_f);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let clamp = |val: f32| -> u8 { val.clamp(0.0, 255.0) as u8 };

    (clamp(r), clamp(g), clamp(b))
}

/// Error type for camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Device with given index was not found.
    #[error("Device {0} not found")]
    DeviceNotFound(u32),
    /// Failed to open device.
    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// Requested format is not supported.
    #[error("Format not supported: {} {}x{}", .0.fourcc, .0.width, .0.height)]
    FormatNotSupported(Format),
    /// Error during streaming operation.
    #[error("Stream error: {0}")]
    StreamError(String),
    /// Frame could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
    /// The device has already been released.
    #[error("Device already released")]
    Released,
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Abstraction over camera device operations.
pub trait CameraDevice {
    /// The stream type returned by `create_stream`.
    type Stream<'a>: CaptureStream
    where
        Self: 'a;

    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Get current format.
    fn format(&self) -> Result<Format>;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// Create a capture stream with the specified number of buffers.
    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>>;
}

/// Abstraction over capture stream operations.
pub trait CaptureStream {
    /// Capture the next frame from the stream.
    fn next_frame(&mut self) -> Result<Frame>;
}
