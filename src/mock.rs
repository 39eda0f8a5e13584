//! Mock device and sink implementations for testing without hardware.

use crate::deliver::{DeliveryError, FrameSink, Receipt};
use crate::traits::{
    CameraDevice, CameraError, CaptureStream, DeviceCapabilities, Format, FourCC, Frame,
    FrameMetadata, Result,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Mock device for testing without hardware.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    frame_interval: Duration,
    frame_count: u32,
    fail_after: Option<u32>,
    fail_format: bool,
    releases: Arc<AtomicUsize>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(64, 48, FourCC::YUYV),
            frame_interval: Duration::ZERO,
            frame_count: 0,
            fail_after: None,
            fail_format: false,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the format for this mock device.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Produce one frame per `interval`, like a sensor running at a fixed
    /// rate. Zero (the default) hands out frames immediately.
    #[must_use]
    pub const fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Make every read after the first `reads` fail.
    #[must_use]
    pub const fn failing_after(mut self, reads: u32) -> Self {
        self.fail_after = Some(reads);
        self
    }

    /// Make `format()` fail, as a device that vanished after opening would.
    #[must_use]
    pub const fn failing_format(mut self) -> Self {
        self.fail_format = true;
        self
    }

    /// Number of frames read from this device so far.
    #[must_use]
    pub const fn frames_read(&self) -> u32 {
        self.frame_count
    }

    /// Counter incremented each time the device is dropped.
    #[must_use]
    pub fn release_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl CameraDevice for MockDevice {
    type Stream<'a> = MockStream<'a>;

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> Result<Format> {
        if self.fail_format {
            return Err(CameraError::DeviceOpenFailed("mock format query failed".to_owned()));
        }
        Ok(self.format.clone())
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        self.format = format.clone();
        Ok(self.format.clone())
    }

    fn create_stream(&mut self, buffer_count: u32) -> Result<Self::Stream<'_>> {
        Ok(MockStream {
            device: self,
            buffers: buffer_count.max(1),
            started: Instant::now(),
            filled: VecDeque::new(),
            last_dequeue: None,
        })
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// SMPTE color bars pattern.
    ColorBars,
    /// Horizontal gradient from dark to light.
    Gradient,
}

/// Mock capture stream for testing.
///
/// Models the driver queue of an mmap stream: while the caller holds a
/// frame, the other `buffers - 1` buffers keep filling at the frame
/// interval, and later reads return those older frames first.
pub struct MockStream<'a> {
    device: &'a mut MockDevice,
    buffers: u32,
    started: Instant,
    filled: VecDeque<Instant>,
    last_dequeue: Option<Instant>,
}

impl MockStream<'_> {
    /// Capture instants of the buffers that filled since the last read.
    fn collect_filled(&mut self) {
        let interval = self.device.frame_interval;
        let Some(last) = self.last_dequeue else {
            return;
        };
        if interval.is_zero() || !self.filled.is_empty() {
            return;
        }

        let ready = (last.elapsed().as_nanos() / interval.as_nanos())
            .min(u128::from(self.buffers - 1));
        let mut at = last;
        for _ in 0..ready {
            at += interval;
            self.filled.push_back(at);
        }
    }
}

impl CaptureStream for MockStream<'_> {
    fn next_frame(&mut self) -> Result<Frame> {
        let seq = self.device.frame_count;
        if self.device.fail_after.is_some_and(|limit| seq >= limit) {
            return Err(CameraError::StreamError("mock read failure".to_owned()));
        }
        self.device.frame_count += 1;

        self.collect_filled();
        let captured = self.filled.pop_front().unwrap_or_else(|| {
            thread::sleep(self.device.frame_interval);
            Instant::now()
        });
        self.last_dequeue = Some(Instant::now());

        let format = &self.device.format;
        Ok(Frame {
            data: generate_test_frame(format, TestPattern::ColorBars),
            metadata: FrameMetadata {
                sequence: seq,
                timestamp: captured.duration_since(self.started),
                bytes_used: format.size,
            },
        })
    }
}

/// Generate YUYV test frame data based on pattern.
#[allow(clippy::cast_possible_truncation)]
pub fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let (width, height) = (format.width, format.height);
    let mut data = Vec::with_capacity((width * height * 2) as usize);

    // 8 bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
    let bars: [(u8, u8, u8); 8] = [
        (235, 128, 128),
        (210, 16, 146),
        (170, 166, 16),
        (145, 54, 34),
        (106, 202, 222),
        (81, 90, 240),
        (41, 240, 110),
        (16, 128, 128),
    ];
    let bar_width = (width / 8).max(1);

    for _ in 0..height {
        for x in (0..width).step_by(2) {
            let (y, u, v) = match pattern {
                TestPattern::ColorBars => bars[(x / bar_width).min(7) as usize],
                TestPattern::Gradient => (((x * 255) / width) as u8, 128, 128),
            };
            data.extend_from_slice(&[y, u, y, v]);
        }
    }

    data
}

/// Sink that records every payload it receives.
#[derive(Default)]
pub struct RecordingSink {
    /// Payloads in delivery order.
    pub payloads: Vec<Vec<u8>>,
    /// Fail the deliveries at these zero-based attempt numbers.
    pub fail_on: Vec<usize>,
    attempts: usize,
}

impl RecordingSink {
    /// Sink that fails the given attempts.
    #[must_use]
    pub fn failing_on(attempts: &[usize]) -> Self {
        Self {
            fail_on: attempts.to_vec(),
            ..Self::default()
        }
    }

    /// Number of times `deliver` was called.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }
}

impl FrameSink for RecordingSink {
    fn deliver(&mut self, jpeg: &[u8]) -> std::result::Result<Receipt, DeliveryError> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.fail_on.contains(&attempt) {
            return Err(DeliveryError::Io {
                path: format!("recording-sink-{attempt}").into(),
                source: std::io::Error::other("injected failure"),
            });
        }
        self.payloads.push(jpeg.to_vec());
        Ok(Receipt::Saved(format!("frame-{attempt}.jpg").into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
    }

    #[test]
    fn test_mock_stream_capture() {
        let mut device = MockDevice::new();
        let mut stream = device.create_stream(4).expect("create_stream should succeed");

        let frame1 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame1.metadata.sequence, 0);
        assert_eq!(frame1.data.len(), 64 * 48 * 2);

        let frame2 = stream.next_frame().expect("next_frame should succeed");
        assert_eq!(frame2.metadata.sequence, 1);
    }

    #[test]
    fn test_mock_stream_failure_injection() {
        let mut device = MockDevice::new().failing_after(1);
        let mut stream = device.create_stream(1).expect("create_stream should succeed");

        assert!(stream.next_frame().is_ok());
        assert!(matches!(stream.next_frame(), Err(CameraError::StreamError(_))));
    }

    #[test]
    fn test_mock_stream_returns_queued_frames_first() {
        let interval = Duration::from_millis(5);
        let mut device = MockDevice::new().with_frame_interval(interval);
        let mut stream = device.create_stream(3).expect("create_stream should succeed");

        let first = stream.next_frame().expect("next_frame should succeed");
        thread::sleep(interval * 10);
        let queued = stream.next_frame().expect("next_frame should succeed");
        let _ = stream.next_frame().expect("next_frame should succeed");
        let fresh = stream.next_frame().expect("next_frame should succeed");

        // Two spare buffers filled during the pause, one interval apart.
        assert!(queued.metadata.timestamp - first.metadata.timestamp < interval * 3);
        assert!(fresh.metadata.timestamp - first.metadata.timestamp >= interval * 10);
    }

    #[test]
    fn test_mock_single_buffer_always_fresh() {
        let interval = Duration::from_millis(5);
        let mut device = MockDevice::new().with_frame_interval(interval);
        let mut stream = device.create_stream(1).expect("create_stream should succeed");

        let first = stream.next_frame().expect("next_frame should succeed");
        thread::sleep(interval * 10);
        let second = stream.next_frame().expect("next_frame should succeed");
        assert!(second.metadata.timestamp - first.metadata.timestamp >= interval * 10);
    }

    #[test]
    fn test_mock_format_failure_injection() {
        let device = MockDevice::new().failing_format();
        assert!(matches!(device.format(), Err(CameraError::DeviceOpenFailed(_))));
    }

    #[test]
    fn test_mock_release_counted_once() {
        let device = MockDevice::new();
        let releases = device.release_counter();
        drop(device);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_color_bars_first_bar_white() {
        let format = Format::new(640, 480, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::ColorBars);
        assert_eq!(data.len(), 640 * 480 * 2);
        assert_eq!(data[0], 235);
    }
}
