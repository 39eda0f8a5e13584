//! Capture sessions: device lifecycle, single-shot capture and polling.
//!
//! A [`CaptureSession`] owns the camera from the moment it is opened until
//! it is released. Release happens exactly once, either through
//! [`CaptureSession::release`] or when the session is dropped.
//!
//! Polling is exposed as [`DeliveryAttempts`], a lazy iterator that yields
//! one attempt per successful frame read. It ends on the first read
//! failure, when its [`StopSignal`] fires, or (with
//! [`FailurePolicy::Abort`]) after the first failed delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{CaptureConfig, FailurePolicy};
use crate::deliver::{FrameSink, Receipt};
use crate::encode::encode_jpeg;
use crate::error::Error;
use crate::traits::{CameraDevice, CameraError, CaptureStream, Format, FourCC, Frame};

/// Number of driver buffers requested for each stream.
///
/// After an idle wait the driver may hold up to `STREAM_BUFFERS - 1` frames
/// captured during that wait; polling reads past them.
const STREAM_BUFFERS: u32 = 2;

/// Granularity at which sleeps check for cancellation.
const STOP_CHECK_STEP: Duration = Duration::from_millis(50);

/// Cancellation flag shared between a polling loop and its controller.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// New signal in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at its next check.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on stop.
    ///
    /// Returns `true` if the full duration elapsed without a stop.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(STOP_CHECK_STEP));
        }
    }
}

/// Result of a single-shot capture that did not fail fatally.
#[derive(Debug)]
pub enum SnapshotOutcome {
    /// The frame was delivered.
    Delivered(Receipt),
    /// The frame could not be read; nothing was delivered.
    ReadFailed(CameraError),
}

/// One step of a polling loop.
#[derive(Debug)]
pub enum DeliveryAttempt {
    /// Frame delivered.
    Delivered {
        /// Zero-based attempt number.
        attempt: u64,
        /// Driver timestamp of the delivered frame.
        captured: Duration,
        /// What the sink produced.
        receipt: Receipt,
    },
    /// Frame read but could not be encoded or delivered.
    Failed {
        /// Zero-based attempt number.
        attempt: u64,
        /// Why the delivery failed.
        error: Error,
    },
}

/// Why a polling loop ended.
#[derive(Debug)]
pub enum Termination {
    /// A frame read failed.
    ReadFailed(CameraError),
    /// The stop signal fired.
    Cancelled,
    /// A delivery failed under [`FailurePolicy::Abort`].
    Aborted,
}

/// Exclusive owner of an open camera.
pub struct CaptureSession<D: CameraDevice> {
    device: Option<D>,
    format: Format,
    quality: u8,
}

impl<D: CameraDevice> CaptureSession<D> {
    /// Take ownership of an opened device and negotiate a deliverable format.
    ///
    /// On error the device is dropped, and with it released.
    pub fn open(mut device: D, quality: u8) -> Result<Self, CameraError> {
        let format = negotiate_format(&mut device)?;
        info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "capture format"
        );

        Ok(Self {
            device: Some(device),
            format,
            quality,
        })
    }

    /// Negotiated capture format.
    pub const fn format(&self) -> &Format {
        &self.format
    }

    /// Whether the device has been released.
    pub const fn is_released(&self) -> bool {
        self.device.is_none()
    }

    /// Capture one frame and hand it to `sink`.
    ///
    /// The stream runs for `settle_delay` before the frame is taken, so
    /// exposure and focus can adjust; frames read in that window are
    /// discarded and the first frame read after it is delivered. A failed
    /// read is reported through the outcome; encode and delivery failures
    /// are errors.
    pub fn snapshot<K>(
        &mut self,
        sink: &mut K,
        settle_delay: Duration,
    ) -> Result<SnapshotOutcome, Error>
    where
        K: FrameSink + ?Sized,
    {
        let device = self.device.as_mut().ok_or(CameraError::Released)?;
        let mut stream = device.create_stream(STREAM_BUFFERS)?;

        if !settle_delay.is_zero() {
            info!(?settle_delay, "preparing camera");
        }
        let deadline = Instant::now() + settle_delay;
        let mut discarded = 0u32;

        let frame = loop {
            let frame = match stream.next_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "failed to capture image");
                    return Ok(SnapshotOutcome::ReadFailed(err));
                }
            };
            if Instant::now() >= deadline {
                break frame;
            }
            discarded += 1;
        };
        debug!(
            sequence = frame.metadata.sequence,
            bytes = frame.data.len(),
            discarded,
            "frame read"
        );

        let jpeg = encode_jpeg(&frame, &self.format, self.quality)?;
        let receipt = sink.deliver(&jpeg)?;
        Ok(SnapshotOutcome::Delivered(receipt))
    }

    /// Start polling: capture a frame every `interval` and deliver each.
    ///
    /// The returned iterator is lazy and unbounded; nothing is read until it
    /// is advanced.
    pub fn poll<'a, K>(
        &'a mut self,
        sink: &'a mut K,
        interval: Duration,
        stop: StopSignal,
        policy: FailurePolicy,
    ) -> Result<DeliveryAttempts<'a, D::Stream<'a>, K>, Error>
    where
        K: FrameSink + ?Sized,
        D: 'a,
    {
        let device = self.device.as_mut().ok_or(CameraError::Released)?;
        let stream = device.create_stream(STREAM_BUFFERS)?;

        Ok(DeliveryAttempts {
            stream,
            sink,
            format: self.format.clone(),
            quality: self.quality,
            interval,
            stop,
            policy,
            attempts: 0,
            termination: None,
        })
    }

    /// Release the device. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(device) = self.device.take() {
            drop(device);
            info!("camera released");
        }
    }
}

impl<D: CameraDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open a session on `device`, deliver one frame to `sink`, then release.
///
/// Nothing reaches the sink unless the session opens and a frame is read.
pub fn capture_once<D, K>(
    device: D,
    sink: &mut K,
    config: &CaptureConfig,
) -> Result<SnapshotOutcome, Error>
where
    D: CameraDevice,
    K: FrameSink + ?Sized,
{
    let mut session = CaptureSession::open(device, config.jpeg_quality)?;
    let outcome = session.snapshot(sink, config.settle_delay);
    session.release();
    outcome
}

/// Keep the current format if it can be delivered, otherwise ask for YUYV
/// at the current resolution.
fn negotiate_format<D: CameraDevice>(device: &mut D) -> Result<Format, CameraError> {
    let current = device.format()?;
    if current.fourcc.is_deliverable() {
        return Ok(current);
    }

    debug!(fourcc = %current.fourcc, "requesting YUYV");
    let requested = Format::new(current.width, current.height, FourCC::YUYV);
    let actual = device.set_format(&requested)?;
    if actual.fourcc.is_deliverable() {
        Ok(actual)
    } else {
        Err(CameraError::FormatNotSupported(actual))
    }
}

/// Lazy, unbounded sequence of delivery attempts.
///
/// Restartable only by opening a new session.
pub struct DeliveryAttempts<'a, S, K: ?Sized> {
    stream: S,
    sink: &'a mut K,
    format: Format,
    quality: u8,
    interval: Duration,
    stop: StopSignal,
    policy: FailurePolicy,
    attempts: u64,
    termination: Option<Termination>,
}

impl<S, K: ?Sized> DeliveryAttempts<'_, S, K> {
    /// Why the sequence ended, once it has.
    pub const fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Number of frames read so far.
    pub const fn attempts(&self) -> u64 {
        self.attempts
    }

    fn finish(&mut self, termination: Termination) {
        info!(attempts = self.attempts, reason = ?termination, "polling stopped");
        self.termination = Some(termination);
    }
}

impl<S: CaptureStream, K: ?Sized> DeliveryAttempts<'_, S, K> {
    /// Read a frame captured after the interval wait.
    fn read_after_wait(&mut self) -> Result<Frame, CameraError> {
        for _ in 1..STREAM_BUFFERS {
            let stale = self.stream.next_frame()?;
            debug!(sequence = stale.metadata.sequence, "discarding queued frame");
        }
        self.stream.next_frame()
    }
}

impl<S, K> Iterator for DeliveryAttempts<'_, S, K>
where
    S: CaptureStream,
    K: FrameSink + ?Sized,
{
    type Item = DeliveryAttempt;

    fn next(&mut self) -> Option<Self::Item> {
        if self.termination.is_some() {
            return None;
        }
        let waited = self.attempts == 0 || self.stop.wait(self.interval);
        if !waited || self.stop.is_stopped() {
            self.finish(Termination::Cancelled);
            return None;
        }

        let read = if self.attempts == 0 {
            self.stream.next_frame()
        } else {
            self.read_after_wait()
        };
        let frame = match read {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "frame read failed");
                self.finish(Termination::ReadFailed(err));
                return None;
            }
        };
        let attempt = self.attempts;
        self.attempts += 1;
        debug!(attempt, sequence = frame.metadata.sequence, "frame read");

        let delivered = encode_jpeg(&frame, &self.format, self.quality)
            .map_err(Error::from)
            .and_then(|jpeg| self.sink.deliver(&jpeg).map_err(Error::from));

        match delivered {
            Ok(receipt) => Some(DeliveryAttempt::Delivered {
                attempt,
                captured: frame.metadata.timestamp,
                receipt,
            }),
            Err(error) => {
                warn!(attempt, error = %error, "delivery failed");
                if self.policy == FailurePolicy::Abort {
                    self.finish(Termination::Aborted);
                }
                Some(DeliveryAttempt::Failed { attempt, error })
            }
        }
    }
}
