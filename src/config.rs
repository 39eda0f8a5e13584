//! Capture configuration.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::encode::DEFAULT_JPEG_QUALITY;

/// Face-recognition endpoint frames are uploaded to by default.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/face-recognition/detect-frame";
/// Pause between polled captures.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Upper bound for a whole upload request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for establishing the upload connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the polling loop does after a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and keep polling.
    #[default]
    Skip,
    /// Stop polling.
    Abort,
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Endpoint is not a valid URL.
    #[error("invalid endpoint URL {url:?}: {reason}")]
    InvalidEndpoint {
        /// The rejected value.
        url: String,
        /// Parse failure.
        reason: String,
    },
    /// Endpoint uses a scheme other than http or https.
    #[error("endpoint must use http or https, got {0:?}")]
    UnsupportedScheme(String),
    /// A duration option was negative, zero where not allowed, or not finite.
    #[error("invalid {name}: {value}")]
    InvalidDuration {
        /// Option name.
        name: &'static str,
        /// The rejected value in seconds.
        value: f64,
    },
    /// JPEG quality outside 1..=100.
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),
}

/// Settings shared by the single-shot and polling captures.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Directory saved frames are written under; the current directory when `None`.
    pub output_directory: Option<PathBuf>,
    /// Face-recognition endpoint.
    pub endpoint_url: String,
    /// Pause between polled captures.
    pub poll_interval: Duration,
    /// Pause before a single-shot read so exposure and focus can settle.
    pub settle_delay: Duration,
    /// Upload request timeout.
    pub request_timeout: Duration,
    /// Upload connect timeout.
    pub connect_timeout: Duration,
    /// Camera index (`/dev/videoN`).
    pub device_index: u32,
    /// JPEG quality for re-encoded frames.
    pub jpeg_quality: u8,
    /// Polling behaviour on delivery failure.
    pub failure_policy: FailurePolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            endpoint_url: DEFAULT_ENDPOINT.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: Duration::ZERO,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            device_index: 0,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

impl CaptureConfig {
    /// Check every option, returning the parsed endpoint.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                name: "poll interval",
                value: 0.0,
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        self.endpoint()
    }

    /// Parse the endpoint URL.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.endpoint_url).map_err(|err| ConfigError::InvalidEndpoint {
            url: self.endpoint_url.clone(),
            reason: err.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Convert a user-supplied number of seconds into a `Duration`.
pub fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidDuration { name, value })
}
