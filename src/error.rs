//! Crate-level error and process exit codes.

use thiserror::Error;

use crate::config::ConfigError;
use crate::deliver::DeliveryError;
use crate::traits::CameraError;

/// Capture succeeded, or a frame read failed and was reported.
pub const EXIT_OK: u8 = 0;
/// The camera could not be opened or set up.
pub const EXIT_CAMERA_UNAVAILABLE: u8 = 1;
/// Invalid command line or configuration (matches clap's usage error code).
pub const EXIT_USAGE: u8 = 2;
/// The frame could not be encoded, saved or uploaded.
pub const EXIT_DELIVERY_FAILED: u8 = 3;

/// Any failure of a capture run.
#[derive(Debug, Error)]
pub enum Error {
    /// Camera failure.
    #[error(transparent)]
    Camera(#[from] CameraError),
    /// Delivery failure.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Process exit code for this error.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Camera(CameraError::Encode(_)) | Self::Delivery(_) => EXIT_DELIVERY_FAILED,
            Self::Camera(_) => EXIT_CAMERA_UNAVAILABLE,
            Self::Config(_) => EXIT_USAGE,
        }
    }
}
