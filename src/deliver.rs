//! Frame delivery targets: local JPEG files and the face-recognition endpoint.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::debug;

/// Filename used when none is given on the command line.
pub const DEFAULT_FILENAME: &str = "image.jpg";
/// Multipart field carrying the frame.
pub const UPLOAD_FIELD: &str = "file";
/// Filename reported for uploaded frames.
pub const UPLOAD_FILENAME: &str = "frame.jpg";
/// Content type of uploaded frames.
pub const UPLOAD_MIME: &str = "image/jpeg";

/// Error type for delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Writing the file or creating its directory failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The request could not be sent or the response not read.
    #[error("upload failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("endpoint returned {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body text.
        body: String,
    },
    /// The response body was not JSON.
    #[error("malformed response body: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// What a successful delivery produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Receipt {
    /// The frame was written to this path.
    Saved(PathBuf),
    /// The frame was uploaded; this is the parsed response body.
    Uploaded(serde_json::Value),
}

impl std::fmt::Display for Receipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Saved(path) => write!(f, "Image saved at: {}", path.display()),
            Self::Uploaded(body) => write!(f, "{body}"),
        }
    }
}

/// A destination for encoded JPEG frames.
pub trait FrameSink {
    /// Deliver one encoded frame.
    fn deliver(&mut self, jpeg: &[u8]) -> Result<Receipt, DeliveryError>;
}

/// Writes each frame to a fixed path on disk.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Sink writing `filename`, placed under `directory` when one is given.
    pub fn new<P: AsRef<Path>>(directory: Option<&Path>, filename: P) -> Self {
        let path = match directory {
            Some(dir) => dir.join(filename),
            None => filename.as_ref().to_path_buf(),
        };
        Self { path }
    }

    /// Path frames are written to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for FileSink {
    fn deliver(&mut self, jpeg: &[u8]) -> Result<Receipt, DeliveryError> {
        let io_err = |source: std::io::Error| DeliveryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, jpeg).map_err(io_err)?;

        debug!(path = %self.path.display(), bytes = jpeg.len(), "frame written");
        Ok(Receipt::Saved(self.path.clone()))
    }
}

/// Uploads each frame as a multipart POST and parses the JSON reply.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: Url,
}

impl HttpSink {
    /// Build a sink posting to `endpoint` with the given timeouts.
    pub fn new(
        endpoint: Url,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// Endpoint frames are posted to.
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl FrameSink for HttpSink {
    fn deliver(&mut self, jpeg: &[u8]) -> Result<Receipt, DeliveryError> {
        let part = Part::bytes(jpeg.to_vec())
            .file_name(UPLOAD_FILENAME)
            .mime_str(UPLOAD_MIME)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        debug!(%status, bytes = jpeg.len(), "frame uploaded");

        if !status.is_success() {
            return Err(DeliveryError::Status { status, body });
        }

        Ok(Receipt::Uploaded(serde_json::from_str(&body)?))
    }
}
