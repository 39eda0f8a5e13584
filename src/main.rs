//! Face-cam-capture binary.
//!
//! ```bash
//! # Save one frame as ./image.jpg
//! face-cam-capture snap
//!
//! # Save under a directory after letting the camera settle for 5 seconds
//! face-cam-capture snap student.jpg --dir images --settle 5
//!
//! # Upload a frame every 2 seconds to the face-recognition service
//! face-cam-capture watch --endpoint http://localhost:3000/face-recognition/detect-frame
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use face_cam_capture::config::{seconds, DEFAULT_ENDPOINT};
use face_cam_capture::deliver::DEFAULT_FILENAME;
use face_cam_capture::error::{EXIT_DELIVERY_FAILED, EXIT_OK};
use face_cam_capture::{
    capture_once, stop_on_interrupt, CaptureConfig, CaptureSession, DeliveryAttempt, Error,
    FailurePolicy, FileSink, HttpSink, SnapshotOutcome, StopSignal, Termination, V4L2Device,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "face-cam-capture")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture one frame and save it as a JPEG file
    Snap {
        /// Output filename
        #[arg(default_value = DEFAULT_FILENAME)]
        filename: PathBuf,

        /// Directory to write into (created if missing)
        #[arg(short, long, env = "FACECAM_OUTPUT_DIR")]
        dir: Option<PathBuf>,

        /// Seconds to wait before reading, so exposure and focus can settle
        #[arg(long, env = "FACECAM_SETTLE_SECS", default_value_t = 0.0)]
        settle: f64,
    },
    /// Capture frames periodically and upload each one
    Watch {
        /// Face-recognition endpoint
        #[arg(long, env = "FACECAM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Seconds between captures
        #[arg(long, env = "FACECAM_INTERVAL_SECS", default_value_t = 2.0)]
        interval: f64,

        /// Upload request timeout in seconds
        #[arg(long, env = "FACECAM_TIMEOUT_SECS", default_value_t = 30.0)]
        timeout: f64,

        /// Stop at the first failed upload instead of skipping it
        #[arg(long)]
        abort_on_error: bool,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<usize>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("face_cam_capture=info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<u8, Error> {
    match cli.command {
        Command::Snap {
            filename,
            dir,
            settle,
        } => {
            let config = CaptureConfig {
                output_directory: dir,
                settle_delay: seconds("settle delay", settle)?,
                ..CaptureConfig::default()
            };
            config.validate()?;
            snap(&config, filename)
        }
        Command::Watch {
            endpoint,
            interval,
            timeout,
            abort_on_error,
            max_frames,
        } => {
            let config = CaptureConfig {
                endpoint_url: endpoint,
                poll_interval: seconds("poll interval", interval)?,
                request_timeout: seconds("request timeout", timeout)?,
                failure_policy: if abort_on_error {
                    FailurePolicy::Abort
                } else {
                    FailurePolicy::Skip
                },
                ..CaptureConfig::default()
            };
            watch(&config, max_frames)
        }
    }
}

fn snap(config: &CaptureConfig, filename: PathBuf) -> Result<u8, Error> {
    let mut sink = FileSink::new(config.output_directory.as_deref(), filename);
    let device = V4L2Device::open(config.device_index)?;

    match capture_once(device, &mut sink, config)? {
        SnapshotOutcome::Delivered(receipt) => println!("{receipt}"),
        SnapshotOutcome::ReadFailed(err) => println!("Failed to capture image: {err}"),
    }
    Ok(EXIT_OK)
}

fn watch(config: &CaptureConfig, max_frames: Option<usize>) -> Result<u8, Error> {
    let endpoint = config.validate()?;
    let mut sink = HttpSink::new(endpoint, config.connect_timeout, config.request_timeout)?;
    let device = V4L2Device::open(config.device_index)?;
    let mut session = CaptureSession::open(device, config.jpeg_quality)?;

    let stop = StopSignal::new();
    if let Err(err) = stop_on_interrupt(stop.clone()) {
        warn!(error = %err, "Ctrl-C handler not installed");
    }
    info!(endpoint = %sink.endpoint(), interval = ?config.poll_interval, "polling");

    let mut attempts =
        session.poll(&mut sink, config.poll_interval, stop, config.failure_policy)?;

    let limit = max_frames.unwrap_or(usize::MAX);
    for attempt in attempts.by_ref().take(limit) {
        match attempt {
            DeliveryAttempt::Delivered { receipt, .. } => println!("{receipt}"),
            DeliveryAttempt::Failed { attempt, error } => {
                eprintln!("Upload {attempt} failed: {error}");
            }
        }
    }

    let code = match attempts.termination() {
        Some(Termination::Aborted) => EXIT_DELIVERY_FAILED,
        Some(Termination::ReadFailed(err)) => {
            println!("Failed to capture image: {err}");
            EXIT_OK
        }
        Some(Termination::Cancelled) | None => EXIT_OK,
    };
    drop(attempts);
    session.release();

    Ok(code)
}
