//! Image validation helpers.
//!
//! `validate_jpeg` guards MJPG passthrough and checks delivered files. The
//! colour-bar check verifies decoded output against the SMPTE pattern that
//! the mock device and the vivid virtual camera produce.

use std::io::Cursor;

use image::{ImageReader, RgbImage};

use crate::traits::{CameraError, Result};

/// JPEG start-of-image marker.
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Expected RGB values for SMPTE color bars (8 bars).
///
/// Colors in order: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
const SMPTE_COLOR_BARS: [(u8, u8, u8); 8] = [
    (235, 235, 235), // White
    (235, 235, 11),  // Yellow
    (12, 236, 237),  // Cyan
    (13, 237, 13),   // Green
    (237, 13, 237),  // Magenta
    (238, 14, 13),   // Red
    (15, 15, 239),   // Blue
    (16, 16, 16),    // Black
];

/// Tolerance for RGB color matching (YUV->RGB rounding plus JPEG loss).
const COLOR_TOLERANCE: u8 = 20;

/// Check that `bytes` hold a readable JPEG header.
///
/// Returns the image dimensions on success.
pub fn validate_jpeg(bytes: &[u8]) -> Result<(u32, u32)> {
    if !bytes.starts_with(&JPEG_SOI) {
        return Err(CameraError::Encode(
            "missing JPEG start-of-image marker".to_owned(),
        ));
    }

    let reader = ImageReader::with_format(Cursor::new(bytes), image::ImageFormat::Jpeg);
    reader
        .into_dimensions()
        .map_err(|err| CameraError::Encode(format!("invalid JPEG header: {err}")))
}

/// Validates that a decoded image contains the SMPTE color bar pattern.
///
/// Samples the centre of each of the 8 vertical stripes on the middle row.
pub fn validate_color_bars(image: &RgbImage) -> Result<()> {
    let (width, height) = image.dimensions();
    let bar_width = width / 8;
    let center_y = height / 2;

    for (bar_idx, expected_rgb) in (0u32..).zip(SMPTE_COLOR_BARS.iter()) {
        let sample_x = bar_idx * bar_width + bar_width / 2;
        let actual_rgb = image
            .get_pixel_checked(sample_x, center_y)
            .map(|p| (p.0[0], p.0[1], p.0[2]))
            .ok_or_else(|| {
                CameraError::StreamError(format!(
                    "Failed to get pixel at ({sample_x}, {center_y})"
                ))
            })?;

        if !colors_match(actual_rgb, *expected_rgb, COLOR_TOLERANCE) {
            return Err(CameraError::StreamError(format!(
                "Color bar {bar_idx} mismatch at ({sample_x}, {center_y}): \
                 expected RGB{expected_rgb:?}, got RGB{actual_rgb:?}"
            )));
        }
    }

    Ok(())
}

fn colors_match(actual: (u8, u8, u8), expected: (u8, u8, u8), tolerance: u8) -> bool {
    actual.0.abs_diff(expected.0) <= tolerance
        && actual.1.abs_diff(expected.1) <= tolerance
        && actual.2.abs_diff(expected.2) <= tolerance
}
