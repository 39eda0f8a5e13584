//! JPEG encoding of captured frames.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::traits::{yuv_to_rgb, CameraError, Format, FourCC, Frame, Result};
use crate::validation::validate_jpeg;

/// Default JPEG quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encode a frame in the given format as a JPEG image.
///
/// MJPG frames are validated and passed through without re-encoding.
pub fn encode_jpeg(frame: &Frame, format: &Format, quality: u8) -> Result<Vec<u8>> {
    let image = match format.fourcc {
        FourCC::MJPG => {
            validate_jpeg(&frame.data)?;
            return Ok(frame.data.clone());
        }
        FourCC::YUYV => yuyv_to_rgb(frame, format)?,
        FourCC::RGB3 => rgb3_to_rgb(frame, format)?,
        _ => return Err(CameraError::FormatNotSupported(format.clone())),
    };

    let mut out = Vec::with_capacity(image.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&image)
        .map_err(|err| CameraError::Encode(err.to_string()))?;

    Ok(out)
}

/// Row stride to use for a packed format, falling back to the tight stride
/// when the driver reports zero.
fn row_stride(format: &Format, bpp: usize) -> usize {
    let tight = format.width as usize * bpp;
    (format.stride as usize).max(tight)
}

fn row<'a>(frame: &'a Frame, format: &Format, y: u32, bpp: usize) -> Result<&'a [u8]> {
    let start = y as usize * row_stride(format, bpp);
    let len = format.width as usize * bpp;
    frame.data.get(start..start + len).ok_or_else(|| {
        CameraError::Encode(format!(
            "frame buffer too short: {} bytes for {}x{} {}",
            frame.data.len(),
            format.width,
            format.height,
            format.fourcc
        ))
    })
}

fn yuyv_to_rgb(frame: &Frame, format: &Format) -> Result<RgbImage> {
    let mut rgb = Vec::with_capacity(format.width as usize * format.height as usize * 3);

    for y in 0..format.height {
        for quad in row(frame, format, y, 2)?.chunks_exact(4) {
            if let [y0, u, y1, v] = *quad {
                let (r, g, b) = yuv_to_rgb(y0, u, v);
                rgb.extend_from_slice(&[r, g, b]);
                let (r, g, b) = yuv_to_rgb(y1, u, v);
                rgb.extend_from_slice(&[r, g, b]);
            }
        }
    }

    to_image(format, rgb)
}

fn rgb3_to_rgb(frame: &Frame, format: &Format) -> Result<RgbImage> {
    let mut rgb = Vec::with_capacity(format.width as usize * format.height as usize * 3);
    for y in 0..format.height {
        rgb.extend_from_slice(row(frame, format, y, 3)?);
    }

    to_image(format, rgb)
}

fn to_image(format: &Format, rgb: Vec<u8>) -> Result<RgbImage> {
    RgbImage::from_raw(format.width, format.height, rgb).ok_or_else(|| {
        CameraError::Encode(format!(
            "odd width {} cannot be unpacked from {}",
            format.width, format.fourcc
        ))
    })
}
