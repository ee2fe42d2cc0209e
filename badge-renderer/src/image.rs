//! Image source loading for picture elements and side backgrounds.
//!
//! Sources may be base64 or percent-encoded data URIs, `file://` URLs or
//! plain local paths. Remote `http(s)` sources are never fetched and are
//! reported as load failures. Every loaded picture is normalised to RGBA,
//! cropped, downsampled to the print resolution and re-embedded as a PNG data
//! URI so the SVG scene is self-contained.

use std::io::Cursor;

use badge_core::CropRect;
use base64::Engine;
use image::{DynamicImage, RgbaImage};

use crate::error::{RenderError, RenderResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Self::Png
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Self::WebP
        } else {
            Self::Unknown
        }
    }
}

/// Decode an image from raw bytes.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] for unrecognised or corrupt data.
pub fn load_image_from_bytes(data: &[u8]) -> RenderResult<RgbaImage> {
    if ImageFormat::from_magic_bytes(data) == ImageFormat::Unknown {
        return Err(RenderError::Resource(
            "Unrecognised image format (expected PNG, JPEG or WebP)".to_string(),
        ));
    }
    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;
    Ok(img.to_rgba8())
}

/// Decode an image from a data URI.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns an error if the data URI is malformed or the image cannot be decoded.
pub fn load_image_from_data_uri(uri: &str) -> RenderResult<RgbaImage> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Resource("Not a data URI".to_string()))?;
    let (metadata, encoded) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::Resource("Invalid data URI: missing comma".to_string()))?;

    let mime = metadata.split(';').next().unwrap_or_default();
    if !mime.is_empty() && ImageFormat::from_mime(mime) == ImageFormat::Unknown {
        return Err(RenderError::Resource(format!(
            "Unsupported data URI media type {mime}"
        )));
    }

    let bytes = if metadata.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| RenderError::Resource(format!("Failed to decode base64: {e}")))?
    } else {
        percent_decode(encoded)?
    };

    load_image_from_bytes(&bytes)
}

/// Percent-decoding of a data URI payload.
fn percent_decode(input: &str) -> RenderResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let byte = bytes
                .get(i + 1..i + 3)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| RenderError::Resource("Invalid URL encoding".to_string()))?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    Ok(result)
}

/// Load any supported image source.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] for empty or remote sources, unreadable
/// files and undecodable data.
pub fn load_image_source(src: &str) -> RenderResult<RgbaImage> {
    let src = src.trim();
    if src.is_empty() {
        return Err(RenderError::Resource("Empty image source".to_string()));
    }
    if src.starts_with("data:") {
        return load_image_from_data_uri(src);
    }
    let lower = src.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Err(RenderError::Resource(format!(
            "Remote image sources are not fetched: {src}"
        )));
    }
    let path = src.strip_prefix("file://").unwrap_or(src);
    let bytes = std::fs::read(path)
        .map_err(|e| RenderError::Resource(format!("Failed to read {path}: {e}")))?;
    load_image_from_bytes(&bytes)
}

/// Cut the normalised crop rectangle out of an image (at least one pixel).
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn crop_image(img: &RgbaImage, crop: &CropRect) -> RgbaImage {
    if img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    let (w, h) = (f64::from(img.width()), f64::from(img.height()));
    let x = ((crop.x * w).floor() as u32).min(img.width().saturating_sub(1));
    let y = ((crop.y * h).floor() as u32).min(img.height().saturating_sub(1));
    let cw = ((crop.width * w).round() as u32).clamp(1, img.width() - x);
    let ch = ((crop.height * h).round() as u32).clamp(1, img.height() - y);
    image::imageops::crop_imm(img, x, y, cw, ch).to_image()
}

/// Downsample an image to fit within max dimensions, preserving aspect ratio.
///
/// Returns `None` if the image is already small enough.
#[must_use]
pub fn resize_to_fit(img: &RgbaImage, max_width: u32, max_height: u32) -> Option<RgbaImage> {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return None;
    }

    let scale_x = f64::from(max_width.max(1)) / f64::from(width);
    let scale_y = f64::from(max_height.max(1)) / f64::from(height);
    let scale = scale_x.min(scale_y);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_width = ((f64::from(width) * scale).round() as u32).max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_height = ((f64::from(height) * scale).round() as u32).max(1);

    Some(image::imageops::resize(
        img,
        new_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    ))
}

/// Encode an image as a `data:image/png;base64,...` URI.
///
/// # Errors
///
/// Returns [`RenderError::Export`] if PNG encoding fails.
pub fn to_png_data_uri(img: RgbaImage) -> RenderResult<String> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());
    Ok(format!("data:image/png;base64,{encoded}"))
}

/// Load, crop and downsample a source for placement in a box of
/// `max_width` x `max_height` output pixels, returning an embeddable URI.
///
/// # Errors
///
/// Propagates load and encoding failures.
pub fn prepare_image(
    src: &str,
    crop: Option<&CropRect>,
    max_width: u32,
    max_height: u32,
) -> RenderResult<String> {
    let mut img = load_image_source(src)?;
    if let Some(crop) = crop {
        img = crop_image(&img, crop);
    }
    if let Some(smaller) = resize_to_fit(&img, max_width, max_height) {
        img = smaller;
    }
    to_png_data_uri(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn test_format_detection_from_mime() {
        assert_eq!(ImageFormat::from_mime("image/png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_mime("IMAGE/JPEG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_mime("image/webp"), ImageFormat::WebP);
        assert_eq!(ImageFormat::from_mime("text/plain"), ImageFormat::Unknown);
    }

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF8"), ImageFormat::Unknown);
    }

    #[test]
    fn test_data_uri_round_trip() {
        let uri = to_png_data_uri(checker(3, 2)).expect("encode");
        let img = load_image_from_data_uri(&uri).expect("decode");
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 0), &image::Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(load_image_from_data_uri("not a data uri").is_err());
        assert!(load_image_from_data_uri("data:image/png").is_err());
        assert!(load_image_from_data_uri("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(load_image_from_data_uri("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_remote_and_missing_sources_fail() {
        assert!(matches!(
            load_image_source("https://example.com/photo.png"),
            Err(RenderError::Resource(_))
        ));
        assert!(load_image_source("/definitely/not/here.png").is_err());
        assert!(load_image_source("   ").is_err());
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("photo.png");
        checker(4, 4).save(&path).expect("write png");
        let src = path.to_string_lossy().to_string();
        assert_eq!(load_image_source(&src).expect("load").dimensions(), (4, 4));
        let url = format!("file://{src}");
        assert_eq!(load_image_source(&url).expect("load").dimensions(), (4, 4));
    }

    #[test]
    fn test_crop_and_fit() {
        let img = checker(100, 50);
        let cropped = crop_image(
            &img,
            &CropRect {
                x: 0.5,
                y: 0.0,
                width: 0.5,
                height: 1.0,
            },
        );
        assert_eq!(cropped.dimensions(), (50, 50));

        let fitted = resize_to_fit(&img, 20, 20).expect("downsampled");
        assert_eq!(fitted.dimensions(), (20, 10));
        assert!(resize_to_fit(&img, 200, 200).is_none());
    }
}
