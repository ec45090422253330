use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::io::Reader as ImageReader;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, Limits};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_IMAGE_DIMENSION: u32 = 4096;
pub const MAX_IMAGE_ALLOC: u64 = 100 * 1024 * 1024;
pub const PREVIEW_MAX_DIMENSION: u32 = 320;
pub const PREVIEW_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image bytes empty")]
    EmptyInput,

    #[error("image size {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("image dimensions {width}x{height} exceed maximum of {max}x{max}")]
    DimensionsTooLarge { width: u32, height: u32, max: u32 },

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("failed to decode image: {0}")]
    Decode(String),
}

/// A validated, attached image: raw bytes plus an optional small JPEG
/// preview for the review step.
///
/// The raw bytes are authoritative everywhere gating is concerned; the
/// preview is cosmetic and its absence never blocks a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedPhoto {
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub preview_jpeg: Option<Vec<u8>>,
}

impl StagedPhoto {
    #[must_use]
    pub const fn has_preview(&self) -> bool {
        self.preview_jpeg.is_some()
    }

    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Validate picked bytes and derive a preview.
///
/// Corrupt or unreadable input yields an error, which the wizard converts
/// into "no image attached". A failed preview encode alone does not fail
/// the attach.
pub fn stage_photo(data: Vec<u8>) -> Result<StagedPhoto, MediaError> {
    if data.is_empty() {
        return Err(MediaError::EmptyInput);
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge {
            size: data.len(),
            max: MAX_IMAGE_BYTES,
        });
    }

    let format = image::guess_format(&data).map_err(|_| MediaError::UnsupportedFormat)?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits.max_alloc = Some(MAX_IMAGE_ALLOC);

    let mut reader = ImageReader::with_format(Cursor::new(&data), format);
    reader.limits(limits);

    let img = reader.decode().map_err(|e| MediaError::Decode(e.to_string()))?;
    let (width, height) = img.dimensions();

    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(MediaError::DimensionsTooLarge {
            width,
            height,
            max: MAX_IMAGE_DIMENSION,
        });
    }

    let preview_jpeg = match encode_preview(&img) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "preview derivation failed, keeping raw attachment");
            None
        }
    };

    Ok(StagedPhoto {
        data,
        mime_type: format.to_mime_type().to_string(),
        width,
        height,
        preview_jpeg,
    })
}

fn encode_preview(img: &DynamicImage) -> Result<Vec<u8>, MediaError> {
    let preview = img.thumbnail(PREVIEW_MAX_DIMENSION, PREVIEW_MAX_DIMENSION);
    let rgb = preview.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, PREVIEW_JPEG_QUALITY);
    encoder
        .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_png(width: u32, height: u32) -> Vec<u8> {
        use image::{ImageBuffer, Rgba};
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
            .unwrap();
        buffer
    }

    #[test]
    fn stage_rejects_empty_input() {
        assert!(matches!(stage_photo(vec![]), Err(MediaError::EmptyInput)));
    }

    #[test]
    fn stage_rejects_oversized_input() {
        let data = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(matches!(
            stage_photo(data),
            Err(MediaError::TooLarge { .. })
        ));
    }

    #[test]
    fn stage_rejects_garbage_bytes() {
        let result = stage_photo(vec![0x00, 0x01, 0x02, 0x03]);
        assert!(result.is_err());
    }

    #[test]
    fn stage_rejects_truncated_png() {
        let mut png = test_png(32, 32);
        png.truncate(png.len() / 2);
        assert!(matches!(stage_photo(png), Err(MediaError::Decode(_))));
    }

    #[test]
    fn stage_accepts_valid_png_and_derives_preview() {
        let png = test_png(64, 48);
        let staged = stage_photo(png.clone()).unwrap();

        assert_eq!(staged.data, png);
        assert_eq!(staged.mime_type, "image/png");
        assert_eq!((staged.width, staged.height), (64, 48));
        assert!(staged.has_preview());

        let preview = image::load_from_memory(staged.preview_jpeg.as_ref().unwrap()).unwrap();
        assert!(preview.width() <= PREVIEW_MAX_DIMENSION);
        assert!(preview.height() <= PREVIEW_MAX_DIMENSION);
    }

    #[test]
    fn preview_downscales_large_images() {
        let png = test_png(800, 600);
        let staged = stage_photo(png).unwrap();

        let preview = image::load_from_memory(staged.preview_jpeg.as_ref().unwrap()).unwrap();
        assert!(preview.width() <= PREVIEW_MAX_DIMENSION);
        assert!(preview.height() <= PREVIEW_MAX_DIMENSION);
    }

    proptest! {
        // Shrink the case count: every case encodes and decodes a PNG.
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn staged_dimensions_match_source(width in 1u32..128, height in 1u32..128) {
            let png = test_png(width, height);
            let staged = stage_photo(png).unwrap();
            prop_assert_eq!((staged.width, staged.height), (width, height));
        }

        #[test]
        fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            // Decode either succeeds or returns a typed error.
            let _ = stage_photo(data);
        }
    }
}
