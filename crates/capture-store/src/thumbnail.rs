//! # Thumbnail Derivation
//!
//! [`Thumbnailer`] is a synchronous, CPU-bound capability; the image store
//! runs it on the blocking pool. [`ImageThumbnailer`] decodes with the
//! `image` crate, scales to fit within `max × max` preserving aspect
//! ratio (never upscaling), and re-encodes as PNG, JPEG, or GIF when the
//! source is one of those, else PNG.

use std::io::Cursor;

use capture_core::MimeType;
use image::{DynamicImage, ImageFormat};

use crate::error::ThumbnailError;

/// A derived thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub mime_type: MimeType,
}

pub trait Thumbnailer: Send + Sync {
    /// Derive a thumbnail no larger than `max` pixels on either edge.
    fn thumbnail(&self, bytes: &[u8], mime_type: &MimeType, max: u32)
        -> Result<Thumbnail, ThumbnailError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageThumbnailer;

impl Thumbnailer for ImageThumbnailer {
    fn thumbnail(
        &self,
        bytes: &[u8],
        _mime_type: &MimeType,
        max: u32,
    ) -> Result<Thumbnail, ThumbnailError> {
        let source_format = image::guess_format(bytes).ok();
        let img = image::load_from_memory(bytes).map_err(|e| ThumbnailError::Decode(e.to_string()))?;

        let scaled = if img.width() <= max && img.height() <= max {
            img
        } else {
            img.thumbnail(max, max)
        };

        let (format, mime, encodable) = match source_format {
            Some(ImageFormat::Jpeg) => (
                ImageFormat::Jpeg,
                "image/jpeg",
                DynamicImage::ImageRgb8(scaled.to_rgb8()),
            ),
            Some(ImageFormat::Gif) => (
                ImageFormat::Gif,
                "image/gif",
                DynamicImage::ImageRgba8(scaled.to_rgba8()),
            ),
            _ => (ImageFormat::Png, "image/png", scaled),
        };

        let mut out = Cursor::new(Vec::new());
        encodable
            .write_to(&mut out, format)
            .map_err(|e| ThumbnailError::Encode(e.to_string()))?;

        Ok(Thumbnail {
            bytes: out.into_inner(),
            mime_type: MimeType::from(mime),
        })
    }
}
