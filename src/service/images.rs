//! Portfolio image processing
//!
//! Uploads are decoded, scaled to a fixed height, re-encoded in their
//! original format, and handed to the image store. JPEG uploads keep their
//! EXIF segment.

use std::io::Cursor;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat, ImageOutputFormat};

use crate::data::EntityId;
use crate::error::AppError;
use crate::metrics::IMAGE_UPLOADS_TOTAL;
use crate::storage::ImageStore;

/// Largest accepted upload body
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// Height of every stored image, in pixels
pub const RESIZE_HEIGHT: u32 = 512;
/// Widest stored image; keeps very flat images from being blown up
pub const MAX_RESIZED_WIDTH: u32 = 16 * RESIZE_HEIGHT;
const JPEG_QUALITY: u8 = 100;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Format named by a `Content-Type` header; parameters are ignored.
    pub fn from_content_type(value: &str) -> Option<Self> {
        let mime = value.split(';').next().unwrap_or_default().trim();
        if mime.eq_ignore_ascii_case("image/jpeg") {
            Some(ImageKind::Jpeg)
        } else if mime.eq_ignore_ascii_case("image/png") {
            Some(ImageKind::Png)
        } else {
            None
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
        }
    }

    fn format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
        }
    }

    fn output_format(self) -> ImageOutputFormat {
        match self {
            ImageKind::Jpeg => ImageOutputFormat::Jpeg(JPEG_QUALITY),
            ImageKind::Png => ImageOutputFormat::Png,
        }
    }
}

/// Image upload service
pub struct ImageService {
    store: Arc<dyn ImageStore>,
}

impl ImageService {
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self { store }
    }

    /// Resize and store an upload, returning its public URL
    ///
    /// # Errors
    /// 400 when the body does not decode as `kind`, 500 when the store fails
    pub async fn upload(&self, kind: ImageKind, data: Vec<u8>) -> Result<String, AppError> {
        let original_size = data.len();
        let processed = tokio::task::spawn_blocking(move || resize_to_height(&data, kind))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("image task failed: {e}")))??;

        let key = format!("{}.{}", EntityId::new(), kind.extension());
        let url = self
            .store
            .put(&key, processed, kind.content_type())
            .await?;

        IMAGE_UPLOADS_TOTAL
            .with_label_values(&[kind.extension()])
            .inc();
        tracing::info!(key = %key, original_size, "Image uploaded");

        Ok(url)
    }
}

/// Decode, scale to `RESIZE_HEIGHT` keeping the aspect ratio, and re-encode
pub fn resize_to_height(data: &[u8], kind: ImageKind) -> Result<Vec<u8>, AppError> {
    let img = image::load_from_memory_with_format(data, kind.format()).map_err(|e| {
        tracing::debug!(error = %e, format = kind.extension(), "Image decode failed");
        AppError::Validation("could not decode image".to_string())
    })?;

    let (orig_w, orig_h) = img.dimensions();
    if orig_h == 0 {
        return Err(AppError::Validation("could not decode image".to_string()));
    }

    let scaled = (u64::from(orig_w) * u64::from(RESIZE_HEIGHT) + u64::from(orig_h) / 2)
        / u64::from(orig_h);
    let width = u32::try_from(scaled.max(1))
        .ok()
        .filter(|w| *w <= MAX_RESIZED_WIDTH)
        .ok_or_else(|| AppError::Validation("image is too wide".to_string()))?;

    let resized = img.resize_exact(width, RESIZE_HEIGHT, FilterType::Lanczos3);

    let mut cursor = Cursor::new(Vec::new());
    resized
        .write_to(&mut cursor, kind.output_format())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("image encoding failed: {e}")))?;
    let encoded = cursor.into_inner();

    tracing::debug!(
        orig_w,
        orig_h,
        width,
        height = RESIZE_HEIGHT,
        size = encoded.len(),
        "Image resized"
    );

    match (kind, exif_segment(data)) {
        (ImageKind::Jpeg, Some(exif)) => Ok(insert_after_soi(encoded, exif)),
        _ => Ok(encoded),
    }
}

/// The APP1 Exif segment of a JPEG stream, marker and length included
fn exif_segment(jpeg: &[u8]) -> Option<&[u8]> {
    if !jpeg.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return None;
        }
        let marker = jpeg[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // Start of scan or end of image: no more metadata segments.
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }

        let len = usize::from(u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]));
        let end = pos + 2 + len;
        if len < 2 || end > jpeg.len() {
            return None;
        }

        let segment = &jpeg[pos..end];
        if marker == 0xE1 && segment[4..].starts_with(EXIF_HEADER) {
            return Some(segment);
        }
        pos = end;
    }

    None
}

fn insert_after_soi(encoded: Vec<u8>, segment: &[u8]) -> Vec<u8> {
    if encoded.len() < 2 {
        return encoded;
    }
    let mut out = Vec::with_capacity(encoded.len() + segment.len());
    out.extend_from_slice(&encoded[..2]);
    out.extend_from_slice(segment);
    out.extend_from_slice(&encoded[2..]);
    out
}
