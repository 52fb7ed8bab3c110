use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::core::errors::{PipelineError, RecognitionError};
use crate::core::types::TileBounds;

/// Extensions accepted as pipeline input
pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

/// Check that the input exists and has a supported extension.
pub fn validate_image_path(path: &Path) -> Result<(), PipelineError> {
    if !path.exists() {
        return Err(load_failed(path, "file not found"));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(load_failed(
            path,
            format!(
                "unsupported image format '.{}' (supported: {})",
                ext,
                SUPPORTED_FORMATS.join(", ")
            ),
        ));
    }

    Ok(())
}

/// Asynchronously load and decode an image as RGB using spawn_blocking.
///
/// Decoding a long webtoon strip is CPU-heavy and would otherwise stall the runtime.
pub async fn load_image_async(path: &Path) -> Result<DynamicImage, PipelineError> {
    validate_image_path(path)?;

    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::open(&owned).map_err(|e| load_failed(&owned, e.to_string()))?;
        Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
    })
    .await
    .map_err(|e| PipelineError::TaskJoinFailed(e.to_string()))?
}

/// Crop the pixels covered by `bounds`.
pub fn crop_tile(img: &DynamicImage, bounds: &TileBounds) -> DynamicImage {
    img.crop_imm(bounds.x1, bounds.y1, bounds.width(), bounds.height())
}

/// Asynchronously encode an image to PNG bytes using spawn_blocking.
pub async fn encode_png_async(img: DynamicImage) -> Result<Vec<u8>, RecognitionError> {
    tokio::task::spawn_blocking(move || {
        let mut png_bytes = Vec::new();
        let mut cursor = Cursor::new(&mut png_bytes);
        img.write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| RecognitionError::EncodingFailed(e.to_string()))?;
        Ok(png_bytes)
    })
    .await
    .map_err(|e| RecognitionError::EncodingFailed(format!("encoder task failed: {}", e)))?
}

fn load_failed(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::ImageLoadFailed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    #[test]
    fn test_crop_tile_takes_bounds_region() {
        let mut img = RgbImage::new(20, 10);
        img.put_pixel(12, 3, Rgb([255, 0, 0]));
        let img = DynamicImage::ImageRgb8(img);

        let bounds = TileBounds { x1: 10, y1: 2, x2: 20, y2: 10 };
        let tile = crop_tile(&img, &bounds);

        assert_eq!(tile.dimensions(), (10, 8));
        assert_eq!(tile.to_rgb8().get_pixel(2, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_validate_rejects_missing_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.png");
        assert!(matches!(
            validate_image_path(&missing),
            Err(PipelineError::ImageLoadFailed { .. })
        ));

        let gif = dir.path().join("page.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        let err = validate_image_path(&gif).unwrap_err();
        assert!(err.to_string().contains("unsupported image format"));
    }

    #[tokio::test]
    async fn test_load_image_roundtrip_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        RgbImage::new(8, 6).save_with_format(&path, ImageFormat::Png).unwrap();

        let img = load_image_async(&path).await.unwrap();
        assert_eq!(img.dimensions(), (8, 6));
    }

    #[tokio::test]
    async fn test_encode_png_produces_png_signature() {
        let bytes = encode_png_async(DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
            .await
            .unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }
}
