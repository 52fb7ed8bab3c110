// Error types for the tiled OCR / translation pipeline
//
// Only configuration, input loading and persistence errors abort a run.
// Recognition and translation errors are recovered where they happen
// (empty tile, fallback translation) and never reach the caller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// OCR collaborator errors (recovered per tile)
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("OCR request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("OCR service returned {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),

    #[error("Tile encoding failed: {0}")]
    EncodingFailed(String),

    #[error("OCR call timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// Translation collaborator errors (recovered per string via fallback)
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Translation service returned {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Invalid translation response: {0}")]
    InvalidResponse(String),

    #[error("Translation call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Translation backend error: {0}")]
    Backend(String),
}

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tile_size must be > 0 and greater than overlap (tile_size={tile_size}, overlap={overlap})")]
    InvalidTileGeometry { tile_size: u32, overlap: u32 },

    #[error("IoU threshold must be in [0.0, 1.0], got {0}")]
    InvalidIoUThreshold(f32),

    #[error("Batch size must be > 0, got {0}")]
    InvalidBatchSize(usize),

    #[error("max_retries must be >= 1, got {0}")]
    InvalidRetryCount(u32),

    #[error("Concurrency limit for {0} must be > 0")]
    InvalidConcurrency(&'static str),

    #[error("Invalid translation config: {0}")]
    InvalidTranslationConfig(String),

    #[error("Environment variable {key} has invalid value {value:?}")]
    EnvVarError { key: String, value: String },
}

/// Run-level errors surfaced to the caller
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ConfigError),

    #[error("Image {width}x{height} is smaller than one tile stride (tile_size={tile_size}, overlap={overlap})")]
    ImageTooSmall {
        width: u32,
        height: u32,
        tile_size: u32,
        overlap: u32,
    },

    #[error("Failed to load image {path}: {reason}")]
    ImageLoadFailed { path: PathBuf, reason: String },

    #[error("Failed to persist results to {path}: {source}")]
    PersistenceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Result serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

pub type RecognitionResult<T> = Result<T, RecognitionError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts_to_invalid_parameters() {
        let err: PipelineError = ConfigError::InvalidTileGeometry {
            tile_size: 64,
            overlap: 64,
        }
        .into();

        assert!(matches!(err, PipelineError::InvalidParameters(_)));
        assert!(err.to_string().contains("tile_size=64"));
    }

    #[test]
    fn test_image_too_small_message() {
        let err = PipelineError::ImageTooSmall {
            width: 100,
            height: 80,
            tile_size: 512,
            overlap: 64,
        };
        assert_eq!(
            err.to_string(),
            "Image 100x80 is smaller than one tile stride (tile_size=512, overlap=64)"
        );
    }
}
