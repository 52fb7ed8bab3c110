pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::{Config, ConfigOverrides, RetryStrategy};
pub use errors::{ConfigError, PipelineError, RecognitionError, TranslationError};
pub use types::{
    AlignedWordRecord, BoundingBox, DetectionOutcome, Point, RawDetection, RegionId, TextRegion,
    Tile, TileBounds, TranslatedRegion,
};
