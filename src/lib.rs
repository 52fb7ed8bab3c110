// Library exports for the tiled OCR and translation workflow

// Core modules
pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{ConfigError, PipelineError, RecognitionError, TranslationError},
    types::{AlignedWordRecord, BoundingBox, DetectionOutcome, RegionId, TextRegion, TranslatedRegion},
};

pub use middleware::{ExponentialBackoff, FixedDelay, RetryPolicy};

pub use orchestration::{Pipeline, PipelineOutput, RunSummary};

pub use services::{
    HttpOcrEngine, HttpTranslator, JsonResultWriter, OcrEngine, RegionDeduplicator, RegionRecognizer,
    ResultAligner, TileSplitter, TranslationBackend, TranslationCache, TranslationOrchestrator,
};

pub use utils::Metrics;
