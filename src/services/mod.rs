pub mod alignment;
pub mod dedup;
pub mod ocr;
pub mod output;
pub mod tiling;
pub mod translation;

// Re-export commonly used services
pub use alignment::ResultAligner;
pub use dedup::RegionDeduplicator;
pub use ocr::{HttpOcrEngine, OcrEngine, RegionRecognizer};
pub use output::{default_output_path, JsonResultWriter};
pub use tiling::TileSplitter;
pub use translation::{HttpTranslator, TranslationBackend, TranslationCache, TranslationOrchestrator};
