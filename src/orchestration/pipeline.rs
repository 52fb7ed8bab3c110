// Pipeline: main workflow coordinator
//
// image → tiles → regions → unique regions → translations → word records

use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use crate::core::config::Config;
use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::{AlignedWordRecord, TranslatedRegion};
use crate::middleware::retry::{policy_from_config, RetryPolicy};
use crate::services::alignment::ResultAligner;
use crate::services::dedup::RegionDeduplicator;
use crate::services::ocr::{OcrEngine, RegionRecognizer};
use crate::services::output::JsonResultWriter;
use crate::services::tiling::TileSplitter;
use crate::services::translation::{
    OrchestratorSettings, TranslationBackend, TranslationCache, TranslationOrchestrator,
};
use crate::utils::image_ops::load_image_async;
use crate::utils::Metrics;

/// Everything one image produced, before persistence
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tile_count: usize,
    pub raw_region_count: usize,
    pub translated: Vec<TranslatedRegion>,
    pub records: Vec<AlignedWordRecord>,
    /// Distinct strings resolved through the run cache
    pub distinct_strings: usize,
    pub fallback_count: usize,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub tiles: usize,
    pub raw_regions: usize,
    pub unique_regions: usize,
    pub distinct_strings: usize,
    pub fallbacks: usize,
    pub words: usize,
    pub elapsed: Duration,
}

/// Main pipeline
pub struct Pipeline {
    config: Arc<Config>,
    splitter: TileSplitter,
    recognizer: RegionRecognizer,
    deduplicator: RegionDeduplicator,
    translation_backend: Arc<dyn TranslationBackend>,
    retry_policy: Arc<dyn RetryPolicy>,
    aligner: ResultAligner,
    writer: JsonResultWriter,
    metrics: Metrics,
}

impl Pipeline {
    /// Build a pipeline. Fails with `InvalidParameters` before touching any input.
    #[instrument(skip_all)]
    pub fn new(
        config: Arc<Config>,
        ocr_engine: Arc<dyn OcrEngine>,
        translation_backend: Arc<dyn TranslationBackend>,
        metrics: Metrics,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let splitter = TileSplitter::from_config(&config.tiling)?;
        let recognizer = RegionRecognizer::from_config(&config.ocr, ocr_engine, Some(metrics.clone()));
        let deduplicator = RegionDeduplicator::new(config.iou_threshold(), Some(metrics.clone()));
        let retry_policy = policy_from_config(&config.translation);

        info!(
            "✓ Pipeline ready (tile={} overlap={} iou={} batch={} retries={} {}→{})",
            config.tile_size(),
            config.overlap(),
            config.iou_threshold(),
            config.translation.batch_size,
            config.translation.max_retries,
            config.source_lang(),
            config.target_lang()
        );

        Ok(Self {
            config,
            splitter,
            recognizer,
            deduplicator,
            translation_backend,
            retry_policy,
            aligner: ResultAligner::new(),
            writer: JsonResultWriter::new(),
            metrics,
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Run every stage on an already decoded image.
    #[instrument(skip(self, image))]
    pub async fn process_image(&self, image: Arc<DynamicImage>) -> PipelineResult<PipelineOutput> {
        // Stage 1: tiling (pixel copies, off the async workers)
        let stage = Instant::now();
        let splitter = self.splitter;
        let tiles = tokio::task::spawn_blocking(move || splitter.split(&image))
            .await
            .map_err(|e| PipelineError::TaskJoinFailed(e.to_string()))??;
        self.metrics.record_stage_duration("tiling", stage.elapsed());
        info!("Stage 1: {} tiles", tiles.len());

        // Stage 2: recognition
        let stage = Instant::now();
        let raw_regions = self.recognizer.recognize_all(&tiles).await;
        let tile_count = tiles.len();
        let raw_region_count = raw_regions.len();
        drop(tiles);
        self.metrics.record_stage_duration("recognition", stage.elapsed());

        // Stage 3: duplicate merging
        let stage = Instant::now();
        let unique = self.deduplicator.deduplicate(raw_regions);
        self.metrics.record_stage_duration("dedup", stage.elapsed());
        info!("Stage 3: {} unique of {} raw regions", unique.len(), raw_region_count);

        // Stage 4: translation with a cache scoped to this run
        let stage = Instant::now();
        let cache = TranslationCache::new(Some(self.metrics.clone()));
        let orchestrator = TranslationOrchestrator::new(
            OrchestratorSettings::from_config(&self.config.translation),
            Arc::clone(&self.translation_backend),
            cache.clone(),
            Arc::clone(&self.retry_policy),
            Some(self.metrics.clone()),
        );
        let translated = orchestrator.translate_all(unique).await;
        self.metrics.record_stage_duration("translation", stage.elapsed());

        // Stage 5: alignment
        let stage = Instant::now();
        let records = self.aligner.align(&translated);
        self.metrics.record_stage_duration("alignment", stage.elapsed());

        Ok(PipelineOutput {
            tile_count,
            raw_region_count,
            translated,
            records,
            distinct_strings: cache.len(),
            fallback_count: cache.fallback_count(),
        })
    }

    /// Load `input`, process it and write the result document to `output`.
    #[instrument(skip(self), fields(input = %input.display()))]
    pub async fn run(&self, input: &Path, output: &Path) -> PipelineResult<RunSummary> {
        let start = Instant::now();

        let image = load_image_async(input).await?;
        info!("Loaded {}x{} image", image.width(), image.height());

        let processed = self.process_image(Arc::new(image)).await?;

        let words = processed.records.len();
        let stage = Instant::now();
        let written = self.writer.write(processed.records, output).await?;
        self.metrics.record_stage_duration("persistence", stage.elapsed());

        let summary = RunSummary {
            input: input.to_path_buf(),
            output: written,
            tiles: processed.tile_count,
            raw_regions: processed.raw_region_count,
            unique_regions: processed.translated.len(),
            distinct_strings: processed.distinct_strings,
            fallbacks: processed.fallback_count,
            words,
            elapsed: start.elapsed(),
        };

        info!(
            "✓ Run complete in {:.2}s: {} tiles, {} → {} regions, {} strings ({} untranslated), {} words",
            summary.elapsed.as_secs_f64(),
            summary.tiles,
            summary.raw_regions,
            summary.unique_regions,
            summary.distinct_strings,
            summary.fallbacks,
            summary.words
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{ConfigError, RecognitionError, RecognitionResult, TranslationError, TranslationResult};
    use crate::core::types::{Point, RawDetection, ResultDocument};
    use async_trait::async_trait;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::collections::HashMap;

    /// Identifies tiles by a marker pixel at their top-left corner
    struct MarkerEngine;

    fn rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<Point> {
        vec![Point::new(x1, y1), Point::new(x2, y1), Point::new(x2, y2), Point::new(x1, y2)]
    }

    fn detection(text: &str, confidence: f32, polygon: Vec<Point>) -> RawDetection {
        RawDetection {
            polygon,
            text: text.to_string(),
            confidence,
        }
    }

    #[async_trait]
    impl OcrEngine for MarkerEngine {
        async fn detect(&self, tile: &DynamicImage) -> RecognitionResult<Vec<RawDetection>> {
            match tile.get_pixel(0, 0)[0] {
                10 => Ok(vec![
                    detection("안녕 하세요", 0.80, rect(452.0, 100.0, 512.0, 150.0)),
                    detection("번역 불가", 0.90, rect(100.0, 300.0, 200.0, 330.0)),
                ]),
                // same bubble as seen from the neighbouring tile
                20 => Ok(vec![detection("안녕 하세요", 0.95, rect(4.0, 100.0, 104.0, 150.0))]),
                30 => Err(RecognitionError::Engine("model crashed".to_string())),
                40 => Ok(vec![detection("끝", 0.70, rect(10.0, 10.0, 50.0, 40.0))]),
                _ => Ok(Vec::new()),
            }
        }
    }

    struct DictionaryBackend(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl TranslationBackend for DictionaryBackend {
        async fn translate(&self, text: &str, _source: &str, _target: &str) -> TranslationResult<String> {
            self.0
                .get(text)
                .map(|t| t.to_string())
                .ok_or_else(|| TranslationError::BadStatus {
                    status: 500,
                    body: "internal error".to_string(),
                })
        }
    }

    fn test_config() -> Config {
        let vars: HashMap<&str, &str> = [
            ("RETRY_DELAY_SECONDS", "0"),
            ("BATCH_DELAY_SECONDS", "0"),
            ("MAX_CONCURRENT_TILES", "2"),
        ]
        .into_iter()
        .collect();
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
    }

    fn test_pipeline(config: Config) -> PipelineResult<Pipeline> {
        let backend = DictionaryBackend(
            [("안녕 하세요", "hello there"), ("끝", "the end")].into_iter().collect(),
        );
        Pipeline::new(Arc::new(config), Arc::new(MarkerEngine), Arc::new(backend), Metrics::new())
    }

    fn marked_page() -> RgbImage {
        let mut img = RgbImage::new(1024, 1024);
        img.put_pixel(0, 0, Rgb([10, 0, 0]));
        img.put_pixel(448, 0, Rgb([20, 0, 0]));
        img.put_pixel(0, 448, Rgb([30, 0, 0]));
        img.put_pixel(448, 448, Rgb([40, 0, 0]));
        img
    }

    #[tokio::test]
    async fn test_process_image_end_to_end() {
        let pipeline = test_pipeline(test_config()).unwrap();
        let output = pipeline
            .process_image(Arc::new(DynamicImage::ImageRgb8(marked_page())))
            .await
            .unwrap();

        assert_eq!(output.tile_count, 4);
        assert_eq!(output.raw_region_count, 4);

        // the straddling bubble survives once, from the tile with higher confidence
        let texts: Vec<_> = output
            .translated
            .iter()
            .map(|t| (t.region.text.as_str(), t.region.id.tile, t.translation.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("안녕 하세요", 1, "hello there"),
                ("번역 불가", 0, "번역 불가"),
                ("끝", 3, "the end"),
            ]
        );

        let words: Vec<_> = output
            .records
            .iter()
            .map(|r| (r.word.as_str(), r.translation.as_str()))
            .collect();
        assert_eq!(
            words,
            vec![("안녕", "hello"), ("하세요", "there"), ("번역", "번역"), ("불가", "불가"), ("끝", "the")]
        );
        assert_eq!(output.records[0].position.x, 452.0);
        assert_eq!(output.records[0].position.y, 100.0);

        assert_eq!(output.distinct_strings, 3);
        assert_eq!(output.fallback_count, 1);

        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.tiles_failed, 1);
        assert_eq!(snapshot.regions_merged, 1);
        // three attempts for the unresolvable string, one for each of the others
        assert_eq!(snapshot.translation_calls_total, 5);
        assert_eq!(snapshot.translation_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_run_writes_result_document() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.png");
        marked_page().save(&input).unwrap();
        let output = dir.path().join("out").join("page_results.json");

        let summary = test_pipeline(test_config()).unwrap().run(&input, &output).await.unwrap();
        assert_eq!(summary.tiles, 4);
        assert_eq!(summary.unique_regions, 3);
        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.words, 5);

        let doc: ResultDocument = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(doc.total_words, 5);
        assert_eq!(doc.results[2].word, "번역");
        assert_eq!(doc.results[2].context, "번역 불가");
    }

    #[test]
    fn test_invalid_geometry_rejected_before_io() {
        let mut config = test_config();
        config.tiling.overlap = config.tiling.tile_size;

        assert!(matches!(
            test_pipeline(config),
            Err(PipelineError::InvalidParameters(ConfigError::InvalidTileGeometry { .. }))
        ));
    }

    #[tokio::test]
    async fn test_small_image_is_fatal() {
        let pipeline = test_pipeline(test_config()).unwrap();
        let err = pipeline
            .process_image(Arc::new(DynamicImage::ImageRgb8(RgbImage::new(300, 2000))))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ImageTooSmall { width: 300, .. }));
    }

    #[tokio::test]
    async fn test_missing_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing_results.json");

        let err = test_pipeline(test_config())
            .unwrap()
            .run(&dir.path().join("missing.png"), &output)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ImageLoadFailed { .. }));
        assert!(!output.exists());
    }
}
