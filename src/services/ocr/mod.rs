// Per-tile text recognition and tile-to-image coordinate remapping

pub mod http;

use async_trait::async_trait;
use futures::future::join_all;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::core::config::OcrConfig;
use crate::core::errors::{RecognitionError, RecognitionResult};
use crate::core::types::{BoundingBox, RawDetection, RegionId, TextRegion, Tile, TileBounds};
use crate::utils::Metrics;

pub use http::HttpOcrEngine;

/// External OCR engine. Coordinates in the result are tile-local.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn detect(&self, tile: &DynamicImage) -> RecognitionResult<Vec<RawDetection>>;
}

/// Runs the OCR engine over tiles and lifts detections into image space
pub struct RegionRecognizer {
    engine: Arc<dyn OcrEngine>,
    timeout: Duration,
    max_concurrent: usize,
    metrics: Option<Metrics>,
}

impl RegionRecognizer {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        timeout: Duration,
        max_concurrent: usize,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            engine,
            timeout,
            max_concurrent: max_concurrent.max(1),
            metrics,
        }
    }

    pub fn from_config(config: &OcrConfig, engine: Arc<dyn OcrEngine>, metrics: Option<Metrics>) -> Self {
        Self::new(engine, config.timeout, config.max_concurrent_tiles, metrics)
    }

    /// Recognize one tile. Engine failures and timeouts yield an empty result.
    #[instrument(skip(self, tile), fields(tile = tile.index))]
    pub async fn recognize(&self, tile: &Tile) -> Vec<TextRegion> {
        let outcome = match tokio::time::timeout(self.timeout, self.engine.detect(&tile.image)).await {
            Ok(result) => result,
            Err(_) => Err(RecognitionError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(detections) => {
                let regions: Vec<TextRegion> = detections
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, det)| remap_detection(&tile.bounds, tile.index, i, det))
                    .collect();

                debug!("Tile {} yielded {} regions", tile.index, regions.len());
                if let Some(ref m) = self.metrics {
                    m.record_tile(true, regions.len());
                }
                regions
            }
            Err(e) => {
                warn!(
                    "Recognition failed for tile {} at {:?}, skipping: {}",
                    tile.index,
                    tile.bounds.origin(),
                    e
                );
                if let Some(ref m) = self.metrics {
                    m.record_tile(false, 0);
                }
                Vec::new()
            }
        }
    }

    /// Recognize all tiles with bounded concurrency.
    ///
    /// Results are concatenated in tile order whatever order the calls finish in.
    #[instrument(skip(self, tiles), fields(tiles = tiles.len()))]
    pub async fn recognize_all(&self, tiles: &[Tile]) -> Vec<TextRegion> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let tasks = tiles.iter().map(|tile| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.recognize(tile).await
            }
        });

        let regions: Vec<TextRegion> = join_all(tasks).await.into_iter().flatten().collect();
        info!("Recognized {} raw regions across {} tiles", regions.len(), tiles.len());
        regions
    }
}

/// Translate a tile-local detection into parent-image coordinates.
///
/// Returns `None` for detections without polygon points.
pub fn remap_detection(
    bounds: &TileBounds,
    tile_index: usize,
    detection_index: usize,
    detection: RawDetection,
) -> Option<TextRegion> {
    let (dx, dy) = (bounds.x1 as f32, bounds.y1 as f32);
    let polygon: Vec<_> = detection
        .polygon
        .into_iter()
        .map(|p| p.offset(dx, dy))
        .collect();

    let Some(bbox) = BoundingBox::from_points(&polygon) else {
        debug!(
            "Dropping detection {} of tile {} with empty polygon",
            detection_index, tile_index
        );
        return None;
    };

    let confidence = if detection.confidence.is_nan() {
        0.0
    } else {
        detection.confidence.clamp(0.0, 1.0)
    };

    Some(TextRegion {
        id: RegionId {
            tile: tile_index,
            index: detection_index,
        },
        text: detection.text,
        confidence,
        polygon,
        bbox,
    })
}
