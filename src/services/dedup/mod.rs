// Duplicate detection merging across overlapping tiles
//
// Greedy suppression: highest confidence first, ties by detection order
// (tile index, then index within the tile). A candidate is dropped when it overlaps any accepted region with
// IoU above the threshold. Duplicates are dropped, never fused.

use tracing::{debug, instrument, trace};

use crate::core::types::{DetectionOutcome, TextRegion};
use crate::utils::Metrics;

pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

#[derive(Clone)]
pub struct RegionDeduplicator {
    threshold: f32,
    metrics: Option<Metrics>,
}

impl RegionDeduplicator {
    pub fn new(threshold: f32, metrics: Option<Metrics>) -> Self {
        Self { threshold, metrics }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Decide the fate of every region, in processing order.
    pub fn classify(&self, regions: Vec<TextRegion>) -> Vec<DetectionOutcome> {
        let mut sorted = regions;
        // equal confidences fall back to detection order
        sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.id.cmp(&b.id)));

        let mut accepted: Vec<TextRegion> = Vec::new();
        let mut outcomes = Vec::with_capacity(sorted.len());

        for candidate in sorted {
            let collision = accepted
                .iter()
                .map(|kept| (kept, candidate.bbox.iou(&kept.bbox)))
                .find(|(_, iou)| *iou > self.threshold);

            match collision {
                Some((kept, iou)) => {
                    trace!(
                        "Region {:?} ({:?}) merged into {:?} (IoU={:.3})",
                        candidate.id,
                        candidate.text,
                        kept.id,
                        iou
                    );
                    let into = kept.id;
                    outcomes.push(DetectionOutcome::Merged {
                        region: candidate,
                        into,
                        iou,
                    });
                }
                None => {
                    accepted.push(candidate.clone());
                    outcomes.push(DetectionOutcome::Unique(candidate));
                }
            }
        }

        outcomes
    }

    /// Keep one representative per duplicate cluster.
    #[instrument(skip(self, regions), fields(regions = regions.len(), threshold = self.threshold))]
    pub fn deduplicate(&self, regions: Vec<TextRegion>) -> Vec<TextRegion> {
        let total = regions.len();
        let unique: Vec<TextRegion> = self
            .classify(regions)
            .into_iter()
            .filter_map(|outcome| match outcome {
                DetectionOutcome::Unique(region) => Some(region),
                DetectionOutcome::Merged { .. } => None,
            })
            .collect();

        let merged = total - unique.len();
        debug!("Dedup: kept {}/{} regions (merged {})", unique.len(), total, merged);
        if let Some(ref m) = self.metrics {
            m.record_dedup(unique.len(), merged);
        }
        unique
    }
}

impl Default for RegionDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, None)
    }
}
